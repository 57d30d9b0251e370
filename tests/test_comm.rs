// Integration tests for Comm module
// This file should be run with cargo test --test test_comm

use j52_worker::comm;

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    });
}

// Message types (must match protocol)
#[derive(Debug, Clone, Copy)]
#[repr(u8)]
enum MsgType {
    Request = 0x01,
    RequestAck = 0x02,
    Response = 0x03,
}

// Test helper: encode a request packet the way a client would
fn encode_request(seq: u32, tool_name: &str, arguments_json: &str) -> Vec<u8> {
    use rmp_serde::encode::Serializer;
    use serde::Serialize;

    #[derive(Serialize)]
    struct RequestPayload<'a> {
        tool_call_id: &'a str,
        tool_name: &'a str,
        arguments_json: &'a str,
    }

    let id = format!("call-{}", seq);
    let payload = RequestPayload {
        tool_call_id: &id,
        tool_name,
        arguments_json,
    };
    let mut payload_bytes = Vec::new();
    let mut ser = Serializer::new(&mut payload_bytes);
    payload.serialize(&mut ser).unwrap();

    let mut packet = vec![MsgType::Request as u8];
    packet.extend_from_slice(&seq.to_be_bytes());
    packet.extend_from_slice(&payload_bytes);
    packet
}

#[derive(Debug, serde::Deserialize)]
struct Response {
    tool_call_id: String,
    success: bool,
    output: Option<String>,
    error: Option<String>,
    #[allow(dead_code)]
    execution_time_ms: Option<u64>,
}

// Test helper: decode response packet
fn decode_response(data: &[u8]) -> (u32, Response) {
    use rmp_serde::decode::Deserializer;
    use serde::Deserialize;

    let seq = u32::from_be_bytes([data[1], data[2], data[3], data[4]]);
    let mut de = Deserializer::new(&data[5..]);
    let resp: Response = Deserialize::deserialize(&mut de).unwrap();
    (seq, resp)
}

fn test_config() -> comm::CommConfig {
    comm::CommConfig {
        listen_addr: "127.0.0.1".to_string(),
        listen_port: 0,
        ..Default::default()
    }
}

fn ok_response(req: &comm::ToolRequest, output: &str) -> comm::ResponsePayload {
    comm::ResponsePayload {
        tool_call_id: req.tool_call_id.clone(),
        success: true,
        output: Some(output.to_string()),
        error: None,
        execution_time_ms: Some(1),
    }
}

use std::time::Duration;
use tokio::net::UdpSocket;

async fn recv(client: &UdpSocket, buf: &mut [u8]) -> usize {
    tokio::time::timeout(Duration::from_secs(2), client.recv(buf))
        .await
        .expect("timed out waiting for packet")
        .unwrap()
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_normal_request_response() {
        init_tracing();

        let (comm, mut loop_rx) = comm::Comm::new(test_config()).await.unwrap();
        let comm_addr = comm.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = comm.run().await;
        });

        // Mock dispatch loop
        tokio::spawn(async move {
            if let Some(req) = loop_rx.recv().await {
                assert_eq!(req.tool_name, "run_shell");
                assert_eq!(req.arguments, serde_json::json!({"command": "echo hi"}));
                let response = ok_response(&req, "hi\n");
                req.reply.send(response).ok();
            }
        });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(comm_addr).await.unwrap();
        client
            .send(&encode_request(1, "run_shell", r#"{"command":"echo hi"}"#))
            .await
            .unwrap();

        let mut buf = vec![0u8; 70_000];
        recv(&client, &mut buf).await;
        assert_eq!(buf[0], MsgType::RequestAck as u8);

        let len = recv(&client, &mut buf).await;
        assert_eq!(buf[0], MsgType::Response as u8);
        let (seq, resp) = decode_response(&buf[..len]);
        assert_eq!(seq, 1);
        assert_eq!(resp.tool_call_id, "call-1");
        assert!(resp.success);
        assert_eq!(resp.output.as_deref(), Some("hi\n"));
    }

    #[tokio::test]
    async fn test_duplicate_request_dedup() {
        init_tracing();

        let (comm, mut loop_rx) = comm::Comm::new(test_config()).await.unwrap();
        let comm_addr = comm.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = comm.run().await;
        });

        let (req_tx, mut req_rx) = tokio::sync::mpsc::channel::<String>(10);
        tokio::spawn(async move {
            while let Some(req) = loop_rx.recv().await {
                let _ = req_tx.send(req.tool_call_id.clone()).await;
                let response = ok_response(&req, "ok");
                let _ = req.reply.send(response);
            }
        });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(comm_addr).await.unwrap();

        let packet = encode_request(1, "git_status", r#"{"repoPath":"/tmp"}"#);
        client.send(&packet).await.unwrap();

        let mut buf = vec![0u8; 70_000];
        recv(&client, &mut buf).await;
        assert_eq!(buf[0], MsgType::RequestAck as u8);
        recv(&client, &mut buf).await;
        assert_eq!(buf[0], MsgType::Response as u8);

        // Duplicate gets the cached response, not a second execution
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.send(&packet).await.unwrap();
        recv(&client, &mut buf).await;
        assert_eq!(buf[0], MsgType::Response as u8);

        let mut received = Vec::new();
        while let Ok(Some(id)) =
            tokio::time::timeout(Duration::from_millis(100), req_rx.recv()).await
        {
            received.push(id);
        }
        assert_eq!(received, vec!["call-1".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_while_in_flight_gets_ack() {
        init_tracing();

        let (comm, mut loop_rx) = comm::Comm::new(test_config()).await.unwrap();
        let comm_addr = comm.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = comm.run().await;
        });

        tokio::spawn(async move {
            if let Some(req) = loop_rx.recv().await {
                tokio::time::sleep(Duration::from_millis(300)).await;
                let response = ok_response(&req, "slow");
                let _ = req.reply.send(response);
            }
        });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(comm_addr).await.unwrap();
        let packet = encode_request(5, "run_shell", r#"{"command":"sleep 1"}"#);

        let mut buf = vec![0u8; 70_000];
        client.send(&packet).await.unwrap();
        recv(&client, &mut buf).await;
        assert_eq!(buf[0], MsgType::RequestAck as u8);

        client.send(&packet).await.unwrap();
        recv(&client, &mut buf).await;
        assert_eq!(buf[0], MsgType::RequestAck as u8);

        let len = recv(&client, &mut buf).await;
        assert_eq!(buf[0], MsgType::Response as u8);
        let (_, resp) = decode_response(&buf[..len]);
        assert_eq!(resp.output.as_deref(), Some("slow"));
    }

    #[tokio::test]
    async fn test_slow_call_does_not_block_other_clients() {
        init_tracing();

        let (comm, mut loop_rx) = comm::Comm::new(test_config()).await.unwrap();
        let comm_addr = comm.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = comm.run().await;
        });

        // Each call is answered on its own task; "slow" takes 2 s
        tokio::spawn(async move {
            while let Some(req) = loop_rx.recv().await {
                tokio::spawn(async move {
                    if req.tool_name == "slow" {
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                    let response = ok_response(&req, &req.tool_name);
                    let _ = req.reply.send(response);
                });
            }
        });

        let slow_client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        slow_client.connect(comm_addr).await.unwrap();
        slow_client.send(&encode_request(1, "slow", "")).await.unwrap();

        let fast_client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        fast_client.connect(comm_addr).await.unwrap();
        fast_client.send(&encode_request(1, "fast", "")).await.unwrap();

        let mut buf = vec![0u8; 70_000];
        let start = std::time::Instant::now();
        recv(&fast_client, &mut buf).await;
        assert_eq!(buf[0], MsgType::RequestAck as u8);
        let len = recv(&fast_client, &mut buf).await;
        let (_, resp) = decode_response(&buf[..len]);
        assert_eq!(resp.output.as_deref(), Some("fast"));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_invalid_arguments_json_is_reported() {
        init_tracing();

        let (comm, _loop_rx) = comm::Comm::new(test_config()).await.unwrap();
        let comm_addr = comm.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = comm.run().await;
        });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(comm_addr).await.unwrap();
        client
            .send(&encode_request(2, "run_shell", "{broken"))
            .await
            .unwrap();

        let mut buf = vec![0u8; 70_000];
        recv(&client, &mut buf).await;
        assert_eq!(buf[0], MsgType::RequestAck as u8);
        let len = recv(&client, &mut buf).await;
        let (_, resp) = decode_response(&buf[..len]);
        assert!(!resp.success);
        assert!(resp.error.unwrap().contains("Invalid arguments JSON"));
    }

    #[tokio::test]
    async fn test_large_output_fits_datagram() {
        init_tracing();

        let (comm, mut loop_rx) = comm::Comm::new(test_config()).await.unwrap();
        let comm_addr = comm.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = comm.run().await;
        });

        tokio::spawn(async move {
            if let Some(req) = loop_rx.recv().await {
                let response = ok_response(&req, &"y".repeat(500_000));
                let _ = req.reply.send(response);
            }
        });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(comm_addr).await.unwrap();
        client
            .send(&encode_request(3, "read_text_file", r#"{"path":"/big"}"#))
            .await
            .unwrap();

        let mut buf = vec![0u8; 70_000];
        recv(&client, &mut buf).await;
        let len = recv(&client, &mut buf).await;
        assert!(len <= 65_005);
        let (_, resp) = decode_response(&buf[..len]);
        assert!(resp.success);
        assert!(resp.output.unwrap().ends_with("[output truncated]"));
    }

    #[tokio::test]
    async fn test_empty_packet() {
        init_tracing();

        let (comm, _rx) = comm::Comm::new(test_config()).await.unwrap();
        let comm_addr = comm.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = comm.run().await;
        });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let _ = client.send_to(&[], comm_addr).await;

        // Should not crash - server continues
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_invalid_request_ack_from_client() {
        init_tracing();

        let (comm, _rx) = comm::Comm::new(test_config()).await.unwrap();
        let comm_addr = comm.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = comm.run().await;
        });

        // REQUEST_ACK is worker -> client only
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut packet = vec![MsgType::RequestAck as u8];
        packet.extend_from_slice(&1u32.to_be_bytes());
        let _ = client.send_to(&packet, comm_addr).await;

        let mut buf = [0u8; 64];
        let result =
            tokio::time::timeout(Duration::from_millis(200), client.recv_from(&mut buf)).await;
        assert!(result.is_err(), "server should not answer a stray ACK");
    }
}
