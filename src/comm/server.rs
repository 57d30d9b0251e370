use crate::comm::config::CommConfig;
use crate::comm::error::{CommError, CommInitError};
use crate::comm::protocol::{
    HEADER_LEN, decode_header, decode_request_payload, encode_request_ack,
    encode_response_within, parse_arguments,
};
use crate::comm::types::{MsgType, RequestPayload, ResponsePayload, ToolRequest};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::result::Result as StdResult;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Sequence deduplication entry
#[derive(Debug)]
struct DedupEntry {
    /// When the request arrived, then when its response was cached
    instant: Instant,
    /// Cached response to resend if duplicate
    cached_response: Option<Vec<u8>>,
}

type DedupTable = HashMap<SocketAddr, HashMap<u32, DedupEntry>>;

struct Shared {
    socket: UdpSocket,
    config: CommConfig,
    /// Forwards tool calls to the dispatch loop
    loop_sender: mpsc::Sender<ToolRequest>,
    /// Sequence deduplication table per client
    dedup: Mutex<DedupTable>,
}

/// Comm server - receives tool calls over UDP and returns their results.
///
/// Each new request is served on its own task, so a long tool call does not
/// hold up other clients.
pub struct Comm {
    shared: Arc<Shared>,
}

impl Comm {
    /// Bind the UDP socket.
    /// Returns the comm instance and the receiver the dispatch loop reads tool calls from.
    pub async fn new(
        config: CommConfig,
    ) -> StdResult<(Comm, mpsc::Receiver<ToolRequest>), CommInitError> {
        let socket = UdpSocket::bind(config.bind_addr()?)
            .await
            .map_err(|e| CommInitError::BindFailed(e.to_string()))?;

        if let Ok(addr) = socket.local_addr() {
            info!(addr = %addr, "Comm listening");
        }

        let (tx, rx) = mpsc::channel(1024);

        Ok((
            Self {
                shared: Arc::new(Shared {
                    socket,
                    config,
                    loop_sender: tx,
                    dedup: Mutex::new(HashMap::new()),
                }),
            },
            rx,
        ))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.shared.socket.local_addr()
    }

    /// Run the Comm server
    pub async fn run(self) -> StdResult<(), CommError> {
        // Extra space for the header and to detect oversized payloads
        let mut buf = vec![0u8; self.shared.config.max_payload_bytes + 1024];
        let mut cleanup_interval = tokio::time::interval(Duration::from_secs(30));

        loop {
            tokio::select! {
                result = self.shared.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, addr)) => {
                            if let Err(e) = self.shared.clone().handle_packet(&buf[..len], addr).await {
                                warn!(client = %addr, error = %e, "Failed to handle packet");
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Recv error");
                            return Err(CommError::RecvError(e.to_string()));
                        }
                    }
                }
                _ = cleanup_interval.tick() => {
                    self.shared.cleanup_dedup().await;
                }
            }
        }
    }
}

impl Shared {
    async fn handle_packet(
        self: Arc<Self>,
        packet: &[u8],
        client_addr: SocketAddr,
    ) -> StdResult<(), CommError> {
        if packet.len() < HEADER_LEN {
            warn!(client = %client_addr, len = packet.len(), "Truncated packet");
            return Err(CommError::DecodeError("Packet too short".to_string()));
        }

        let payload_len = packet.len() - HEADER_LEN;
        if payload_len > self.config.max_payload_bytes {
            warn!(client = %client_addr, len = payload_len, "Payload too large");
            return Err(CommError::PayloadTooLarge(payload_len));
        }

        let (msg_type, seq) = decode_header(packet)?;
        debug!(msg_type = msg_type as u8, client = %client_addr, seq = seq, "Received packet");

        match msg_type {
            MsgType::Request => self.handle_request(&packet[HEADER_LEN..], seq, client_addr).await,
            _ => {
                warn!(msg_type = msg_type as u8, client = %client_addr, "Unexpected message type");
                Ok(())
            }
        }
    }

    /// Answer duplicates from the dedup table; hand new requests to a serving task
    async fn handle_request(
        self: Arc<Self>,
        payload_bytes: &[u8],
        seq: u32,
        client_addr: SocketAddr,
    ) -> StdResult<(), CommError> {
        let mut dedup = self.dedup.lock().await;
        let client_entries = dedup.entry(client_addr).or_default();

        if let Some(entry) = client_entries.get(&seq) {
            let reply = match &entry.cached_response {
                Some(cached) => {
                    info!(seq = seq, client = %client_addr, "Duplicate request, resending cached response");
                    cached.clone()
                }
                None => {
                    // Still executing
                    debug!(seq = seq, client = %client_addr, "Duplicate request in flight, sending ACK");
                    encode_request_ack(seq)?
                }
            };
            drop(dedup);
            return self.send(&reply, client_addr).await;
        }

        if client_entries.len() >= self.config.dedup_capacity {
            let oldest = client_entries
                .iter()
                .min_by_key(|(_, e)| e.instant)
                .map(|(seq, _)| *seq);
            if let Some(oldest) = oldest {
                client_entries.remove(&oldest);
                debug!(seq = oldest, "Dedup table at capacity, removed oldest entry");
            }
        }
        // Registered before processing so retries during execution are recognized
        client_entries.insert(
            seq,
            DedupEntry {
                instant: Instant::now(),
                cached_response: None,
            },
        );
        drop(dedup);

        let request = match decode_request_payload(payload_bytes) {
            Ok(request) => request,
            Err(e) => {
                self.forget(client_addr, seq).await;
                return Err(e);
            }
        };

        info!(
            seq = seq,
            client = %client_addr,
            tool_call_id = %request.tool_call_id,
            tool_name = %request.tool_name,
            "New tool call"
        );

        let ack = encode_request_ack(seq)?;
        self.send(&ack, client_addr).await?;

        tokio::spawn(async move {
            if let Err(e) = self.serve(request, seq, client_addr).await {
                warn!(seq = seq, client = %client_addr, error = %e, "Failed to serve request");
            }
        });
        Ok(())
    }

    /// Forward one tool call, wait for its result and send it back
    async fn serve(
        &self,
        request: RequestPayload,
        seq: u32,
        client_addr: SocketAddr,
    ) -> StdResult<(), CommError> {
        let call_id = request.tool_call_id.clone();
        let payload = match parse_arguments(&request.arguments_json) {
            Ok(arguments) => self.forward(request, arguments, client_addr).await,
            Err(e) => ResponsePayload::failure(&call_id, e.to_string()),
        };

        let response_bytes =
            encode_response_within(seq, payload, self.config.max_payload_bytes)?;
        self.send(&response_bytes, client_addr).await?;
        debug!(seq = seq, client = %client_addr, bytes = response_bytes.len(), "Sent RESPONSE");

        let mut dedup = self.dedup.lock().await;
        if let Some(entry) = dedup
            .get_mut(&client_addr)
            .and_then(|entries| entries.get_mut(&seq))
        {
            entry.instant = Instant::now();
            entry.cached_response = Some(response_bytes);
        }
        Ok(())
    }

    async fn forward(
        &self,
        request: RequestPayload,
        arguments: serde_json::Value,
        client_addr: SocketAddr,
    ) -> ResponsePayload {
        let call_id = request.tool_call_id.clone();
        let (reply_tx, reply_rx) = oneshot::channel();
        let tool_request = ToolRequest {
            tool_call_id: request.tool_call_id,
            tool_name: request.tool_name,
            arguments,
            reply: reply_tx,
            source_addr: client_addr,
        };

        if let Err(e) = self.loop_sender.send(tool_request).await {
            error!(error = %e, "Failed to send request to dispatch loop");
            return ResponsePayload::failure(call_id, "Internal server error");
        }

        let wait = Duration::from_secs(self.config.response_timeout_secs);
        match timeout(wait, reply_rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                warn!(tool_call_id = %call_id, "Channel closed without response");
                ResponsePayload::failure(call_id, "No response from handler")
            }
            Err(_) => {
                warn!(tool_call_id = %call_id, "Timeout waiting for response");
                ResponsePayload::failure(call_id, "Response timeout")
            }
        }
    }

    async fn send(&self, bytes: &[u8], client_addr: SocketAddr) -> StdResult<(), CommError> {
        self.socket
            .send_to(bytes, client_addr)
            .await
            .map_err(|e| CommError::SendError(e.to_string()))?;
        Ok(())
    }

    /// Drop a dedup entry so a corrected retry is processed
    async fn forget(&self, client_addr: SocketAddr, seq: u32) {
        let mut dedup = self.dedup.lock().await;
        if let Some(entries) = dedup.get_mut(&client_addr) {
            entries.remove(&seq);
        }
    }

    /// Remove expired entries from the deduplication table
    async fn cleanup_dedup(&self) {
        let mut dedup = self.dedup.lock().await;
        let ttl = Duration::from_secs(self.config.dedup_ttl_secs);
        expire_entries(&mut dedup, ttl, Instant::now());

        debug!(clients = dedup.len(), "Dedup table cleaned");
    }
}

/// Drop answered entries older than `ttl`. Entries still waiting for their
/// tool result stay, however long the call runs.
fn expire_entries(dedup: &mut DedupTable, ttl: Duration, now: Instant) {
    for entries in dedup.values_mut() {
        entries.retain(|_, entry| {
            entry.cached_response.is_none() || now.duration_since(entry.instant) < ttl
        });
    }
    dedup.retain(|_, entries| !entries.is_empty());
}
