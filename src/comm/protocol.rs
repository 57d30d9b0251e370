use crate::comm::error::CommError;
use crate::comm::types::{MsgType, RequestPayload, ResponsePayload};
use rmp_serde::decode::Deserializer;
use rmp_serde::encode::Serializer;
use serde::Deserialize;
use std::io::Cursor;
use std::result::Result as StdResult;

/// Packet header: type (1) + seq (4)
pub const HEADER_LEN: usize = 5;

/// Appended to output cut short to fit a datagram
pub const TRUNCATION_MARKER: &str = "\n[output truncated]";

/// Encode a packet with given type, sequence, and payload
pub fn encode_packet(
    msg_type: MsgType,
    seq: u32,
    payload: Option<&impl serde::Serialize>,
) -> StdResult<Vec<u8>, CommError> {
    let mut buf = Vec::new();

    // Write msg type (1 byte)
    buf.push(msg_type as u8);

    // Write seq (4 bytes, big-endian)
    buf.extend_from_slice(&seq.to_be_bytes());

    if let Some(p) = payload {
        let mut ser = Serializer::new(&mut buf);
        p.serialize(&mut ser).map_err(|e| CommError::EncodeError(e.to_string()))?;
    }

    Ok(buf)
}

/// Decode packet type and seq from raw bytes
pub fn decode_header(data: &[u8]) -> StdResult<(MsgType, u32), CommError> {
    if data.len() < HEADER_LEN {
        return Err(CommError::DecodeError("Packet too short".to_string()));
    }

    let msg_type = MsgType::from_u8(data[0])
        .ok_or_else(|| CommError::DecodeError(format!("Unknown msg type: {}", data[0])))?;

    let seq = u32::from_be_bytes([data[1], data[2], data[3], data[4]]);

    Ok((msg_type, seq))
}

pub fn decode_request_payload(data: &[u8]) -> StdResult<RequestPayload, CommError> {
    let mut de = Deserializer::new(Cursor::new(data));
    RequestPayload::deserialize(&mut de).map_err(|e| CommError::DecodeError(e.to_string()))
}

pub fn decode_response_payload(data: &[u8]) -> StdResult<ResponsePayload, CommError> {
    let mut de = Deserializer::new(Cursor::new(data));
    ResponsePayload::deserialize(&mut de).map_err(|e| CommError::DecodeError(e.to_string()))
}

/// Parse the JSON arguments of a request; an empty document means no arguments
pub fn parse_arguments(arguments_json: &str) -> StdResult<serde_json::Value, CommError> {
    if arguments_json.trim().is_empty() {
        return Ok(serde_json::Value::Object(Default::default()));
    }
    serde_json::from_str(arguments_json)
        .map_err(|e| CommError::DecodeError(format!("Invalid arguments JSON: {}", e)))
}

pub fn encode_request(seq: u32, payload: &RequestPayload) -> StdResult<Vec<u8>, CommError> {
    encode_packet(MsgType::Request, seq, Some(payload))
}

/// Encode request ack (no payload)
pub fn encode_request_ack(seq: u32) -> StdResult<Vec<u8>, CommError> {
    encode_packet(MsgType::RequestAck, seq, None::<&()>)
}

pub fn encode_response(seq: u32, payload: &ResponsePayload) -> StdResult<Vec<u8>, CommError> {
    encode_packet(MsgType::Response, seq, Some(payload))
}

/// Encode a response whose packet fits in `HEADER_LEN + max_payload_bytes`.
///
/// The longer of `output`/`error` is cut at a UTF-8 boundary and marked.
pub fn encode_response_within(
    seq: u32,
    mut payload: ResponsePayload,
    max_payload_bytes: usize,
) -> StdResult<Vec<u8>, CommError> {
    let limit = HEADER_LEN + max_payload_bytes;

    loop {
        let packet = encode_response(seq, &payload)?;
        if packet.len() <= limit {
            return Ok(packet);
        }
        let excess = packet.len() - limit;

        let text = match (payload.output.as_mut(), payload.error.as_mut()) {
            (Some(out), Some(err)) if err.len() > out.len() => err,
            (Some(out), _) => out,
            (None, Some(err)) => err,
            (None, None) => return Err(CommError::PayloadTooLarge(packet.len())),
        };

        let before = text.len();
        let keep = before.saturating_sub(excess + TRUNCATION_MARKER.len());
        truncate_at_char_boundary(text, keep);
        text.push_str(TRUNCATION_MARKER);
        if text.len() >= before {
            return Err(CommError::PayloadTooLarge(packet.len()));
        }
    }
}

/// Truncate to at most `max_len` bytes without splitting a character
pub fn truncate_at_char_boundary(text: &mut String, max_len: usize) {
    if text.len() <= max_len {
        return;
    }
    let mut cut = max_len;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}
