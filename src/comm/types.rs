use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::sync::oneshot;

/// Message types for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    /// Client → worker: a tool call
    Request = 0x01,
    /// Worker → client: the tool call was received
    RequestAck = 0x02,
    /// Worker → client: the tool call's result
    Response = 0x03,
}

impl MsgType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::Request),
            0x02 => Some(Self::RequestAck),
            0x03 => Some(Self::Response),
            _ => None,
        }
    }
}

/// Request payload from client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPayload {
    /// Caller-chosen id echoed back in the response
    pub tool_call_id: String,
    pub tool_name: String,
    /// Tool arguments as a JSON document; empty means `{}`
    pub arguments_json: String,
}

/// Response payload to client.
///
/// Optional fields are encoded as nil; the encoding is positional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub tool_call_id: String,
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
    pub execution_time_ms: Option<u64>,
}

impl ResponsePayload {
    pub fn failure(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            success: false,
            output: None,
            error: Some(error.into()),
            execution_time_ms: None,
        }
    }
}

/// Tool call forwarded from Comm to the dispatch loop
#[derive(Debug)]
pub struct ToolRequest {
    pub tool_call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    /// Channel to send the result back to Comm
    pub reply: oneshot::Sender<ResponsePayload>,
    /// Client source address
    pub source_addr: SocketAddr,
}
