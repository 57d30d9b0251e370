// Comm module - UDP transport carrying tool calls from clients

pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod types;

pub use config::CommConfig;
pub use error::{CommError, CommInitError};
pub use server::Comm;
pub use types::{ResponsePayload, ToolRequest};
