// Error types for Executor module

use crate::search::SearchError;
use thiserror::Error;

/// Executor error types
///
/// Process failures and timeouts never surface here: they are reported inside
/// [`ExecutionResult`](super::ExecutionResult). These variants cover dispatch,
/// argument validation and filesystem access.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid input for tool '{0}': {1}")]
    InvalidInput(String, String),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
