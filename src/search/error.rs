// Error types for Search module

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search API key not configured")]
    MissingApiKey,

    #[error("{operation} failed: HTTP {status}: {body}")]
    RequestFailed {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Failed to create HTTP client: {0}")]
    ClientError(reqwest::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
