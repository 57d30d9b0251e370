// Search module - web search and page extraction client

use crate::executor::config::parse_env_var;

pub mod client;
pub mod error;
pub mod types;

pub use client::SearchClient;
pub use error::SearchError;
pub use types::{ExtractResult, SearchDepth, SearchRequest, SearchResult};

/// Search provider configuration
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Provider base URL
    pub endpoint: String,
    /// API key; calls fail with `MissingApiKey` while unset
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.tavily.com".to_string(),
            api_key: None,
            request_timeout_secs: 30,
        }
    }
}

impl SearchConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Self {
            endpoint: parse_env_var("TAVILY_API_URL", defaults.endpoint),
            api_key: std::env::var("TAVILY_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            request_timeout_secs: parse_env_var(
                "TAVILY_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
        }
    }

    /// The API key currently in `.env`, read without touching the process
    /// environment
    pub fn api_key_from_dotenv() -> Option<String> {
        dotenvy::dotenv_iter()
            .ok()?
            .filter_map(|item| item.ok())
            .find(|(key, _)| key == "TAVILY_API_KEY")
            .map(|(_, value)| value)
            .filter(|k| !k.is_empty())
    }
}
