// Search client - HTTP communication with the search provider

use super::types::{ExtractBody, ExtractResponse, SearchBody, SearchResponse};
use super::{ExtractResult, SearchConfig, SearchError, SearchRequest, SearchResult};
use reqwest::Client;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Results requested per search
const MAX_RESULTS: u32 = 5;
/// URLs forwarded per extract call
const MAX_EXTRACT_URLS: usize = 5;

/// Search provider client. No retries: callers own retry policy.
pub struct SearchClient {
    endpoint: String,
    api_key: RwLock<Option<String>>,
    client: Client,
}

impl SearchClient {
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        info!(
            endpoint = %config.endpoint,
            has_api_key = config.api_key.is_some(),
            timeout_secs = config.request_timeout_secs,
            "initializing search client"
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(SearchError::ClientError)?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: RwLock::new(config.api_key),
            client,
        })
    }

    /// Replace the API key, e.g. after a secret rotation
    pub fn set_api_key(&self, key: impl Into<String>) {
        *self.api_key.write().unwrap_or_else(PoisonError::into_inner) = Some(key.into());
        info!("search API key updated");
    }

    fn api_key(&self) -> Result<String, SearchError> {
        self.api_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(SearchError::MissingApiKey)
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>, SearchError> {
        let api_key = self.api_key()?;
        let body = SearchBody {
            api_key: &api_key,
            query: &request.query,
            search_depth: request.search_depth,
            max_results: MAX_RESULTS,
            include_answer: true,
        };

        let start = Instant::now();
        let response: SearchResponse = self.post("search", &body).await?;

        info!(
            query_chars = request.query.chars().count(),
            depth = ?request.search_depth,
            results = response.results.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "search completed"
        );
        Ok(response.results)
    }

    /// Extract page content; only the first five URLs are sent
    pub async fn extract(&self, urls: &[String]) -> Result<Vec<ExtractResult>, SearchError> {
        let api_key = self.api_key()?;
        if urls.len() > MAX_EXTRACT_URLS {
            debug!(requested = urls.len(), "dropping extract urls past the limit");
        }
        let urls = &urls[..urls.len().min(MAX_EXTRACT_URLS)];
        let body = ExtractBody {
            api_key: &api_key,
            urls,
        };

        let start = Instant::now();
        let response: ExtractResponse = self.post("extract", &body).await?;

        info!(
            urls = urls.len(),
            results = response.results.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "extract completed"
        );
        Ok(response.results)
    }

    async fn post<B, R>(&self, operation: &'static str, body: &B) -> Result<R, SearchError>
    where
        B: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.endpoint, operation);
        debug!(url = %url, "sending HTTP request");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        debug!(status = status.as_u16(), "received HTTP response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(operation = operation, status = status.as_u16(), "search provider error");
            return Err(SearchError::RequestFailed {
                operation,
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}
