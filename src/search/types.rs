// Data types for Search module - aligned with the Tavily API

use serde::{Deserialize, Serialize};

/// How hard the provider should search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Basic,
    Advanced,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub search_depth: SearchDepth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractResult {
    pub url: String,
    #[serde(default)]
    pub raw_content: String,
}

/// Body of `POST /search`
#[derive(Debug, Serialize)]
pub(crate) struct SearchBody<'a> {
    pub api_key: &'a str,
    pub query: &'a str,
    pub search_depth: SearchDepth,
    pub max_results: u32,
    pub include_answer: bool,
}

/// Body of `POST /extract`
#[derive(Debug, Serialize)]
pub(crate) struct ExtractBody<'a> {
    pub api_key: &'a str,
    pub urls: &'a [String],
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtractResponse {
    #[serde(default)]
    pub results: Vec<ExtractResult>,
}
