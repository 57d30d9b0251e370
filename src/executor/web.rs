// Web search and extract tools

use crate::executor::tool::{json_output, parse_input};
use crate::executor::{Result, ToolDefinition, ToolImpl, ToolOutput};
use crate::search::{SearchClient, SearchRequest};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

pub const WEB_SEARCH: &str = "web_search";
pub const WEB_EXTRACT: &str = "web_extract";

pub struct WebSearchTool {
    client: Arc<SearchClient>,
}

impl WebSearchTool {
    pub fn new(client: Arc<SearchClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolImpl for WebSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: WEB_SEARCH.to_string(),
            description: "Search the web; returns up to 5 results with title, url, content and score."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search query" },
                    "searchDepth": {
                        "type": "string",
                        "enum": ["basic", "advanced"],
                        "description": "Search depth (default basic)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn run(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let request: SearchRequest = parse_input(WEB_SEARCH, input)?;
        json_output(&self.client.search(&request).await?)
    }
}

#[derive(Debug, Deserialize)]
struct ExtractInput {
    urls: Vec<String>,
}

pub struct WebExtractTool {
    client: Arc<SearchClient>,
}

impl WebExtractTool {
    pub fn new(client: Arc<SearchClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolImpl for WebExtractTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: WEB_EXTRACT.to_string(),
            description: "Extract the raw content of up to 5 web pages.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "urls": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Page URLs; only the first 5 are used"
                    }
                },
                "required": ["urls"]
            }),
        }
    }

    async fn run(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let ExtractInput { urls } = parse_input(WEB_EXTRACT, input)?;
        json_output(&self.client.extract(&urls).await?)
    }
}
