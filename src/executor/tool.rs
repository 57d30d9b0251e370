// Tool trait and shared helpers

use crate::executor::{ExecutorError, Result, ToolDefinition, ToolOutput};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Internal trait for tool implementations
#[async_trait]
pub trait ToolImpl: Send + Sync {
    /// Get the tool definition (name, description, input_schema)
    fn definition(&self) -> ToolDefinition;

    /// Run the tool with JSON input
    async fn run(&self, input: serde_json::Value) -> Result<ToolOutput>;

    /// Get tool name
    fn name(&self) -> String {
        self.definition().name
    }
}

/// Deserialize tool arguments, mapping failures to `InvalidInput`
pub fn parse_input<T: DeserializeOwned>(tool: &str, input: serde_json::Value) -> Result<T> {
    serde_json::from_value(input)
        .map_err(|e| ExecutorError::InvalidInput(tool.to_string(), e.to_string()))
}

/// Serialize a structured tool result as pretty JSON
pub fn json_output<T: serde::Serialize>(value: &T) -> Result<ToolOutput> {
    Ok(ToolOutput::success(serde_json::to_string_pretty(value)?))
}

/// Load tool description overrides from a TOML file
///
/// ```toml
/// [run_shell]
/// description = "..."
/// ```
pub fn load_tool_descriptions(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        debug!(path = %path.display(), "tools.toml not found, using default descriptions");
        return Ok(HashMap::new());
    }

    let content = std::fs::read_to_string(path)?;
    let config: toml::Table = content.parse()?;

    let descriptions: HashMap<String, String> = config
        .iter()
        .filter_map(|(name, value)| {
            value
                .get("description")
                .and_then(|d| d.as_str())
                .map(|d| (name.clone(), d.to_string()))
        })
        .collect();

    debug!(path = %path.display(), tool_count = descriptions.len(), "loaded tool descriptions from config");
    Ok(descriptions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_tools_toml_is_empty() {
        let descriptions = load_tool_descriptions(Path::new("/nonexistent/tools.toml")).unwrap();
        assert!(descriptions.is_empty());
    }

    #[test]
    fn test_load_tool_descriptions() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[run_shell]\ndescription = \"custom shell\"\n\n[git_log]\nother = 1\n"
        )
        .unwrap();

        let descriptions = load_tool_descriptions(file.path()).unwrap();
        assert_eq!(descriptions.len(), 1);
        assert_eq!(descriptions["run_shell"], "custom shell");
    }

    #[test]
    fn test_parse_input_reports_tool() {
        #[derive(Debug, serde::Deserialize)]
        struct Args {
            #[allow(dead_code)]
            path: String,
        }

        let err = parse_input::<Args>("read_text_file", serde_json::json!({})).unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidInput(tool, _) if tool == "read_text_file"));
    }
}
