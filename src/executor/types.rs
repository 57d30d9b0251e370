// Data types for Executor module

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Tool definition advertised to the dispatch layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Output from a successful tool execution; failures travel as `ExecutorError`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The text rendering of the component result
    pub content: String,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Inbound tool call: a tool name plus its JSON arguments
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Outcome of a dispatched tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub tool_call_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
}

/// Timeout and output bounds for one class of process execution
#[derive(Debug, Clone)]
pub struct ExecutionConstraints {
    /// Timeout used when the request does not name one
    pub default_timeout_secs: u64,
    /// Hard ceiling; requests above it are clamped
    pub max_timeout_secs: u64,
    /// Maximum bytes retained per output stream
    pub max_output_bytes: usize,
    /// Working directory when the request does not name one
    pub working_dir: Option<PathBuf>,
}

impl Default for ExecutionConstraints {
    fn default() -> Self {
        Self {
            default_timeout_secs: 60,
            max_timeout_secs: 300,
            max_output_bytes: 512_000,
            working_dir: None,
        }
    }
}

impl ExecutionConstraints {
    /// `min(requested or default, max)`. A requested value of zero counts as absent.
    pub fn effective_timeout(&self, requested: Option<u64>) -> Duration {
        effective_timeout(
            requested,
            self.default_timeout_secs,
            self.max_timeout_secs,
        )
    }
}

pub(crate) fn effective_timeout(requested: Option<u64>, default: u64, max: u64) -> Duration {
    let secs = requested.filter(|s| *s > 0).unwrap_or(default);
    Duration::from_secs(secs.min(max))
}

/// A single process execution request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    /// Command line, interpreted by the shell
    pub command: String,
    /// Working directory, defaults to the operator's home directory
    #[serde(default, alias = "cwd")]
    pub working_directory: Option<PathBuf>,
    /// Requested timeout, clamped to the runner's hard maximum
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl ExecutionRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_seconds = Some(secs);
        self
    }
}

/// Result of one bounded process execution
///
/// `stdout` and `stderr` each hold at most the runner's output cap; anything
/// the process wrote past that is dropped without a marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
    pub timed_out: bool,
}

impl ExecutionResult {
    /// Result for a process that never started
    pub fn spawn_failure(message: impl Into<String>) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: message.into().into_bytes(),
            exit_code: 1,
            timed_out: false,
        }
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// stdout followed by stderr, the way composed operations report output
    pub fn combined_text(&self) -> String {
        let mut text = self.stdout_text();
        text.push_str(&self.stderr_text());
        text
    }
}

/// Text view of an [`ExecutionResult`], used when rendering tool output
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
}

impl From<&ExecutionResult> for ShellExecOutput {
    fn from(result: &ExecutionResult) -> Self {
        Self {
            stdout: result.stdout_text(),
            stderr: result.stderr_text(),
            exit_code: result.exit_code,
            timed_out: result.timed_out,
        }
    }
}
