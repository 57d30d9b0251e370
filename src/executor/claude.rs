// Coding-agent invocation
//
// Runs the agent CLI non-interactively in a project directory. The prompt is
// untrusted text and travels as a single single-quoted shell argument.

use crate::executor::config::AgentSettings;
use crate::executor::process::ProcessRunner;
use crate::executor::tool::{json_output, parse_input};
use crate::executor::types::effective_timeout;
use crate::executor::{Result, ToolDefinition, ToolImpl, ToolOutput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub const RUN_CLAUDE_CODE: &str = "run_claude_code";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaudeCodeRequest {
    pub project_path: PathBuf,
    pub prompt: String,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// `output` is stdout when the agent wrote any, otherwise stderr
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaudeCodeResult {
    pub output: String,
    pub exit_code: i32,
    pub timed_out: bool,
}

/// Quote a prompt as one shell word.
///
/// Backslashes are doubled first, then each `'` becomes `'\''`, then the
/// whole string is wrapped in single quotes. Swapping the first two steps
/// would double the backslash inside `'\''` and break the quoting.
pub fn quote_prompt(prompt: &str) -> String {
    let escaped = prompt.replace('\\', "\\\\").replace('\'', "'\\''");
    format!("'{}'", escaped)
}

pub struct ClaudeRunner {
    runner: Arc<ProcessRunner>,
    settings: AgentSettings,
}

impl ClaudeRunner {
    pub fn new(runner: Arc<ProcessRunner>, settings: AgentSettings) -> Self {
        Self { runner, settings }
    }

    /// Shell command line for a prompt
    pub fn build_command(&self, prompt: &str) -> String {
        format!(
            "{} --dangerously-skip-permissions --print {}",
            self.settings.binary,
            quote_prompt(prompt)
        )
    }

    pub async fn run(&self, request: &ClaudeCodeRequest) -> ClaudeCodeResult {
        let timeout = effective_timeout(
            request.timeout_seconds,
            self.settings.default_timeout_secs,
            self.settings.max_timeout_secs,
        );
        let command = self.build_command(&request.prompt);

        info!(
            project = %request.project_path.display(),
            prompt_chars = request.prompt.chars().count(),
            timeout_secs = timeout.as_secs(),
            "starting coding agent"
        );

        let result = self
            .runner
            .run_bounded(&command, Some(&request.project_path), timeout)
            .await;

        let output = if result.stdout.is_empty() {
            result.stderr_text()
        } else {
            result.stdout_text()
        };

        ClaudeCodeResult {
            output,
            exit_code: result.exit_code,
            timed_out: result.timed_out,
        }
    }
}

/// `run_claude_code` tool
pub struct ClaudeCodeTool {
    claude: Arc<ClaudeRunner>,
}

impl ClaudeCodeTool {
    pub fn new(claude: Arc<ClaudeRunner>) -> Self {
        Self { claude }
    }
}

#[async_trait]
impl ToolImpl for ClaudeCodeTool {
    fn definition(&self) -> ToolDefinition {
        let settings = &self.claude.settings;
        ToolDefinition {
            name: RUN_CLAUDE_CODE.to_string(),
            description: format!(
                "Run the coding agent against a project directory with a prompt. \
                 Default timeout {}s, maximum {}s.",
                settings.default_timeout_secs, settings.max_timeout_secs
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "projectPath": { "type": "string", "description": "Project directory" },
                    "prompt": { "type": "string", "description": "Instructions for the agent" },
                    "timeoutSeconds": { "type": "integer", "description": "Timeout in seconds" }
                },
                "required": ["projectPath", "prompt"]
            }),
        }
    }

    async fn run(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let request: ClaudeCodeRequest = parse_input(RUN_CLAUDE_CODE, input)?;
        json_output(&self.claude.run(&request).await)
    }
}
