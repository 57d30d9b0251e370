// Shell tool implementation

use crate::executor::process::ProcessRunner;
use crate::executor::tool::{json_output, parse_input};
use crate::executor::types::{ExecutionRequest, ShellExecOutput};
use crate::executor::{Result, ToolDefinition, ToolImpl, ToolOutput};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub const RUN_SHELL: &str = "run_shell";

/// Shell tool: one bounded process per call
pub struct ShellTool {
    runner: Arc<ProcessRunner>,
    description: String,
}

impl ShellTool {
    pub fn new(runner: Arc<ProcessRunner>, description: impl Into<String>) -> Self {
        Self {
            runner,
            description: description.into(),
        }
    }
}

#[async_trait]
impl ToolImpl for ShellTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: RUN_SHELL.to_string(),
            description: self.description.clone(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The shell command to execute"
                    },
                    "cwd": {
                        "type": "string",
                        "description": "Working directory (defaults to the home directory)"
                    },
                    "timeoutSeconds": {
                        "type": "integer",
                        "description": "Timeout in seconds, clamped to the hard maximum"
                    }
                },
                "required": ["command"]
            }),
        }
    }

    async fn run(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let request: ExecutionRequest = parse_input(RUN_SHELL, input)?;
        let result = self.runner.execute(&request).await;

        info!(
            command = %request.command.chars().take(100).collect::<String>(),
            exit_code = result.exit_code,
            timed_out = result.timed_out,
            "shell command executed"
        );

        // Non-zero exits and timeouts are results, not tool failures
        json_output(&ShellExecOutput::from(&result))
    }
}

/// Default shell tool description
pub fn default_shell_description(runner: &ProcessRunner) -> String {
    let c = runner.constraints();
    format!(
        "Execute a shell command on the worker machine.\n\
         Pipes and redirection work. The environment is inherited.\n\
         Default timeout {}s, maximum {}s; the process group is killed on timeout.\n\
         Stdout and stderr are each truncated to {} bytes without a marker.\n\
         Returns JSON with stdout, stderr, exitCode and timedOut.",
        c.default_timeout_secs, c.max_timeout_secs, c.max_output_bytes
    )
}
