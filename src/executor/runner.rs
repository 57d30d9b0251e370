// Main Executor implementation: tool registry and dispatch

use crate::executor::claude::{ClaudeCodeTool, ClaudeRunner};
use crate::executor::config::ExecutorConfig;
use crate::executor::error::{ExecutorError, Result};
use crate::executor::files::{ListDirectoryTool, ReadFileTool};
use crate::executor::git::{GitOperation, GitOps, GitTool};
use crate::executor::process::ProcessRunner;
use crate::executor::shell::{RUN_SHELL, ShellTool, default_shell_description};
use crate::executor::tool::{ToolImpl, load_tool_descriptions};
use crate::executor::types::{ToolCall, ToolDefinition, ToolOutput, ToolResult};
use crate::executor::web::{WebExtractTool, WebSearchTool};
use crate::search::SearchClient;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Tool registry and dispatcher
pub struct Executor {
    config: ExecutorConfig,
    tools: RwLock<HashMap<String, Arc<dyn ToolImpl>>>,
    descriptions: HashMap<String, String>,
    in_flight: AtomicUsize,
}

impl Executor {
    /// Build the executor with every built-in tool registered
    pub fn init(config: ExecutorConfig, search: Arc<SearchClient>) -> Self {
        debug!(
            default_timeout_secs = config.constraints.default_timeout_secs,
            max_timeout_secs = config.constraints.max_timeout_secs,
            max_output_bytes = config.constraints.max_output_bytes,
            max_concurrent = config.max_concurrent_processes,
            shell = %config.shell,
            "initializing executor"
        );

        let descriptions = load_tool_descriptions(&config.tools_toml_path).unwrap_or_else(|e| {
            warn!(path = %config.tools_toml_path.display(), error = %e, "ignoring unreadable tools.toml");
            HashMap::new()
        });

        let runner = Arc::new(ProcessRunner::from_config(&config));
        let executor = Self {
            tools: RwLock::new(HashMap::new()),
            descriptions,
            in_flight: AtomicUsize::new(0),
            config,
        };

        let shell_desc = default_shell_description(&runner);
        executor.register(Arc::new(ShellTool::new(runner.clone(), shell_desc)));
        executor.register(Arc::new(ReadFileTool));
        executor.register(Arc::new(ListDirectoryTool));

        let claude = Arc::new(ClaudeRunner::new(runner.clone(), executor.config.agent.clone()));
        executor.register(Arc::new(ClaudeCodeTool::new(claude)));

        let git = Arc::new(GitOps::new(runner));
        for operation in GitOperation::ALL {
            executor.register(Arc::new(GitTool::new(git.clone(), operation)));
        }

        executor.register(Arc::new(WebSearchTool::new(search.clone())));
        executor.register(Arc::new(WebExtractTool::new(search)));

        info!(tool_count = executor.tool_count(), "executor initialized with tools");
        executor
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&self, tool: Arc<dyn ToolImpl>) {
        let name = tool.name();
        let previous = self
            .tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), tool);
        if previous.is_some() {
            warn!(tool_name = %name, "replaced existing tool");
        }
    }

    pub fn tool_count(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Tool calls currently executing
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Definitions of all tools, sorted by name, with tools.toml overrides applied
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        let mut defs: Vec<ToolDefinition> = tools
            .values()
            .map(|t| {
                let mut def = t.definition();
                if let Some(desc) = self.descriptions.get(&def.name) {
                    def.description = desc.clone();
                }
                def
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool by name with JSON input
    pub async fn execute(&self, tool_name: &str, input: serde_json::Value) -> Result<ToolOutput> {
        debug!(tool_name = %tool_name, "looking up tool");

        let tool = {
            let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
            tools.get(tool_name).cloned()
        };

        let tool = tool.ok_or_else(|| ExecutorError::UnknownTool(tool_name.to_string()))?;

        info!(tool_name = %tool_name, "executing tool");
        let _guard = InFlightGuard::enter(&self.in_flight);
        tool.run(input).await
    }

    /// Execute a tool call and package the outcome for the caller
    pub async fn dispatch(&self, call: ToolCall) -> ToolResult {
        let start = Instant::now();
        let outcome = self.execute(&call.tool_name, call.arguments).await;
        let execution_time_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => ToolResult {
                tool_call_id: call.tool_call_id,
                success: true,
                output: Some(output.content),
                error: None,
                execution_time_ms: Some(execution_time_ms),
            },
            Err(e) => {
                warn!(tool_name = %call.tool_name, error = %e, "tool call failed");
                ToolResult {
                    tool_call_id: call.tool_call_id,
                    success: false,
                    output: None,
                    error: Some(e.to_string()),
                    execution_time_ms: Some(execution_time_ms),
                }
            }
        }
    }
}

/// Counts a tool call as in flight until dropped
struct InFlightGuard<'a>(&'a AtomicUsize);

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Names of every built-in tool
pub fn builtin_tool_names() -> Vec<&'static str> {
    let mut names = vec![
        RUN_SHELL,
        crate::executor::files::READ_TEXT_FILE,
        crate::executor::files::LIST_DIRECTORY,
        crate::executor::claude::RUN_CLAUDE_CODE,
        crate::executor::web::WEB_SEARCH,
        crate::executor::web::WEB_EXTRACT,
    ];
    names.extend(GitOperation::ALL.iter().map(|op| op.tool_name()));
    names
}
