// Executor module - bounded process execution and the tools built on it

pub mod claude;
pub mod config;
pub mod error;
pub mod files;
pub mod git;
pub mod process;
pub mod runner;
pub mod shell;
pub mod tool;
pub mod types;
pub mod web;

pub use config::ExecutorConfig;
pub use error::{ExecutorError, Result};
pub use process::ProcessRunner;
pub use runner::Executor;
pub use tool::ToolImpl;
pub use types::{
    ExecutionConstraints, ExecutionRequest, ExecutionResult, ToolCall, ToolDefinition, ToolOutput,
    ToolResult,
};
