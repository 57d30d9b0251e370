//! j52 worker: executes tool calls (shell, git, files, coding agent, web
//! search) sent over UDP, with background jobs and project file watching.

pub mod comm;
pub mod executor;
pub mod scheduler;
pub mod search;
pub mod watcher;
pub mod worker;
