// Worker module - dispatch loop glue and built-in background jobs

pub mod config;
pub mod dispatch;
pub mod error;
pub mod jobs;

pub use config::WorkerConfig;
pub use dispatch::Worker;
pub use error::WorkerConfigError;
pub use jobs::{HEARTBEAT_JOB, log_change, register_heartbeat};
