// Scheduler module - recurring background jobs on a coarse polling tick

pub mod config;
pub mod error;
pub mod scheduler;
pub mod types;

pub use config::SchedulerConfig;
pub use error::{JobError, Result, SchedulerError};
pub use scheduler::Scheduler;
pub use types::{JobHandler, JobId, JobInfo};
