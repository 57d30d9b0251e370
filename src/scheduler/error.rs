// Error types for Scheduler module

use super::JobId;
use thiserror::Error;

/// Scheduler registry errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Unknown job: {0}")]
    UnknownJob(JobId),

    #[error("A job named '{0}' is already registered")]
    DuplicateName(String),
}

/// Failure reported by a job handler; logged by the scheduler, never propagated
#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
