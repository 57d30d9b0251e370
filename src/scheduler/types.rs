// Data types for Scheduler module

use super::JobError;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Future returned by one run of a job
pub type JobFuture = BoxFuture<'static, Result<(), JobError>>;

/// Job body, invoked once per due tick
pub type JobHandler = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Handle for a registered job; ids grow with registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub(crate) u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Registry entry, owned by the scheduler
pub(crate) struct JobEntry {
    pub name: String,
    pub interval: Duration,
    pub handler: JobHandler,
    pub last_run: Option<Instant>,
    pub paused: bool,
    pub runs: u64,
    pub failures: u64,
}

impl JobEntry {
    /// Never-run jobs are always due
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_run {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        }
    }
}

/// Point-in-time view of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub id: JobId,
    pub name: String,
    pub interval: Duration,
    pub last_run: Option<Instant>,
    pub paused: bool,
    /// Handler invocations, successful or not
    pub runs: u64,
    pub failures: u64,
}
