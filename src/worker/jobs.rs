// Built-in background jobs and the watcher's logging listener

use crate::executor::Executor;
use crate::scheduler::{JobError, JobId, Scheduler, SchedulerError};
use crate::watcher::FileChangeEvent;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

pub const HEARTBEAT_JOB: &str = "heartbeat";

/// Register the periodic liveness log
pub fn register_heartbeat(
    scheduler: &Scheduler,
    executor: Arc<Executor>,
    interval: Duration,
) -> Result<JobId, SchedulerError> {
    let started = Instant::now();
    scheduler.register(HEARTBEAT_JOB, interval, move || {
        let executor = executor.clone();
        async move {
            let rss_kb = resident_set_kb().await?;
            info!(
                uptime_secs = started.elapsed().as_secs(),
                rss_kb = rss_kb,
                in_flight = executor.in_flight(),
                "heartbeat"
            );
            Ok::<(), JobError>(())
        }
    })
}

/// Resident set size in KiB; `None` where /proc is unavailable
async fn resident_set_kb() -> Result<Option<u64>, JobError> {
    if !cfg!(target_os = "linux") {
        return Ok(None);
    }
    let statm = tokio::fs::read_to_string("/proc/self/statm").await?;
    Ok(parse_statm_rss(&statm).map(|pages| pages * page_size() / 1024))
}

/// Second field of /proc/self/statm, in pages
fn parse_statm_rss(statm: &str) -> Option<u64> {
    statm.split_whitespace().nth(1)?.parse().ok()
}

fn page_size() -> u64 {
    // SAFETY: sysconf has no preconditions
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as u64 } else { 4096 }
}

/// Watcher listener standing in for the notification path
pub fn log_change(event: &FileChangeEvent) {
    info!(
        kind = ?event.kind,
        path = %event.path.display(),
        at = %event.timestamp.to_rfc3339(),
        "file changed"
    );
}
