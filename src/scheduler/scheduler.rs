// Job scheduler: named recurring jobs driven by one fixed-rate polling loop

use super::config::SchedulerConfig;
use super::error::{JobError, Result, SchedulerError};
use super::types::{JobEntry, JobHandler, JobId, JobInfo};
use futures::FutureExt;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Polling loop handle while the scheduler is running
struct RunningLoop {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

struct Inner {
    tick: Duration,
    jobs: Mutex<BTreeMap<JobId, JobEntry>>,
    next_id: AtomicU64,
}

/// Coarse-grained recurring job scheduler.
///
/// Every tick, jobs are checked in registration order and due handlers run
/// one after another. A job whose interval is shorter than the tick still
/// runs at most once per tick.
pub struct Scheduler {
    inner: Arc<Inner>,
    running: Mutex<Option<RunningLoop>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                tick: config.tick,
                jobs: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
            }),
            running: Mutex::new(None),
        }
    }

    /// Register a recurring job. Takes effect from the next tick.
    pub fn register<F, Fut>(&self, name: impl Into<String>, interval: Duration, handler: F) -> Result<JobId>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), JobError>> + Send + 'static,
    {
        let handler: JobHandler = Arc::new(move || handler().boxed());
        self.register_handler(name, interval, handler)
    }

    pub fn register_handler(
        &self,
        name: impl Into<String>,
        interval: Duration,
        handler: JobHandler,
    ) -> Result<JobId> {
        let name = name.into();
        let mut jobs = self.inner.jobs();
        if jobs.values().any(|job| job.name == name) {
            return Err(SchedulerError::DuplicateName(name));
        }

        let id = JobId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        info!(job = %name, id = %id, interval_ms = interval.as_millis() as u64, "job registered");
        jobs.insert(
            id,
            JobEntry {
                name,
                interval,
                handler,
                last_run: None,
                paused: false,
                runs: 0,
                failures: 0,
            },
        );
        Ok(id)
    }

    /// Remove a job. A run already in progress finishes.
    pub fn remove(&self, id: JobId) -> Result<()> {
        let entry = self
            .inner
            .jobs()
            .remove(&id)
            .ok_or(SchedulerError::UnknownJob(id))?;
        info!(job = %entry.name, id = %id, "job removed");
        Ok(())
    }

    /// Skip a job on future ticks until resumed
    pub fn pause(&self, id: JobId) -> Result<()> {
        self.set_paused(id, true)
    }

    pub fn resume(&self, id: JobId) -> Result<()> {
        self.set_paused(id, false)
    }

    fn set_paused(&self, id: JobId, paused: bool) -> Result<()> {
        let mut jobs = self.inner.jobs();
        let job = jobs.get_mut(&id).ok_or(SchedulerError::UnknownJob(id))?;
        job.paused = paused;
        debug!(job = %job.name, id = %id, paused = paused, "job pause state changed");
        Ok(())
    }

    /// Snapshot of all jobs in registration order
    pub fn jobs(&self) -> Vec<JobInfo> {
        self.inner
            .jobs()
            .iter()
            .map(|(id, job)| JobInfo {
                id: *id,
                name: job.name.clone(),
                interval: job.interval,
                last_run: job.last_run,
                paused: job.paused,
                runs: job.runs,
                failures: job.failures,
            })
            .collect()
    }

    pub fn is_running(&self) -> bool {
        self.running().is_some()
    }

    /// Start the polling loop. No-op when already running.
    ///
    /// The first tick fires one period after start.
    pub fn start(&self) {
        let mut running = self.running();
        if running.is_some() {
            debug!("scheduler already running");
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let inner = self.inner.clone();
        let tick = inner.tick;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    now = interval.tick() => inner.run_due(now).await,
                }
            }
            debug!("scheduler loop exited");
        });

        info!(
            jobs = self.inner.jobs().len(),
            tick_secs = tick.as_secs_f64(),
            "scheduler started"
        );
        *running = Some(RunningLoop {
            shutdown: shutdown_tx,
            handle,
        });
    }

    /// Stop scheduling. A handler that is mid-run is left to finish.
    pub fn stop(&self) {
        if let Some(running) = self.running().take() {
            // The loop only observes shutdown between ticks
            let _ = running.shutdown.send(());
            drop(running.handle);
            info!("scheduler stopped");
        }
    }

    /// Run one tick's due-check at `now`, as the polling loop does
    pub async fn run_due(&self, now: Instant) {
        self.inner.run_due(now).await
    }

    fn running(&self) -> MutexGuard<'_, Option<RunningLoop>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn jobs(&self) -> MutexGuard<'_, BTreeMap<JobId, JobEntry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_due(&self, now: Instant) {
        let ids: Vec<JobId> = self.jobs().keys().copied().collect();

        for id in ids {
            // Re-check under the lock: the job may have been removed or paused
            // by an earlier handler in this tick
            let due = {
                let mut jobs = self.jobs();
                match jobs.get_mut(&id) {
                    Some(job) if !job.paused && job.is_due(now) => {
                        job.last_run = Some(now);
                        Some((job.name.clone(), job.handler.clone()))
                    }
                    _ => None,
                }
            };

            let Some((name, handler)) = due else {
                continue;
            };

            debug!(job = %name, "running job");
            let start = Instant::now();
            let outcome = AssertUnwindSafe(handler()).catch_unwind().await;

            let failed = match outcome {
                Ok(Ok(())) => {
                    debug!(job = %name, duration_ms = start.elapsed().as_millis() as u64, "job finished");
                    false
                }
                Ok(Err(e)) => {
                    error!(job = %name, error = %e, "scheduled job failed");
                    true
                }
                Err(_) => {
                    error!(job = %name, "scheduled job panicked");
                    true
                }
            };

            if let Some(job) = self.jobs().get_mut(&id) {
                job.runs += 1;
                if failed {
                    job.failures += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn scheduler() -> Scheduler {
        Scheduler::new(SchedulerConfig::default())
    }

    fn counting_job(counter: &Arc<AtomicUsize>) -> impl Fn() -> futures::future::Ready<std::result::Result<(), JobError>> + Send + Sync + 'static {
        let counter = counter.clone();
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok(()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_job_does_not_block_others() {
        let sched = scheduler();
        let fast = Arc::new(AtomicUsize::new(0));
        let slow = Arc::new(AtomicUsize::new(0));

        let fast_calls = fast.clone();
        sched
            .register("fast", Duration::from_millis(5000), move || {
                fast_calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(JobError::failed("boom")) }
            })
            .unwrap();
        sched
            .register("slow", Duration::from_millis(25000), counting_job(&slow))
            .unwrap();

        sched.start();
        tokio::time::sleep(Duration::from_secs(65)).await;
        sched.stop();

        assert_eq!(fast.load(Ordering::SeqCst), 6);
        let slow_runs = slow.load(Ordering::SeqCst);
        assert!((2..=3).contains(&slow_runs), "slow ran {} times", slow_runs);

        let info = sched.jobs();
        assert_eq!(info[0].failures, 6);
        assert_eq!(info[1].failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let sched = scheduler();
        let count = Arc::new(AtomicUsize::new(0));
        sched
            .register("job", Duration::from_secs(1), counting_job(&count))
            .unwrap();

        sched.start();
        sched.start();
        assert!(sched.is_running());
        tokio::time::sleep(Duration::from_secs(35)).await;

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_runs() {
        let sched = scheduler();
        let count = Arc::new(AtomicUsize::new(0));
        sched
            .register("job", Duration::from_secs(1), counting_job(&count))
            .unwrap();

        sched.start();
        tokio::time::sleep(Duration::from_secs(15)).await;
        sched.stop();
        assert!(!sched.is_running());
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_does_not_preempt_running_handler() {
        let sched = scheduler();
        let finished = Arc::new(AtomicUsize::new(0));
        let done = finished.clone();
        sched
            .register("long", Duration::from_secs(1), move || {
                let done = done.clone();
                async move {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), JobError>(())
                }
            })
            .unwrap();

        sched.start();
        tokio::time::sleep(Duration::from_secs(11)).await;
        sched.stop();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_added_after_start_run_next_tick() {
        let sched = scheduler();
        sched.start();
        tokio::time::sleep(Duration::from_secs(15)).await;

        let count = Arc::new(AtomicUsize::new(0));
        sched
            .register("late", Duration::from_secs(60), counting_job(&count))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_due_check_and_last_run() {
        let sched = scheduler();
        let count = Arc::new(AtomicUsize::new(0));
        let id = sched
            .register("job", Duration::from_secs(30), counting_job(&count))
            .unwrap();

        let t0 = Instant::now();
        sched.run_due(t0).await;
        sched.run_due(t0 + Duration::from_secs(29)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sched.run_due(t0 + Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        let info = sched.jobs();
        assert_eq!(info[0].id, id);
        assert_eq!(info[0].last_run, Some(t0 + Duration::from_secs(30)));
        assert_eq!(info[0].runs, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_resume_remove() {
        let sched = scheduler();
        let count = Arc::new(AtomicUsize::new(0));
        let id = sched
            .register("job", Duration::ZERO, counting_job(&count))
            .unwrap();
        let t0 = Instant::now();

        sched.pause(id).unwrap();
        sched.run_due(t0).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        sched.resume(id).unwrap();
        sched.run_due(t0).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sched.remove(id).unwrap();
        sched.run_due(t0 + Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(matches!(sched.remove(id), Err(SchedulerError::UnknownJob(_))));
        assert!(matches!(sched.pause(id), Err(SchedulerError::UnknownJob(_))));
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let sched = scheduler();
        let count = Arc::new(AtomicUsize::new(0));
        sched
            .register("job", Duration::from_secs(1), counting_job(&count))
            .unwrap();

        let err = sched
            .register("job", Duration::from_secs(2), counting_job(&count))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateName(name) if name == "job"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_handler_is_isolated() {
        let sched = scheduler();
        let after = Arc::new(AtomicUsize::new(0));
        sched
            .register("panics", Duration::ZERO, || async {
                let broken = true;
                if broken {
                    panic!("handler bug");
                }
                Ok::<(), JobError>(())
            })
            .unwrap();
        sched
            .register("after", Duration::ZERO, counting_job(&after))
            .unwrap();

        sched.run_due(Instant::now()).await;
        sched.run_due(Instant::now()).await;

        assert_eq!(after.load(Ordering::SeqCst), 2);
        assert_eq!(sched.jobs()[0].failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_run_sequentially_in_registration_order() {
        let sched = scheduler();
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let order = order.clone();
            sched
                .register(name, Duration::ZERO, move || {
                    let order = order.clone();
                    async move {
                        order.lock().unwrap().push(format!("{name}-start"));
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        order.lock().unwrap().push(format!("{name}-end"));
                        Ok::<(), JobError>(())
                    }
                })
                .unwrap();
        }

        sched.run_due(Instant::now()).await;

        let order = order.lock().unwrap().clone();
        assert_eq!(
            order,
            vec![
                "first-start",
                "first-end",
                "second-start",
                "second-end",
                "third-start",
                "third-end"
            ]
        );
    }
}
