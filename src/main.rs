use j52_worker::comm::{Comm, CommConfig};
use j52_worker::executor::{Executor, ExecutorConfig};
use j52_worker::scheduler::{Scheduler, SchedulerConfig};
use j52_worker::search::{SearchClient, SearchConfig};
use j52_worker::watcher::{ProjectWatcher, WatcherConfig};
use j52_worker::worker::{self, Worker, WorkerConfig};
use std::sync::Arc;
use tokio::signal;
use tracing::{Level, error, info, warn};
use tracing_subscriber::fmt;

fn log_level() -> Level {
    std::env::var("J52_LOG_LEVEL")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(Level::DEBUG)
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable, waiting for Ctrl+C only");
                signal::ctrl_c().await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.ok();
    }
}

/// Re-read the search API key from `.env` on every SIGHUP
#[cfg(unix)]
fn spawn_key_reload(search: Arc<SearchClient>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!(error = %e, "SIGHUP handler unavailable, API key reload disabled");
            return;
        }
    };
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            match SearchConfig::api_key_from_dotenv() {
                Some(key) => search.set_api_key(key),
                None => warn!("SIGHUP received but .env has no TAVILY_API_KEY"),
            }
        }
    });
}

/// Tokio runtime with signal handling
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    fmt()
        .with_max_level(log_level())
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting j52 worker...");

    let comm_config = CommConfig::from_env();
    let executor_config = ExecutorConfig::from_env();
    let search_config = SearchConfig::from_env();
    let scheduler_config = SchedulerConfig::from_env();
    let worker_config = WorkerConfig::from_env()?;

    info!(
        comm_port = comm_config.listen_port,
        shell = %executor_config.shell,
        max_concurrent = executor_config.max_concurrent_processes,
        tick_secs = scheduler_config.tick.as_secs(),
        watch_paths = worker_config.watch_paths.len(),
        "Configuration loaded"
    );

    let (comm, mut request_rx) = Comm::new(comm_config).await?;
    info!(addr = %comm.local_addr()?, "Comm initialized");

    let search = Arc::new(SearchClient::new(search_config)?);
    #[cfg(unix)]
    spawn_key_reload(search.clone());
    let executor = Arc::new(Executor::init(executor_config, search));
    info!(tools = executor.tool_definitions().len(), "Executor initialized");

    let scheduler = Scheduler::new(scheduler_config);
    worker::register_heartbeat(&scheduler, executor.clone(), worker_config.heartbeat_interval)?;
    scheduler.start();

    let mut project_watcher = ProjectWatcher::new(WatcherConfig::default());
    project_watcher.on_change(worker::log_change);
    for path in &worker_config.watch_paths {
        if let Err(e) = project_watcher.watch(path) {
            error!(path = %path.display(), error = %e, "Failed to watch project");
        }
    }

    let comm_handle = tokio::spawn(async move {
        if let Err(e) = comm.run().await {
            error!(error = %e, "Comm server error");
        }
    });

    let worker = Worker::new(executor.clone());

    info!("Entering main loop...");
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            maybe_req = request_rx.recv() => match maybe_req {
                Some(req) => {
                    worker.handle(req);
                }
                None => {
                    warn!("Request channel closed");
                    break;
                }
            },
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    info!(in_flight = executor.in_flight(), "Shutting down...");
    scheduler.stop();
    project_watcher.unwatch_all();
    comm_handle.abort();

    info!("Goodbye!");
    Ok(())
}
