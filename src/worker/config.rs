// Worker configuration

use super::error::WorkerConfigError;
use crate::executor::config::parse_env_var;
use std::path::PathBuf;
use std::time::Duration;

/// Daemon-level settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Period of the heartbeat job
    pub heartbeat_interval: Duration,
    /// Project directories watched from startup
    pub watch_paths: Vec<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            watch_paths: Vec::new(),
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, WorkerConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let heartbeat_secs = parse_env_var("J52_HEARTBEAT_SECS", defaults.heartbeat_interval.as_secs());
        if heartbeat_secs == 0 {
            return Err(WorkerConfigError::InvalidValue {
                var: "J52_HEARTBEAT_SECS",
                reason: "must be at least 1".to_string(),
            });
        }

        let watch_paths = std::env::var("J52_WATCH_PATHS")
            .map(|v| split_watch_paths(&v))
            .unwrap_or_default();

        Ok(Self {
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
            watch_paths,
        })
    }
}

/// Colon-separated list; empty segments are skipped
fn split_watch_paths(value: &str) -> Vec<PathBuf> {
    value
        .split(':')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}
