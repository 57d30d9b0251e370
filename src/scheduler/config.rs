// Scheduler configuration

use crate::executor::config::parse_env_var;
use std::time::Duration;
use tracing::warn;

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Polling period; no job runs more often than once per tick
    pub tick: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(10),
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        let secs = parse_env_var("J52_SCHEDULER_TICK_SECS", config.tick.as_secs());
        if secs == 0 {
            warn!("J52_SCHEDULER_TICK_SECS must be positive, using default");
        } else {
            config.tick = Duration::from_secs(secs);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_tick_falls_back_to_default() {
        // SAFETY: no other test reads or writes this variable
        unsafe { std::env::set_var("J52_SCHEDULER_TICK_SECS", "0") };
        assert_eq!(SchedulerConfig::from_env().tick, Duration::from_secs(10));

        unsafe { std::env::set_var("J52_SCHEDULER_TICK_SECS", "3") };
        assert_eq!(SchedulerConfig::from_env().tick, Duration::from_secs(3));

        unsafe { std::env::set_var("J52_SCHEDULER_TICK_SECS", "soon") };
        assert_eq!(SchedulerConfig::from_env().tick, Duration::from_secs(10));

        unsafe { std::env::remove_var("J52_SCHEDULER_TICK_SECS") };
    }
}
