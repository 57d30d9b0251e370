// Executor configuration

use crate::executor::types::ExecutionConstraints;
use std::path::PathBuf;
use tracing::warn;

/// Parse an environment variable, logging a warning if the value is present but invalid.
pub(crate) fn parse_env_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(v) => match v.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(var = name, value = %v, "Invalid env var value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Coding-agent invocation settings
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Agent executable, resolved through the shell's PATH
    pub binary: String,
    /// Timeout applied when the caller does not ask for one
    pub default_timeout_secs: u64,
    /// Hard ceiling for any agent run
    pub max_timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            binary: "claude".to_string(),
            default_timeout_secs: 600,
            max_timeout_secs: 900,
        }
    }
}

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Default execution constraints for shell commands
    pub constraints: ExecutionConstraints,
    /// Coding-agent settings
    pub agent: AgentSettings,
    /// Upper bound on concurrently running child processes
    pub max_concurrent_processes: usize,
    /// Path to tools.toml configuration file
    pub tools_toml_path: PathBuf,
    /// Shell interpreter for command execution
    pub shell: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            constraints: ExecutionConstraints::default(),
            agent: AgentSettings::default(),
            max_concurrent_processes: 8,
            tools_toml_path: PathBuf::from("tools.toml"),
            shell: String::from("bash"),
        }
    }
}

impl ExecutorConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = ExecutorConfig::default();

        config.shell = parse_env_var("J52_SHELL", config.shell);
        config.constraints.default_timeout_secs = parse_env_var(
            "J52_DEFAULT_TIMEOUT_SECS",
            config.constraints.default_timeout_secs,
        );
        config.constraints.max_timeout_secs =
            parse_env_var("J52_MAX_TIMEOUT_SECS", config.constraints.max_timeout_secs);
        config.constraints.max_output_bytes =
            parse_env_var("J52_MAX_OUTPUT_BYTES", config.constraints.max_output_bytes);
        config.max_concurrent_processes =
            parse_env_var("J52_MAX_CONCURRENT_PROCESSES", config.max_concurrent_processes);
        config.agent.binary = parse_env_var("J52_AGENT_BINARY", config.agent.binary);
        config.agent.default_timeout_secs = parse_env_var(
            "J52_AGENT_DEFAULT_TIMEOUT_SECS",
            config.agent.default_timeout_secs,
        );
        config.agent.max_timeout_secs =
            parse_env_var("J52_AGENT_MAX_TIMEOUT_SECS", config.agent.max_timeout_secs);
        config.tools_toml_path = parse_env_var("J52_TOOLS_TOML", config.tools_toml_path);

        if config.max_concurrent_processes == 0 {
            warn!("J52_MAX_CONCURRENT_PROCESSES must be positive, using 1");
            config.max_concurrent_processes = 1;
        }

        config
    }
}
