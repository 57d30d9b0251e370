use crate::comm::error::CommInitError;
use crate::executor::config::parse_env_var;
use std::net::SocketAddr;

/// Comm module configuration
#[derive(Debug, Clone)]
pub struct CommConfig {
    /// Listen address (default: 0.0.0.0)
    pub listen_addr: String,
    /// Listen port (default: 9700)
    pub listen_port: u16,
    /// Maximum payload size in bytes, both directions (default: 65000)
    pub max_payload_bytes: usize,
    /// Deduplication table capacity per client (default: 256)
    pub dedup_capacity: usize,
    /// Seconds an answered request stays deduplicated (default: 300)
    pub dedup_ttl_secs: u64,
    /// How long to wait for a tool result (default: 960, above the agent hard maximum)
    pub response_timeout_secs: u64,
}

impl Default for CommConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 9700,
            max_payload_bytes: 65000,
            dedup_capacity: 256,
            dedup_ttl_secs: 300,
            response_timeout_secs: 960,
        }
    }
}

impl CommConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Self {
            listen_addr: parse_env_var("J52_LISTEN_ADDR", defaults.listen_addr),
            listen_port: parse_env_var("J52_LISTEN_PORT", defaults.listen_port),
            ..defaults
        }
    }

    /// Returns the socket address to bind to
    pub fn bind_addr(&self) -> Result<SocketAddr, CommInitError> {
        let addr = format!("{}:{}", self.listen_addr, self.listen_port);
        addr.parse()
            .map_err(|_| CommInitError::InvalidAddress(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_addr() {
        let config = CommConfig {
            listen_addr: "127.0.0.1".to_string(),
            listen_port: 9701,
            ..Default::default()
        };
        assert_eq!(config.bind_addr().unwrap().port(), 9701);

        let bad = CommConfig {
            listen_addr: "not an address".to_string(),
            ..Default::default()
        };
        assert!(matches!(bad.bind_addr(), Err(CommInitError::InvalidAddress(_))));
    }

    #[test]
    fn test_out_of_range_port_falls_back_to_default() {
        // SAFETY: no other test reads or writes this variable
        unsafe { std::env::set_var("J52_LISTEN_PORT", "99999") };
        assert_eq!(CommConfig::from_env().listen_port, 9700);

        unsafe { std::env::set_var("J52_LISTEN_PORT", "9711") };
        assert_eq!(CommConfig::from_env().listen_port, 9711);

        unsafe { std::env::remove_var("J52_LISTEN_PORT") };
    }
}
