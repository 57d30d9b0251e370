// Error types for Worker module

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerConfigError {
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}
