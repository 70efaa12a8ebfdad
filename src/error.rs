//! Error types for the job bridge.

use std::time::Duration;

use crate::bridge::JobId;

/// Top-level error type for the bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised by an execution delegate while running a job.
    #[error("Delegate error: {0}")]
    Delegate(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Delegate(format!("{err:#}"))
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Conditions the dispatch bridge recovers from locally.
///
/// None of these ever reach the external scheduler as a fault; they are
/// logged and folded into a start outcome or a failed execution result.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Job {job_id} is already running, ignoring duplicate start")]
    DuplicateDispatch { job_id: JobId },

    #[error("Job {job_id} is not active")]
    UnknownJob { job_id: JobId },

    #[error("Job {job_id} execution failed: {reason}")]
    ExecutionFault { job_id: JobId, reason: String },

    #[error("Job {job_id} did not acknowledge cancellation within {grace:?}")]
    CancellationTimeout { job_id: JobId, grace: Duration },

    #[error("Maximum active jobs ({max}) exceeded")]
    CapacityExceeded { max: usize },

    #[error("Bridge is shutting down")]
    ShuttingDown,
}

/// Result type alias for the bridge.
pub type Result<T> = std::result::Result<T, Error>;
