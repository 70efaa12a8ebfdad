//! Execution delegate — the host application's unit of work.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::bridge::job::JobParams;
use crate::error::Result;

/// Outcome of one execution, produced by the delegate when work finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    /// Ask the external scheduler to run the job again per its backoff policy.
    pub reschedule_requested: bool,
    pub message: Option<String>,
}

impl ExecutionResult {
    pub fn success() -> Self {
        Self {
            success: true,
            reschedule_requested: false,
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            reschedule_requested: false,
            message: Some(message.into()),
        }
    }

    pub fn with_reschedule(mut self, reschedule: bool) -> Self {
        self.reschedule_requested = reschedule;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Performs the actual work behind a deferred job.
///
/// Implementations should check `cancel` at their own checkpoints and return
/// promptly once it fires; the returned result is still reported to the
/// external scheduler. Errors are converted into a failed result by the
/// bridge, and a delegate that ignores cancellation is abandoned after the
/// configured grace period.
#[async_trait]
pub trait ExecutionDelegate: Send + Sync {
    async fn execute(
        &self,
        params: JobParams,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult>;
}
