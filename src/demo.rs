//! Demo collaborators used by the `job-bridge` harness binary.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::bridge::{ExecutionDelegate, ExecutionResult, JobFinishedNotifier, JobId, JobParams};
use crate::error::Result;

/// Sleeps for `duration_ms` (default 1000), checking for cancellation in
/// `tick_ms` slices.
///
/// Recognised parameters: `duration_ms`, `tick_ms`, `fail` (return an
/// error), `reschedule` (request rescheduling on success).
#[derive(Debug, Default, Clone, Copy)]
pub struct SleepDelegate;

impl SleepDelegate {
    const DEFAULT_DURATION_MS: u64 = 1_000;
    const DEFAULT_TICK_MS: u64 = 100;
}

#[async_trait]
impl ExecutionDelegate for SleepDelegate {
    async fn execute(
        &self,
        params: JobParams,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult> {
        let duration_ms = params
            .get("duration_ms")
            .and_then(|v| v.as_u64())
            .unwrap_or(Self::DEFAULT_DURATION_MS);
        let tick = Duration::from_millis(
            params
                .get("tick_ms")
                .and_then(|v| v.as_u64())
                .unwrap_or(Self::DEFAULT_TICK_MS)
                .max(1),
        );
        let fail = params.get("fail").and_then(|v| v.as_bool()).unwrap_or(false);
        let reschedule = params
            .get("reschedule")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let mut remaining = Duration::from_millis(duration_ms);
        while !remaining.is_zero() {
            let step = remaining.min(tick);
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Ok(ExecutionResult::failure("cancelled before completion"));
                }
                _ = tokio::time::sleep(step) => {}
            }
            remaining -= step;
        }

        if fail {
            return Err(anyhow::anyhow!("simulated failure after {duration_ms}ms").into());
        }

        Ok(ExecutionResult::success()
            .with_reschedule(reschedule)
            .with_message(format!("slept {duration_ms}ms")))
    }
}

/// Prints each finish signal to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutNotifier;

impl JobFinishedNotifier for StdoutNotifier {
    fn job_finished(&self, job_id: &JobId, wants_reschedule: bool) {
        println!("job_finished {job_id} wants_reschedule={wants_reschedule}");
    }
}
