//! Job signal receiver — the entry point the external scheduler calls.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bridge::dispatcher::DispatchBridge;
use crate::bridge::job::{JobId, JobParams};
use crate::bridge::observer::BridgeObserver;
use crate::error::DispatchError;

const TAG: &str = "JobSignalReceiver";

/// What a start signal resulted in, from the external scheduler's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    /// Work continues in the background; `job_finished` will follow.
    AsyncPending,
    /// Nothing is running for this signal and no notification will follow.
    SynchronouslyDone,
}

impl StartOutcome {
    pub fn continues_async(self) -> bool {
        matches!(self, Self::AsyncPending)
    }
}

/// Adapts scheduler callbacks onto the dispatch bridge.
///
/// Holds no per-job state of its own; every signal is resolved against the
/// bridge's registry.
#[derive(Clone)]
pub struct JobSignalReceiver {
    bridge: DispatchBridge,
    observer: Arc<dyn BridgeObserver>,
}

impl JobSignalReceiver {
    pub fn new(bridge: DispatchBridge) -> Self {
        let observer = Arc::clone(bridge.observer());
        Self { bridge, observer }
    }

    pub fn bridge(&self) -> &DispatchBridge {
        &self.bridge
    }

    /// Handle a start signal. Never blocks on the work itself.
    pub fn on_start(&self, job_id: impl Into<JobId>, params: JobParams) -> StartOutcome {
        let job_id = job_id.into();
        self.observer.debug(TAG, &format!("on_start {job_id}"));

        match self.bridge.dispatch(job_id, params) {
            Ok(_) => StartOutcome::AsyncPending,
            // The execution already in flight will report back.
            Err(DispatchError::DuplicateDispatch { .. }) => StartOutcome::AsyncPending,
            Err(e) => {
                self.observer.warn(TAG, &format!("start rejected: {e}"));
                StartOutcome::SynchronouslyDone
            }
        }
    }

    /// Handle a stop signal. Returns whether the job should be rescheduled.
    pub fn on_stop(&self, job_id: impl Into<JobId>) -> bool {
        let job_id = job_id.into();
        self.observer.debug(TAG, &format!("on_stop {job_id}"));

        self.bridge.cancel(&job_id)
    }
}
