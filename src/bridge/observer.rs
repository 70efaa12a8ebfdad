//! Collaborators on the outbound side of the bridge.

/// Receives the job-finished signal destined for the external scheduler.
///
/// Called exactly once per dispatched job, from a background task. Must not
/// block.
pub trait JobFinishedNotifier: Send + Sync {
    fn job_finished(&self, job_id: &crate::bridge::JobId, wants_reschedule: bool);
}

/// Diagnostic sink injected into the bridge.
pub trait BridgeObserver: Send + Sync {
    fn debug(&self, tag: &str, message: &str);

    /// Recovered-but-unexpected conditions. Defaults to `debug`.
    fn warn(&self, tag: &str, message: &str) {
        self.debug(tag, message);
    }
}

/// Observer that forwards to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BridgeObserver for TracingObserver {
    fn debug(&self, tag: &str, message: &str) {
        tracing::debug!(tag, "{}", message);
    }

    fn warn(&self, tag: &str, message: &str) {
        tracing::warn!(tag, "{}", message);
    }
}
