//! Dispatch bridge — owns every active job handle.
//!
//! Each dispatch spawns a supervisor task that runs the execution delegate on
//! its own task, converts errors and panics into failed results, enforces the
//! cancellation grace period, and finally reports the job finished. The
//! supervisor is the only code path that finishes a job, so the external
//! scheduler hears about each dispatch exactly once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::bridge::delegate::{ExecutionDelegate, ExecutionResult};
use crate::bridge::job::{JobId, JobParams};
use crate::bridge::observer::{BridgeObserver, JobFinishedNotifier, TracingObserver};
use crate::bridge::state::{JobHandle, JobSnapshot, JobState};
use crate::config::BridgeConfig;
use crate::error::DispatchError;

const TAG: &str = "DispatchBridge";

/// Tracked job: its handle plus the token used to stop it.
struct TrackedJob {
    handle: JobHandle,
    cancel: CancellationToken,
}

/// Maps active job ids to their in-flight executions.
#[derive(Clone)]
pub struct DispatchBridge {
    config: Arc<BridgeConfig>,
    delegate: Arc<dyn ExecutionDelegate>,
    notifier: Arc<dyn JobFinishedNotifier>,
    observer: Arc<dyn BridgeObserver>,
    jobs: Arc<Mutex<HashMap<JobId, TrackedJob>>>,
    runtime: Handle,
    tasks: TaskTracker,
    /// Parent of every per-job token; cancelled on shutdown.
    shutdown: CancellationToken,
}

impl DispatchBridge {
    /// Create a bridge that spawns work onto `runtime`.
    pub fn new(
        config: BridgeConfig,
        delegate: Arc<dyn ExecutionDelegate>,
        notifier: Arc<dyn JobFinishedNotifier>,
        runtime: Handle,
    ) -> Self {
        Self {
            config: Arc::new(config),
            delegate,
            notifier,
            observer: Arc::new(TracingObserver),
            jobs: Arc::new(Mutex::new(HashMap::new())),
            runtime,
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Replace the default tracing observer.
    pub fn with_observer(mut self, observer: Arc<dyn BridgeObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn observer(&self) -> &Arc<dyn BridgeObserver> {
        &self.observer
    }

    fn lock_jobs(&self) -> MutexGuard<'_, HashMap<JobId, TrackedJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start executing `job_id`. Returns as soon as the work is spawned.
    ///
    /// A job id that is already running is never started twice: the
    /// duplicate is logged and rejected, and the existing execution keeps
    /// its single finish notification.
    pub fn dispatch(&self, job_id: JobId, params: JobParams) -> Result<Uuid, DispatchError> {
        let mut jobs = self.lock_jobs();

        if self.shutdown.is_cancelled() {
            return Err(DispatchError::ShuttingDown);
        }

        if let Some(existing) = jobs.get(&job_id) {
            let active_run = existing.handle.run_id;
            drop(jobs);
            let err = DispatchError::DuplicateDispatch { job_id };
            self.observer
                .warn(TAG, &format!("{err} (active run {active_run})"));
            return Err(err);
        }

        let max = self.config.max_active_jobs;
        if max > 0 && jobs.len() >= max {
            return Err(DispatchError::CapacityExceeded { max });
        }

        let mut handle = JobHandle::new(job_id.clone());
        if let Err(reason) = handle.transition_to(JobState::Running, Some("Dispatched".to_string()))
        {
            return Err(DispatchError::ExecutionFault { job_id, reason });
        }
        let run_id = handle.run_id;
        let cancel = self.shutdown.child_token();

        jobs.insert(
            job_id.clone(),
            TrackedJob {
                handle,
                cancel: cancel.clone(),
            },
        );

        // Spawned while the map is locked so shutdown can never miss it.
        let bridge = self.clone();
        let supervised_id = job_id.clone();
        self.tasks.spawn_on(
            async move { bridge.supervise(supervised_id, run_id, params, cancel).await },
            &self.runtime,
        );
        drop(jobs);

        tracing::info!(job_id = %job_id, run_id = %run_id, "Job dispatched");
        self.observer
            .debug(TAG, &format!("dispatched job {job_id} (run {run_id})"));
        Ok(run_id)
    }

    /// Request cooperative cancellation of a running job.
    ///
    /// Returns whether the bridge wants the job rescheduled. The job is
    /// reported finished later, once the delegate returns or the grace
    /// period runs out. Unknown ids are logged and otherwise ignored.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        let newly_requested = {
            let mut jobs = self.lock_jobs();
            match jobs.get_mut(job_id) {
                Some(tracked) => {
                    if tracked.handle.request_cancel() {
                        tracked.cancel.cancel();
                        Some((true, tracked.handle.run_id))
                    } else {
                        Some((false, tracked.handle.run_id))
                    }
                }
                None => None,
            }
        };

        match newly_requested {
            Some((true, run_id)) => {
                tracing::info!(
                    job_id = %job_id,
                    run_id = %run_id,
                    "Job cancellation requested"
                );
            }
            Some((false, _)) => {
                self.observer.debug(
                    TAG,
                    &format!("job {job_id} already cancelling, ignoring repeated stop"),
                );
            }
            None => {
                let err = DispatchError::UnknownJob {
                    job_id: job_id.clone(),
                };
                self.observer.debug(TAG, &format!("stop ignored: {err}"));
                return false;
            }
        }

        self.config.reschedule_on_cancel
    }

    /// Run the delegate and report the outcome. Always ends in exactly one
    /// call to `on_execution_finished`.
    async fn supervise(
        self,
        job_id: JobId,
        run_id: Uuid,
        params: JobParams,
        cancel: CancellationToken,
    ) {
        let delegate = Arc::clone(&self.delegate);
        let token = cancel.clone();
        let mut work = tokio::spawn(async move { delegate.execute(params, token).await });

        let grace = self.config.cancel_grace_period;
        let grace_expired = async {
            cancel.cancelled().await;
            tokio::time::sleep(grace).await;
        };

        let result = tokio::select! {
            biased;
            joined = &mut work => self.result_from_join(&job_id, joined),
            _ = grace_expired => {
                work.abort();
                let err = DispatchError::CancellationTimeout {
                    job_id: job_id.clone(),
                    grace,
                };
                self.observer.warn(TAG, &err.to_string());
                ExecutionResult::failure(err.to_string())
            }
        };

        self.on_execution_finished(&job_id, run_id, result);
    }

    fn result_from_join(
        &self,
        job_id: &JobId,
        joined: Result<crate::error::Result<ExecutionResult>, JoinError>,
    ) -> ExecutionResult {
        let reason = match joined {
            Ok(Ok(result)) => return result,
            Ok(Err(e)) => e.to_string(),
            Err(e) if e.is_panic() => format!("delegate panicked: {e}"),
            Err(e) => format!("delegate task aborted: {e}"),
        };

        let err = DispatchError::ExecutionFault {
            job_id: job_id.clone(),
            reason,
        };
        self.observer.warn(TAG, &err.to_string());
        ExecutionResult::failure(err.to_string()).with_reschedule(self.config.reschedule_on_fault)
    }

    /// Finish one run: move it to its terminal state, drop the handle and
    /// notify the external scheduler. Returns `false` when `run_id` is not
    /// the active run for `job_id`, in which case nothing happens.
    pub(crate) fn on_execution_finished(
        &self,
        job_id: &JobId,
        run_id: Uuid,
        result: ExecutionResult,
    ) -> bool {
        let removed = {
            let mut jobs = self.lock_jobs();
            match jobs.remove(job_id) {
                Some(tracked) if tracked.handle.run_id == run_id => Ok(tracked),
                Some(other) => {
                    jobs.insert(job_id.clone(), other);
                    Err("stale finish")
                }
                None => Err("finish for inactive job"),
            }
        };
        let mut tracked = match removed {
            Ok(tracked) => tracked,
            Err(what) => {
                self.observer.warn(
                    TAG,
                    &format!("{what} {job_id} (run {run_id}), ignoring"),
                );
                return false;
            }
        };

        let terminal = tracked.handle.terminal_state();
        let wants_reschedule = match terminal {
            JobState::Cancelled => self.config.reschedule_on_cancel || result.reschedule_requested,
            _ => result.reschedule_requested,
        };

        if let Err(reason) = tracked.handle.transition_to(terminal, result.message.clone()) {
            self.observer.warn(TAG, &reason);
        }

        tracing::info!(
            job_id = %job_id,
            run_id = %run_id,
            state = %terminal,
            success = result.success,
            wants_reschedule,
            elapsed_ms = tracked.handle.elapsed_ms(),
            transitions = tracked.handle.transitions.len(),
            "Job finished"
        );

        self.notifier.job_finished(job_id, wants_reschedule);
        true
    }

    /// Check if a job is running.
    pub fn is_running(&self, job_id: &JobId) -> bool {
        self.lock_jobs().contains_key(job_id)
    }

    /// Get count of running jobs.
    pub fn running_count(&self) -> usize {
        self.lock_jobs().len()
    }

    /// Get all running job ids, sorted.
    pub fn running_jobs(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.lock_jobs().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn snapshot(&self, job_id: &JobId) -> Option<JobSnapshot> {
        self.lock_jobs().get(job_id).map(|t| t.handle.snapshot())
    }

    /// Stop accepting work, cancel every running job and wait until each
    /// one has been reported finished.
    pub async fn shutdown(&self) {
        {
            let mut jobs = self.lock_jobs();
            self.shutdown.cancel();
            for tracked in jobs.values_mut() {
                tracked.handle.request_cancel();
            }
            tracing::info!(active = jobs.len(), "Dispatch bridge shutting down");
        }

        self.tasks.close();
        self.tasks.wait().await;
    }
}
