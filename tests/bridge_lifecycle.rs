//! Integration tests for the job bridge.
//!
//! Each test drives the public receiver the way an OS scheduler would and
//! records every `job_finished` signal the bridge emits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{Notify, Semaphore};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use job_bridge::bridge::{
    DispatchBridge, ExecutionDelegate, ExecutionResult, JobFinishedNotifier, JobId, JobParams,
    JobSignalReceiver, StartOutcome,
};
use job_bridge::config::BridgeConfig;
use job_bridge::error::{Error, Result};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Records finish signals and wakes waiters on each one.
#[derive(Default)]
struct RecordingNotifier {
    finished: Mutex<Vec<(JobId, bool)>>,
    changed: Notify,
}

impl RecordingNotifier {
    fn finished(&self) -> Vec<(JobId, bool)> {
        self.finished.lock().unwrap().clone()
    }

    fn count_for(&self, id: &str) -> usize {
        self.finished
            .lock()
            .unwrap()
            .iter()
            .filter(|(job, _)| job.as_str() == id)
            .count()
    }

    async fn wait_for(&self, total: usize) {
        timeout(TEST_TIMEOUT, async {
            loop {
                let notified = self.changed.notified();
                if self.finished.lock().unwrap().len() >= total {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("timed out waiting for job_finished");
    }
}

impl JobFinishedNotifier for RecordingNotifier {
    fn job_finished(&self, job_id: &JobId, wants_reschedule: bool) {
        self.finished
            .lock()
            .unwrap()
            .push((job_id.clone(), wants_reschedule));
        self.changed.notify_waiters();
    }
}

/// Engine stub: behaviour selected by the `mode` parameter.
struct EngineStub {
    executions: Mutex<HashMap<String, usize>>,
    release: Semaphore,
    total: AtomicUsize,
}

impl Default for EngineStub {
    fn default() -> Self {
        Self {
            executions: Mutex::new(HashMap::new()),
            release: Semaphore::new(0),
            total: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ExecutionDelegate for EngineStub {
    async fn execute(
        &self,
        params: JobParams,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult> {
        self.total.fetch_add(1, Ordering::SeqCst);
        let tag = params
            .get("tag")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        *self.executions.lock().unwrap().entry(tag).or_default() += 1;

        match params.get("mode").and_then(|v| v.as_str()).unwrap_or("ok") {
            "ok" => Ok(ExecutionResult::success().with_reschedule(
                params
                    .get("reschedule")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            )),
            "cooperative" => {
                cancel.cancelled().await;
                Ok(ExecutionResult::failure("acknowledged stop"))
            }
            "late" => {
                // Ignores the token, finishes once released.
                let _permit = self.release.acquire().await;
                Ok(ExecutionResult::success())
            }
            "fault" => Err(anyhow::anyhow!("engine exploded").into()),
            other => Err(Error::Delegate(format!("unknown mode {other}"))),
        }
    }
}

struct Harness {
    receiver: JobSignalReceiver,
    notifier: Arc<RecordingNotifier>,
    engine: Arc<EngineStub>,
}

fn harness(config: BridgeConfig) -> Harness {
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = Arc::new(EngineStub::default());
    let bridge = DispatchBridge::new(
        config,
        engine.clone(),
        notifier.clone(),
        tokio::runtime::Handle::current(),
    );
    Harness {
        receiver: JobSignalReceiver::new(bridge),
        notifier,
        engine,
    }
}

#[tokio::test]
async fn test_sync_job_reports_finished_without_reschedule() {
    let h = harness(BridgeConfig::default());

    let outcome = h.receiver.on_start(
        "sync-1",
        JobParams::from(json!({ "mode": "ok", "reschedule": false })),
    );
    assert_eq!(outcome, StartOutcome::AsyncPending);

    h.notifier.wait_for(1).await;
    assert_eq!(h.notifier.finished(), vec![(JobId::from("sync-1"), false)]);
    assert!(!h.receiver.bridge().is_running(&JobId::from("sync-1")));
}

#[tokio::test]
async fn test_cancelled_job_requests_reschedule() {
    let h = harness(BridgeConfig::default());

    h.receiver
        .on_start("cancel-1", JobParams::from(json!({ "mode": "cooperative" })));
    let snapshot = h.receiver.bridge().snapshot(&JobId::from("cancel-1")).unwrap();
    assert!(!snapshot.cancel_requested);

    assert!(h.receiver.on_stop("cancel-1"));

    h.notifier.wait_for(1).await;
    assert_eq!(h.notifier.finished(), vec![(JobId::from("cancel-1"), true)]);
}

#[tokio::test]
async fn test_late_finish_after_stop_notifies_once() {
    let h = harness(BridgeConfig::default());

    h.receiver
        .on_start("late-1", JobParams::from(json!({ "mode": "late" })));
    assert!(h.receiver.on_stop("late-1"));
    assert!(h.receiver.on_stop("late-1"));
    h.engine.release.add_permits(1);

    h.notifier.wait_for(1).await;
    h.receiver.bridge().shutdown().await;
    assert_eq!(h.notifier.count_for("late-1"), 1);
}

#[tokio::test]
async fn test_duplicate_start_executes_once() {
    let h = harness(BridgeConfig::default());
    let params = JobParams::from(json!({ "mode": "cooperative", "tag": "dup" }));

    assert!(h.receiver.on_start("dup-1", params.clone()).continues_async());
    assert!(h.receiver.on_start("dup-1", params).continues_async());

    h.receiver.bridge().shutdown().await;
    assert_eq!(h.engine.executions.lock().unwrap()["dup"], 1);
    assert_eq!(h.notifier.count_for("dup-1"), 1);
}

#[tokio::test]
async fn test_stop_unknown_job_is_noop() {
    let h = harness(BridgeConfig::default());

    assert!(!h.receiver.on_stop("never-started"));
    assert_eq!(h.receiver.bridge().running_count(), 0);

    h.receiver.bridge().shutdown().await;
    assert!(h.notifier.finished().is_empty());
}

#[tokio::test]
async fn test_engine_fault_still_reports_finished() {
    let h = harness(BridgeConfig::default());

    h.receiver
        .on_start("fault-1", JobParams::from(json!({ "mode": "fault" })));

    h.notifier.wait_for(1).await;
    assert_eq!(h.notifier.finished(), vec![(JobId::from("fault-1"), true)]);
}

#[tokio::test(start_paused = true)]
async fn test_stubborn_engine_is_abandoned_after_grace() {
    let h = harness(BridgeConfig {
        cancel_grace_period: Duration::from_millis(500),
        ..BridgeConfig::default()
    });

    h.receiver
        .on_start("stubborn-1", JobParams::from(json!({ "mode": "late" })));
    assert!(h.receiver.on_stop("stubborn-1"));

    h.notifier.wait_for(1).await;
    assert_eq!(h.notifier.finished(), vec![(JobId::from("stubborn-1"), true)]);
    assert_eq!(h.receiver.bridge().running_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_signals_from_foreign_threads() {
    let h = harness(BridgeConfig::default());

    // Scheduler callbacks arrive on threads the runtime does not own.
    let threads: Vec<_> = (0..8)
        .map(|i| {
            let receiver = h.receiver.clone();
            std::thread::spawn(move || {
                receiver.on_start(
                    format!("job-{i}"),
                    JobParams::from(json!({ "mode": "ok", "tag": format!("job-{i}") })),
                )
            })
        })
        .collect();
    for thread in threads {
        assert_eq!(thread.join().unwrap(), StartOutcome::AsyncPending);
    }

    h.notifier.wait_for(8).await;
    h.receiver.bridge().shutdown().await;

    assert_eq!(h.engine.total.load(Ordering::SeqCst), 8);
    for i in 0..8 {
        assert_eq!(h.notifier.count_for(&format!("job-{i}")), 1);
    }
}

#[tokio::test]
async fn test_default_config_accepts_every_concurrent_job() {
    const JOBS: usize = 40;
    let h = harness(BridgeConfig::default());

    for i in 0..JOBS {
        let outcome = h.receiver.on_start(
            format!("batch-{i}"),
            JobParams::from(json!({ "mode": "cooperative", "tag": format!("batch-{i}") })),
        );
        assert_eq!(outcome, StartOutcome::AsyncPending, "batch-{i} was turned away");
    }
    assert_eq!(h.receiver.bridge().running_count(), JOBS);

    timeout(TEST_TIMEOUT, h.receiver.bridge().shutdown())
        .await
        .expect("shutdown hung");

    assert_eq!(h.engine.total.load(Ordering::SeqCst), JOBS);
    assert_eq!(h.notifier.finished().len(), JOBS);
    for i in 0..JOBS {
        assert_eq!(h.notifier.count_for(&format!("batch-{i}")), 1);
    }
}
