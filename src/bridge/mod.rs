//! Deferred job dispatch bridge.
//!
//! Core components:
//! - `job` — Job ids and opaque parameters
//! - `state` — Handle state machine (Idle → Running → Completed/Cancelled)
//! - `delegate` — The host's unit of work and its result
//! - `observer` — Finish notifier and diagnostics sink
//! - `dispatcher` — Handle registry, supervision and cancellation
//! - `receiver` — Start/stop entry point for the external scheduler

pub mod delegate;
pub mod dispatcher;
pub mod job;
pub mod observer;
pub mod receiver;
pub mod state;

pub use delegate::{ExecutionDelegate, ExecutionResult};
pub use dispatcher::DispatchBridge;
pub use job::{JobId, JobParams};
pub use observer::{BridgeObserver, JobFinishedNotifier, TracingObserver};
pub use receiver::{JobSignalReceiver, StartOutcome};
pub use state::{JobHandle, JobSnapshot, JobState};
