//! Job handle state machine.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bridge::job::JobId;

/// State of a dispatched job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Handle exists but nothing has been started yet.
    Idle,
    /// Work is in flight; completion will be reported asynchronously.
    Running,
    /// Work finished on its own.
    Completed,
    /// Work finished after a stop was requested.
    Cancelled,
}

impl JobState {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: JobState) -> bool {
        use JobState::*;

        matches!(
            (self, target),
            (Idle, Running) | (Running, Completed) | (Running, Cancelled)
        )
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// A state transition event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: JobState,
    pub to: JobState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// One scheduling cycle of a job, owned by the dispatch bridge.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub job_id: JobId,
    /// Distinguishes this cycle from earlier and later cycles of the same id.
    pub run_id: Uuid,
    pub state: JobState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set once a stop arrived while running.
    pub cancel_requested_at: Option<DateTime<Utc>>,
    pub transitions: Vec<StateTransition>,
}

impl JobHandle {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            run_id: Uuid::new_v4(),
            state: JobState::Idle,
            started_at: None,
            finished_at: None,
            cancel_requested_at: None,
            transitions: Vec::new(),
        }
    }

    /// Transition to a new state.
    pub fn transition_to(
        &mut self,
        new_state: JobState,
        reason: Option<String>,
    ) -> Result<(), String> {
        if !self.state.can_transition_to(new_state) {
            return Err(format!(
                "Cannot transition job {} from {} to {}",
                self.job_id, self.state, new_state
            ));
        }

        self.transitions.push(StateTransition {
            from: self.state,
            to: new_state,
            timestamp: Utc::now(),
            reason,
        });
        self.state = new_state;

        if new_state == JobState::Running {
            self.started_at = Some(Utc::now());
        } else if new_state.is_terminal() {
            self.finished_at = Some(Utc::now());
        }

        Ok(())
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested_at.is_some()
    }

    /// Record a stop request. Returns `false` if the handle is not running
    /// or a stop was already recorded.
    pub fn request_cancel(&mut self) -> bool {
        if self.state != JobState::Running || self.cancel_requested() {
            return false;
        }
        self.cancel_requested_at = Some(Utc::now());
        true
    }

    /// Terminal state this cycle ends in once execution finishes.
    pub fn terminal_state(&self) -> JobState {
        if self.cancel_requested() {
            JobState::Cancelled
        } else {
            JobState::Completed
        }
    }

    /// Time since the job started running.
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|start| {
            let end = self.finished_at.unwrap_or_else(Utc::now);
            end.signed_duration_since(start)
                .to_std()
                .unwrap_or(Duration::ZERO)
        })
    }

    /// `elapsed` in whole milliseconds, saturating at `u64::MAX`.
    pub fn elapsed_ms(&self) -> Option<u64> {
        self.elapsed()
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.job_id.clone(),
            run_id: self.run_id,
            state: self.state,
            started_at: self.started_at,
            cancel_requested: self.cancel_requested(),
            elapsed_ms: self.elapsed_ms(),
        }
    }
}

/// Read-only view of an active job for status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub run_id: Uuid,
    pub state: JobState,
    pub started_at: Option<DateTime<Utc>>,
    pub cancel_requested: bool,
    pub elapsed_ms: Option<u64>,
}
