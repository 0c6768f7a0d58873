// Job Domain Model - identity, lifecycle state and timing

use super::error::{DomainError, Result};
use super::priority::Priority;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Job ID (process-unique, monotonically increasing)
pub type JobId = u64;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

fn next_job_id() -> JobId {
    NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed)
}

/// Job State
///
/// Only ever moves forward: NotStarted -> Running -> Completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    NotStarted,
    Running,
    Completed,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::NotStarted => write!(f, "NOT_STARTED"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// Per-job bookkeeping, exclusively owned by its job
#[derive(Debug)]
pub struct JobRecord {
    id: JobId,
    priority: Priority,
    state: JobState,
    started_at: Option<i64>, // epoch ms
    elapsed: Option<Duration>,
}

impl JobRecord {
    /// Create a record with the next process-wide ID
    pub fn new(priority: Priority) -> Self {
        Self {
            id: next_job_id(),
            priority,
            state: JobState::NotStarted,
            started_at: None,
            elapsed: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn started_at(&self) -> Option<i64> {
        self.started_at
    }

    /// Transition to Running with explicit timestamp
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.state != JobState::NotStarted {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Running.to_string(),
            });
        }
        self.state = JobState::Running;
        self.started_at = Some(now_millis);
        Ok(())
    }

    /// Transition to Completed, freezing the elapsed time
    pub fn stop(&mut self, now_millis: i64) -> Result<()> {
        let started_at = match (self.state, self.started_at) {
            (JobState::Running, Some(started_at)) => started_at,
            _ => {
                return Err(DomainError::InvalidStateTransition {
                    from: self.state.to_string(),
                    to: JobState::Completed.to_string(),
                })
            }
        };
        self.elapsed = Some(millis_between(started_at, now_millis));
        self.state = JobState::Completed;
        Ok(())
    }

    /// Time spent running
    ///
    /// `None` until started, live while running, frozen once completed.
    pub fn elapsed(&self, now_millis: i64) -> Option<Duration> {
        match self.state {
            JobState::NotStarted => None,
            JobState::Running => self
                .started_at
                .map(|started_at| millis_between(started_at, now_millis)),
            JobState::Completed => self.elapsed,
        }
    }
}

// Wall clocks can step backwards; never report a negative duration.
fn millis_between(from: i64, to: i64) -> Duration {
    Duration::from_millis(to.saturating_sub(from).max(0) as u64)
}

/// Read-only snapshot of a job for observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: JobId,
    pub priority: Priority,
    pub title: String,
    pub details: String,
    pub state: JobState,
    pub elapsed: Option<Duration>,
}
