// Scheduler events for observers (job tables, status indicators)

use crate::domain::JobInfo;

/// Notifications broadcast by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Work became available after the scheduler was idle
    Busy,
    /// Nothing pending and nothing running
    Idle,
    /// A job transitioned to Running
    JobStarted(JobInfo),
    /// A job's completion was observed; carries its final record
    JobEnded(JobInfo),
    /// The pause flag changed
    PauseChanged { paused: bool },
}
