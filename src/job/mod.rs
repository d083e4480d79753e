//! Job lifecycle types and parallel dispatch.

pub mod dispatch;
pub mod executor;

use std::fmt;

/// Lifecycle state of one job invocation.
///
/// Transitions are `NotStarted -> Running -> {Completed, Failed}`;
/// `CancelRequested` may be entered from any non-terminal state at any time
/// and leads to `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    NotStarted,
    Running,
    CancelRequested,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

/// Aggregate outcome of a job's parallel work items.
///
/// Cancellation is strictly dominant over failure: a job that was cancelled
/// reports `Cancelled` even when individual work items also failed, so a
/// deliberate abort is never mistaken for a real build error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every work item succeeded.
    Completed,
    /// One or more work items failed and no cancel was requested.
    Failed { failures: usize },
    /// Cancellation was requested while the job was in flight.
    Cancelled,
}

impl JobOutcome {
    /// Whether the job finished with every work item succeeding.
    pub fn success(&self) -> bool {
        matches!(self, JobOutcome::Completed)
    }

    /// Whether the job was aborted by a cancel request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobOutcome::Cancelled)
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Completed => write!(f, "completed"),
            JobOutcome::Failed { failures } => write!(f, "failed ({} work item(s))", failures),
            JobOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}
