//! Task lifecycle states and the monitor's own phases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a task as reported by the orchestrator.
///
/// Serialized in lowercase (`"running"`, `"rejected"`, ...) to match the
/// orchestrator's wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    New,
    Pending,
    Assigned,
    Preparing,
    Starting,
    Running,
    Complete,
    Failed,
    Shutdown,
    Rejected,
    Orphaned,
}

/// The three buckets the monitor reacts to (plus everything else).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    /// new / pending: the orchestrator has not settled the task yet.
    Unsettled,
    Running,
    /// failed / rejected.
    Failure,
    /// Settled but neither running nor failed (assigned, complete, shutdown, ...).
    Other,
}

impl TaskState {
    pub fn phase(self) -> TaskPhase {
        match self {
            TaskState::New | TaskState::Pending => TaskPhase::Unsettled,
            TaskState::Running => TaskPhase::Running,
            TaskState::Failed | TaskState::Rejected => TaskPhase::Failure,
            TaskState::Assigned
            | TaskState::Preparing
            | TaskState::Starting
            | TaskState::Complete
            | TaskState::Shutdown
            | TaskState::Orphaned => TaskPhase::Other,
        }
    }

    /// Settled tasks are eligible for the baseline set.
    pub fn is_settled(self) -> bool {
        self.phase() != TaskPhase::Unsettled
    }

    /// The orchestrator is still moving the task towards running.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            TaskState::New
                | TaskState::Pending
                | TaskState::Assigned
                | TaskState::Preparing
                | TaskState::Starting
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::New => "new",
            TaskState::Pending => "pending",
            TaskState::Assigned => "assigned",
            TaskState::Preparing => "preparing",
            TaskState::Starting => "starting",
            TaskState::Running => "running",
            TaskState::Complete => "complete",
            TaskState::Failed => "failed",
            TaskState::Shutdown => "shutdown",
            TaskState::Rejected => "rejected",
            TaskState::Orphaned => "orphaned",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of one monitor session.
///
/// State transitions:
/// - Init -> Observing
/// - Observing -> RunningUnconfirmed (first new task seen running)
/// - RunningUnconfirmed -> RunningSettling -> ... (extended observation)
/// - any non-terminal -> Converged / Failed / TimedOut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorPhase {
    Init,
    Observing,
    RunningUnconfirmed,
    RunningSettling,
    Converged,
    Failed,
    TimedOut,
}

impl MonitorPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MonitorPhase::Converged | MonitorPhase::Failed | MonitorPhase::TimedOut
        )
    }
}
