use serde::{Deserialize, Serialize};

use super::ids::TaskId;
use super::state::TaskState;

/// One observed task of a service.
///
/// Snapshots are fetched fresh on every poll. Only the `id` survives between
/// polls (for baseline membership).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub service: String,
    pub state: TaskState,

    /// Error detail reported alongside failed / rejected states.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, service: impl Into<String>, state: TaskState) -> Self {
        Self {
            id: id.into(),
            service: service.into(),
            state,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
