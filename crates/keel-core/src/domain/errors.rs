//! Errors - エラー型と分類
//!
//! - OrchestratorError: orchestrator 側から返るエラー（そのまま呼び出し元へ）
//! - LifecycleError: controller / monitor の操作エラー
//!
//! どのエラーもリトライしません。リトライは呼び出し側の責務です。

use super::ids::TaskId;
use super::options::ValidationError;
use super::state::TaskState;

/// ErrorKind は操作エラーの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 入力が不正（ネットワーク呼び出し前に検出）
    Validation,
    /// rollout が収束しなかった（task 失敗 / timeout / 新 task なし）
    Rollout,
    /// orchestrator との通信・競合
    Infrastructure,
    Cancelled,
}

/// Errors surfaced by an orchestrator client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestratorError {
    #[error("service not found: {0}")]
    NotFound(String),

    #[error("service already exists: {0}")]
    AlreadyExists(String),

    #[error("version conflict on service {service}: submitted {submitted}, current {current}")]
    VersionConflict {
        service: String,
        submitted: u64,
        current: u64,
    },

    #[error("orchestrator transport error: {0}")]
    Transport(String),
}

/// Failure of one lifecycle operation.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("task {task_id} of service {service} is {state}: {}", detail_or_default(.detail))]
    TaskFailed {
        service: String,
        task_id: TaskId,
        state: TaskState,
        detail: Option<String>,
    },

    #[error("service {service} did not reach running within {polls} polls")]
    Timeout { service: String, polls: u32 },

    #[error("no new tasks observed for service {service} after {polls} polls")]
    NoNewTasks { service: String, polls: u32 },

    #[error("monitoring of service {service} was cancelled")]
    Cancelled { service: String },

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

fn detail_or_default(detail: &Option<String>) -> &str {
    detail.as_deref().unwrap_or("no error detail")
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::Validation(_) => ErrorKind::Validation,
            LifecycleError::TaskFailed { .. }
            | LifecycleError::Timeout { .. }
            | LifecycleError::NoNewTasks { .. } => ErrorKind::Rollout,
            LifecycleError::Cancelled { .. } => ErrorKind::Cancelled,
            LifecycleError::Orchestrator(_) => ErrorKind::Infrastructure,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LifecycleError::Orchestrator(OrchestratorError::NotFound(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_failure_message_includes_detail() {
        let err = LifecycleError::TaskFailed {
            service: "web".to_string(),
            task_id: TaskId::new("t2"),
            state: TaskState::Rejected,
            detail: Some("no suitable node".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "task t2 of service web is rejected: no suitable node"
        );
        assert_eq!(err.kind(), ErrorKind::Rollout);
    }

    #[test]
    fn orchestrator_errors_are_infrastructure() {
        let err: LifecycleError = OrchestratorError::NotFound("web".to_string()).into();
        assert!(err.is_not_found());
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert_eq!(err.to_string(), "service not found: web");
    }

    #[test]
    fn validation_errors_convert() {
        let err: LifecycleError = ValidationError::NotAnObject("null").into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
