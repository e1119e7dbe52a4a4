//! ScriptedTasks - 決まったスナップショット列を返す TaskSnapshotProvider
//!
//! monitor のテスト用です。n 回目の呼び出しは n 番目のスナップショットを返し、
//! 列を使い切ったあとは最後のスナップショットを返し続けます。

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::domain::{OrchestratorError, Task};
use crate::ports::TaskSnapshotProvider;

pub struct ScriptedTasks {
    snapshots: Vec<Vec<Task>>,
    calls: AtomicUsize,
    /// (呼び出し番号, 返すエラー)
    failure: Option<(usize, OrchestratorError)>,
}

impl ScriptedTasks {
    pub fn new(snapshots: Vec<Vec<Task>>) -> Self {
        Self {
            snapshots,
            calls: AtomicUsize::new(0),
            failure: None,
        }
    }

    /// `call` 回目（0 始まり）の呼び出しだけ `error` を返す
    pub fn failing_at(mut self, call: usize, error: OrchestratorError) -> Self {
        self.failure = Some((call, error));
        self
    }

    /// これまでの `list_tasks` 呼び出し回数（失敗した呼び出しを含む）
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskSnapshotProvider for ScriptedTasks {
    async fn list_tasks(&self, _service: &str) -> Result<Vec<Task>, OrchestratorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some((at, error)) = &self.failure {
            if *at == call {
                return Err(error.clone());
            }
        }

        let index = call.min(self.snapshots.len().saturating_sub(1));
        Ok(self.snapshots.get(index).cloned().unwrap_or_default())
    }
}
