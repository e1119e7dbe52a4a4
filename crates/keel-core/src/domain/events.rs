//! Events - monitor が発行する構造化イベント
//!
//! EventSink（ports::event_sink）に渡されます。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// イベントの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// baseline を確定した
    Baseline,
    /// 新しい task が 1 件も見つからなかった
    NoNewTasks,
    /// 新しい task が初めて running になった
    TaskRunning,
    /// 新しい task が failed / rejected になった
    TaskFailed,
    /// running 後の追加観測中
    Settling,
    Converged,
    TimedOut,
    Cancelled,
}

/// MonitorEvent は monitor の観測結果 1 件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorEvent {
    pub category: EventCategory,
    pub service: String,
    pub message: String,

    /// task_id, state, polls などの文脈情報
    #[serde(default)]
    pub fields: serde_json::Value,

    pub at: DateTime<Utc>,
}

impl MonitorEvent {
    pub fn new(
        category: EventCategory,
        service: impl Into<String>,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            category,
            service: service.into(),
            message: message.into(),
            fields: serde_json::Value::Object(serde_json::Map::new()),
            at,
        }
    }

    pub fn with_fields(mut self, fields: serde_json::Value) -> Self {
        self.fields = fields;
        self
    }
}
