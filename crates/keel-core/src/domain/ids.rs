//! Domain identifiers (strongly-typed IDs).
//!
//! Service / Task の ID は orchestrator が払い出す不透明な文字列です。
//! Phantom type パターンで `ServiceId` と `TaskId` を型レベルで区別します。
//!
//! in-memory orchestrator は ULID にプレフィックスを付けて ID を生成します
//! （`IdMarker::prefix()`）。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// 生成時に使うプレフィックス（"svc-", "task-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// # 例
/// ```ignore
/// let service_id = ServiceId::new("abc123");
/// let task_id = TaskId::new("abc123");
/// // 同じ文字列でも異なる型なので、混同できない
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// orchestrator から受け取った文字列をそのまま ID にする
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    /// ULID からプレフィックス付きの ID を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self::new(format!("{}{}", T::prefix(), ulid))
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl<T: IdMarker> From<&str> for Id<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> From<String> for Id<T> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Service のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Service {}

impl IdMarker for Service {
    fn prefix() -> &'static str {
        "svc-"
    }
}

/// Task のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Identifier of a service as assigned by the orchestrator.
pub type ServiceId = Id<Service>;

/// Identifier of one scheduled task of a service.
pub type TaskId = Id<Task>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_carry_prefix() {
        let service = ServiceId::from_ulid(Ulid::new());
        let task = TaskId::from_ulid(Ulid::new());

        assert!(service.as_str().starts_with("svc-"));
        assert!(task.as_str().starts_with("task-"));
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = TaskId::new("t1");
        let s = serde_json::to_string(&id).unwrap();
        assert_eq!(s, "\"t1\"");

        let back: TaskId = serde_json::from_str(&s).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn ids_work_as_set_members() {
        // baseline 比較は HashSet<TaskId> で行う
        let baseline: HashSet<TaskId> = ["t1", "t2"].into_iter().map(TaskId::from).collect();
        assert!(baseline.contains(&TaskId::new("t1")));
        assert!(!baseline.contains(&TaskId::new("t3")));
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<TaskId>(), size_of::<String>());
        assert_eq!(size_of::<ServiceId>(), size_of::<String>());
    }
}
