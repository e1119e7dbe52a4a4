//! IdGenerator port - ID 生成の抽象化
//!
//! 本物の orchestrator は自分で ID を払い出すので、これを使うのは
//! InMemoryOrchestrator だけです。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース
//! - **SequentialIdGenerator**: 連番（テストで ID を予測したい場合）

use std::sync::atomic::{AtomicU64, Ordering};

use ulid::Ulid;

use crate::domain::{ServiceId, TaskId};
use crate::ports::Clock;

/// IdGenerator は service / task の ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait IdGenerator: Send + Sync {
    fn generate_service_id(&self) -> ServiceId;

    fn generate_task_id(&self) -> TaskId;
}

/// UlidGenerator は Clock の時刻をタイムスタンプ部に使う
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_service_id(&self) -> ServiceId {
        ServiceId::from_ulid(self.next_ulid())
    }

    fn generate_task_id(&self) -> TaskId {
        TaskId::from_ulid(self.next_ulid())
    }
}

/// "svc-1", "task-1", "task-2", ... を順に返す
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next_service: AtomicU64,
    next_task: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate_service_id(&self) -> ServiceId {
        let n = self.next_service.fetch_add(1, Ordering::Relaxed) + 1;
        ServiceId::new(format!("svc-{n}"))
    }

    fn generate_task_id(&self) -> TaskId {
        let n = self.next_task.fetch_add(1, Ordering::Relaxed) + 1;
        TaskId::new(format!("task-{n}"))
    }
}
