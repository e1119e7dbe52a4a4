//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryOrchestrator**: service CRUD と scripted rollout を持つ Orchestrator
//! - **ScriptedTasks**: 決まったスナップショット列を返す TaskSnapshotProvider
//!
//! # 本番用実装
//! 実際の orchestrator API クライアントは別クレートに配置します。

pub mod inmem_orchestrator;
pub mod scripted;

// 主要な型を再エクスポート
pub use self::inmem_orchestrator::{InMemoryOrchestrator, RolloutScript};
pub use self::scripted::ScriptedTasks;
