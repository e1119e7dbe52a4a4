//! keel-core
//!
//! Replicated service lifecycle on top of a container orchestrator, with
//! rollout convergence detection.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, spec, task, state, options, auth, events, errors）
//! - **ports**: 抽象化レイヤー（Orchestrator, TaskSnapshotProvider, EventSink, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（controller, monitor, merger, builder, config, shutdown）
//! - **impls**: 実装（InMemoryOrchestrator など開発・テスト用）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use crate::app::{ControllerBuilder, ControllerConfig, Rollout, ServiceController};
pub use crate::domain::{AdjustOptions, LifecycleError, ServiceSpec};
