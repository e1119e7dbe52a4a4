//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **ControllerBuilder**: controller の構築とワイヤリング
//! - **ServiceController**: create / update / adjust / scale などのライフサイクル操作
//! - **ConvergenceMonitor**: rollout の収束判定ループ
//! - **merge**: AdjustOptions を ServiceSpec に適用する純粋関数
//! - **ShutdownHandle**: 監視中の rollout のキャンセル

pub mod builder;
pub mod config;
pub mod controller;
pub mod merger;
pub mod monitor;
pub mod shutdown;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, ControllerBuilder};
pub use self::config::{ConfigError, ControllerConfig, EmptyPollPolicy, MonitorConfig};
pub use self::controller::{Rollout, ServiceController};
pub use self::merger::{merge, strip_digest};
pub use self::monitor::{
    Baseline, ConvergenceMonitor, MonitorMode, MonitorReport, MonitorSession, Observation, Step,
    TaskFailure,
};
pub use self::shutdown::ShutdownHandle;
