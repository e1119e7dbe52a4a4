//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! core は orchestrator・listener・時刻・ID 生成にこれらの trait 経由でのみ触れます。

pub mod clock;
pub mod event_sink;
pub mod id_generator;
pub mod orchestrator;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::{
    ChannelEventSink, EventSink, FnEventSink, NoopEventSink, TracingEventSink,
};
pub use self::id_generator::{IdGenerator, SequentialIdGenerator, UlidGenerator};
pub use self::orchestrator::{Orchestrator, TaskSnapshotProvider};
