//! EventSink port - monitor イベントの通知先
//!
//! # 実装
//! - NoopEventSink: 何もしない（デフォルト）
//! - TracingEventSink: tracing へ転送
//! - ChannelEventSink: mpsc チャネルへ送信（テスト・CLI 向け）
//! - FnEventSink: クロージャをそのまま listener として使う

use tokio::sync::mpsc;

use crate::domain::{EventCategory, MonitorEvent};

/// EventSink は monitor の観測結果を受け取る
///
/// emit は失敗しません。listener 側の都合で monitor を止めないためです。
pub trait EventSink: Send + Sync {
    fn emit(&self, event: MonitorEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: MonitorEvent) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: MonitorEvent) {
        match event.category {
            EventCategory::TaskFailed | EventCategory::TimedOut => tracing::warn!(
                service = %event.service,
                category = ?event.category,
                fields = %event.fields,
                "{}",
                event.message
            ),
            _ => tracing::info!(
                service = %event.service,
                category = ?event.category,
                fields = %event.fields,
                "{}",
                event.message
            ),
        }
    }
}

/// 受信側が drop 済みなら黙って捨てる
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<MonitorEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MonitorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: MonitorEvent) {
        let _ = self.tx.send(event);
    }
}

pub struct FnEventSink<F> {
    f: F,
}

impl<F> FnEventSink<F>
where
    F: Fn(MonitorEvent) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> EventSink for FnEventSink<F>
where
    F: Fn(MonitorEvent) + Send + Sync,
{
    fn emit(&self, event: MonitorEvent) {
        (self.f)(event)
    }
}
