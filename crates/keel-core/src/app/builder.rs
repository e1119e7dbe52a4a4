//! ControllerBuilder - ServiceController の構築とワイヤリング
//!
//! # ポイント
//! - Builder パターンの実装
//! - 起動時検証（orchestrator 未設定・不正な config は build() で弾く）
//! - event sink / clock は省略時にデフォルト実装を使う

use std::sync::Arc;

use crate::app::config::{ConfigError, ControllerConfig};
use crate::app::controller::ServiceController;
use crate::domain::RegistryAuth;
use crate::ports::{Clock, EventSink, NoopEventSink, Orchestrator, SystemClock};

/// ControllerBuilder は ServiceController を構築
///
/// # 使用例
/// ```ignore
/// let controller = ControllerBuilder::new()
///     .orchestrator(Arc::new(InMemoryOrchestrator::new()))
///     .config(ControllerConfig::from_json_str(&raw)?)
///     .event_sink(Arc::new(TracingEventSink))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - orchestrator が未設定なら BuildError::MissingOrchestrator
/// - poll 間隔が 0 なら BuildError::InvalidConfig
pub struct ControllerBuilder {
    orchestrator: Option<Arc<dyn Orchestrator>>,
    config: ControllerConfig,
    auth: Option<RegistryAuth>,
    sink: Option<Arc<dyn EventSink>>,
    clock: Option<Arc<dyn Clock>>,
}

/// BuildError は controller 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("No orchestrator configured. Call ControllerBuilder::orchestrator() before build().")]
    MissingOrchestrator,

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

impl ControllerBuilder {
    /// 新しい ControllerBuilder を作成
    pub fn new() -> Self {
        Self {
            orchestrator: None,
            config: ControllerConfig::default(),
            auth: None,
            sink: None,
            clock: None,
        }
    }

    pub fn orchestrator(mut self, orchestrator: Arc<dyn Orchestrator>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// create / update / pull で orchestrator に渡す registry 認証情報
    pub fn registry_auth(mut self, auth: RegistryAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// 省略時は NoopEventSink
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 省略時は SystemClock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// ControllerBuilder を構築して ServiceController を生成
    ///
    /// # 検証
    /// - orchestrator が設定されているか
    /// - config が妥当か（ControllerConfig::validate）
    pub fn build(self) -> Result<ServiceController, BuildError> {
        let orchestrator = self.orchestrator.ok_or(BuildError::MissingOrchestrator)?;
        self.config.validate()?;

        Ok(ServiceController::new(
            orchestrator,
            self.config.monitor_config(),
            self.auth,
            self.sink.unwrap_or_else(|| Arc::new(NoopEventSink)),
            self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        ))
    }
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
