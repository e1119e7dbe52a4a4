//! ServiceController - service のライフサイクル操作
//!
//! # 操作
//! - create / update: orchestrator に投入し、detach でなければ収束を監視
//! - adjust / scale: 現在の spec に AdjustOptions をマージして投入し、常に監視
//! - get / exists / remove / list / pull: orchestrator へのパススルー
//!
//! # 並行性
//! update / adjust の最初の 2 つの読み取り（task 一覧と spec/version）は並行に行います。
//! 競合制御は orchestrator の version だけで、VersionConflict はリトライせず返します。

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::app::config::MonitorConfig;
use crate::app::merger::merge;
use crate::app::monitor::{Baseline, ConvergenceMonitor, MonitorMode, MonitorReport};
use crate::domain::{
    AdjustOptions, LifecycleError, OrchestratorError, RegistryAuth, ServiceId, ServiceSnapshot,
    ServiceSpec,
};
use crate::ports::{Clock, EventSink, Orchestrator};

/// Result of a create / update / adjust.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rollout {
    pub service: String,
    pub service_id: ServiceId,
    /// `None` when detached.
    pub report: Option<MonitorReport>,
}

/// ServiceController は orchestrator と convergence monitor を束ねる
///
/// `ControllerBuilder` で構築します。
pub struct ServiceController {
    orchestrator: Arc<dyn Orchestrator>,
    config: MonitorConfig,
    auth: Option<RegistryAuth>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl ServiceController {
    pub(crate) fn new(
        orchestrator: Arc<dyn Orchestrator>,
        config: MonitorConfig,
        auth: Option<RegistryAuth>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orchestrator,
            config,
            auth,
            sink,
            clock,
            shutdown: None,
        }
    }

    /// 監視中に `true` が送られると `LifecycleError::Cancelled` で止まる
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &Arc<dyn Orchestrator> {
        &self.orchestrator
    }

    /// Submit `spec` as a new service.
    pub async fn create(
        &self,
        spec: &ServiceSpec,
        detach: bool,
    ) -> Result<Rollout, LifecycleError> {
        let service_id = self
            .orchestrator
            .create_service(spec, self.auth.as_ref())
            .await?;
        info!(service = %spec.name, service_id = %service_id, detach, "Service created");

        // 新しい service には既存の task がない
        let mode = MonitorMode::extended().with_baseline(Baseline::Known(Default::default()));
        self.finish(&spec.name, service_id, detach, mode).await
    }

    /// Replace the spec of an existing service.
    ///
    /// The spec is submitted as given. A spec without `Mode` is stored by the
    /// orchestrator as a single replica.
    pub async fn update(
        &self,
        spec: &ServiceSpec,
        detach: bool,
    ) -> Result<Rollout, LifecycleError> {
        let (tasks, current) = tokio::try_join!(
            self.orchestrator.list_tasks(&spec.name),
            self.orchestrator.get_service(&spec.name)
        )?;

        self.orchestrator
            .update_service(&current.id, current.version, spec, self.auth.as_ref())
            .await?;
        info!(
            service = %spec.name,
            version = current.version,
            baseline = tasks.len(),
            detach,
            "Service updated"
        );

        let mode = MonitorMode::extended().with_baseline(Baseline::from_tasks(&tasks));
        self.finish(&spec.name, current.id, detach, mode).await
    }

    /// Merge `options` into the current spec, submit, and monitor.
    pub async fn adjust(
        &self,
        name: &str,
        options: &AdjustOptions,
    ) -> Result<Rollout, LifecycleError> {
        let (tasks, current) = tokio::try_join!(
            self.orchestrator.list_tasks(name),
            self.orchestrator.get_service(name)
        )?;

        let merged = merge(&current.spec, options);
        self.orchestrator
            .update_service(&current.id, current.version, &merged, self.auth.as_ref())
            .await?;
        info!(
            service = %name,
            version = current.version,
            baseline = tasks.len(),
            "Service adjusted"
        );

        let mode = MonitorMode::extended().with_baseline(Baseline::from_tasks(&tasks));
        self.finish(name, current.id, false, mode).await
    }

    /// `adjust` with untyped options, validated before any orchestrator call.
    pub async fn adjust_json(
        &self,
        name: &str,
        options: &serde_json::Value,
    ) -> Result<Rollout, LifecycleError> {
        let options = AdjustOptions::from_value(options)?;
        self.adjust(name, &options).await
    }

    pub async fn scale(&self, name: &str, replicas: u64) -> Result<Rollout, LifecycleError> {
        self.adjust(name, &AdjustOptions::replicas(replicas)).await
    }

    pub async fn get(&self, name: &str) -> Result<ServiceSnapshot, LifecycleError> {
        Ok(self.orchestrator.get_service(name).await?)
    }

    /// `NotFound` は `false`、それ以外のエラーはそのまま返す
    pub async fn exists(&self, name: &str) -> Result<bool, LifecycleError> {
        match self.orchestrator.get_service(name).await {
            Ok(_) => Ok(true),
            Err(OrchestratorError::NotFound(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn remove(&self, name: &str) -> Result<(), LifecycleError> {
        let current = self.orchestrator.get_service(name).await?;
        self.orchestrator.remove_service(&current.id).await?;
        info!(service = %name, service_id = %current.id, "Service removed");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<ServiceSnapshot>, LifecycleError> {
        Ok(self.orchestrator.list_services().await?)
    }

    pub async fn pull(&self, image: &str) -> Result<(), LifecycleError> {
        self.orchestrator
            .pull_image(image, self.auth.as_ref())
            .await?;
        info!(image = %image, "Image pulled");
        Ok(())
    }

    async fn finish(
        &self,
        service: &str,
        service_id: ServiceId,
        detach: bool,
        mode: MonitorMode,
    ) -> Result<Rollout, LifecycleError> {
        let report = if detach {
            None
        } else {
            Some(self.monitor().run(service, mode).await?)
        };
        Ok(Rollout {
            service: service.to_string(),
            service_id,
            report,
        })
    }

    fn monitor(&self) -> ConvergenceMonitor<'_, dyn Orchestrator> {
        let monitor = ConvergenceMonitor::new(self.orchestrator.as_ref(), self.config)
            .with_sink(self.sink.as_ref())
            .with_clock(self.clock.as_ref());
        match &self.shutdown {
            Some(shutdown) => monitor.with_shutdown(shutdown.clone()),
            None => monitor,
        }
    }
}
