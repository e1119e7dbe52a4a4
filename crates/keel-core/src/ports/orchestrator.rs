//! Orchestrator port - サービス API と task スナップショットの抽象化
//!
//! 実際の wire protocol は orchestrator 側の責務です。ここでは core が
//! 呼び出す操作だけを定義します。
//!
//! # 実装
//! - **InMemoryOrchestrator**（impls）: テスト・デモ用

use async_trait::async_trait;

use crate::domain::{
    OrchestratorError, RegistryAuth, ServiceId, ServiceSnapshot, ServiceSpec, Task,
};

/// TaskSnapshotProvider は service に属する task の一覧を返す
///
/// Convergence monitor は poll のたびにこれを呼びます。
#[async_trait]
pub trait TaskSnapshotProvider: Send + Sync {
    async fn list_tasks(&self, service: &str) -> Result<Vec<Task>, OrchestratorError>;
}

/// Orchestrator はサービスの CRUD を提供する
///
/// # 楽観的排他制御
/// - `get_service` が返す `version` を `update_service` に渡す
/// - version が古ければ `OrchestratorError::VersionConflict`
#[async_trait]
pub trait Orchestrator: TaskSnapshotProvider {
    /// 存在しなければ `OrchestratorError::NotFound`
    async fn get_service(&self, name: &str) -> Result<ServiceSnapshot, OrchestratorError>;

    async fn list_services(&self) -> Result<Vec<ServiceSnapshot>, OrchestratorError>;

    async fn create_service(
        &self,
        spec: &ServiceSpec,
        auth: Option<&RegistryAuth>,
    ) -> Result<ServiceId, OrchestratorError>;

    async fn update_service(
        &self,
        id: &ServiceId,
        version: u64,
        spec: &ServiceSpec,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), OrchestratorError>;

    async fn remove_service(&self, id: &ServiceId) -> Result<(), OrchestratorError>;

    async fn pull_image(
        &self,
        image: &str,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), OrchestratorError>;
}
