//! InMemoryOrchestrator - 開発・テスト用の orchestrator
//!
//! # 動作
//! - service は名前で管理し、書き込みのたびに version を進める
//! - create と template の変わる update では replicas 個の新しい task（state = new）を作り、
//!   古い世代の task は shutdown にする
//! - replicas だけが変わる update では差分だけ task を増やす / shutdown にする。
//!   何も変わらない update では task を作らない
//! - `list_tasks` を呼ぶたびに、生きている task を RolloutScript に沿って 1 段進める
//! - Mode のない spec は保存時に `Replicated { Replicas: 1 }` に正規化する
//!
//! # 使用例
//! ```ignore
//! let orchestrator = InMemoryOrchestrator::new()
//!     .with_script("app:broken", RolloutScript::rejected("no suitable node"));
//! ```

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    OrchestratorError, RegistryAuth, ServiceId, ServiceSnapshot, ServiceSpec, Task, TaskId,
    TaskState,
};
use crate::ports::{IdGenerator, Orchestrator, SystemClock, TaskSnapshotProvider, UlidGenerator};

/// The sequence of states a freshly spawned task walks through, one step per
/// `list_tasks` call. The last state sticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutScript {
    states: Vec<TaskState>,
    error: Option<String>,
}

impl RolloutScript {
    pub fn new(states: Vec<TaskState>) -> Self {
        Self {
            states,
            error: None,
        }
    }

    /// new -> pending -> assigned -> starting -> running
    pub fn healthy() -> Self {
        Self::new(vec![
            TaskState::New,
            TaskState::Pending,
            TaskState::Assigned,
            TaskState::Starting,
            TaskState::Running,
        ])
    }

    /// new -> pending -> rejected
    pub fn rejected(detail: impl Into<String>) -> Self {
        Self::new(vec![TaskState::New, TaskState::Pending, TaskState::Rejected])
            .with_error(detail)
    }

    /// new -> pending -> starting -> running -> failed
    pub fn crash_after_running(detail: impl Into<String>) -> Self {
        Self::new(vec![
            TaskState::New,
            TaskState::Pending,
            TaskState::Starting,
            TaskState::Running,
            TaskState::Failed,
        ])
        .with_error(detail)
    }

    /// Error detail attached once the task reaches failed or rejected.
    pub fn with_error(mut self, detail: impl Into<String>) -> Self {
        self.error = Some(detail.into());
        self
    }

    fn state_at(&self, step: usize) -> TaskState {
        self.states
            .get(step)
            .or(self.states.last())
            .copied()
            .unwrap_or(TaskState::Running)
    }
}

impl Default for RolloutScript {
    fn default() -> Self {
        Self::healthy()
    }
}

struct ServiceRecord {
    id: ServiceId,
    version: u64,
    spec: ServiceSpec,
}

impl ServiceRecord {
    fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            id: self.id.clone(),
            version: self.version,
            spec: self.spec.clone(),
        }
    }
}

struct TaskRecord {
    id: TaskId,
    service: String,
    script: RolloutScript,
    step: usize,
    retired: bool,
}

impl TaskRecord {
    fn state(&self) -> TaskState {
        if self.retired {
            TaskState::Shutdown
        } else {
            self.script.state_at(self.step)
        }
    }

    fn view(&self) -> Task {
        let state = self.state();
        let task = Task::new(self.id.clone(), self.service.clone(), state);
        match (&self.script.error, state) {
            (Some(error), TaskState::Failed | TaskState::Rejected) => task.with_error(error.clone()),
            _ => task,
        }
    }
}

#[derive(Default)]
struct OrchestratorState {
    services: BTreeMap<String, ServiceRecord>,
    tasks: Vec<TaskRecord>,
    /// 書き込みごとに進むグローバルな version
    version: u64,
    pulled: Vec<String>,
    /// pull / create / update が受け取った認証情報
    auth_log: Vec<(&'static str, Option<RegistryAuth>)>,
    /// 次の呼び出しで 1 回だけ返すエラー
    fail_next: Option<OrchestratorError>,
}

impl OrchestratorState {
    fn take_failure(&mut self) -> Result<(), OrchestratorError> {
        match self.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn name_of(&self, id: &ServiceId) -> Result<String, OrchestratorError> {
        self.services
            .iter()
            .find(|(_, record)| &record.id == id)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))
    }

    fn retire(&mut self, service: &str) {
        for task in self.tasks.iter_mut().filter(|t| t.service == service) {
            task.retired = true;
        }
    }

    fn live_count(&self, service: &str) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.service == service && !t.retired)
            .count()
    }

    /// Shut down the newest live tasks until `keep` remain.
    fn retire_extra(&mut self, service: &str, keep: usize) {
        let mut live = 0;
        for task in self.tasks.iter_mut().filter(|t| t.service == service && !t.retired) {
            live += 1;
            if live > keep {
                task.retired = true;
            }
        }
    }

    fn record_auth(&mut self, operation: &'static str, auth: Option<&RegistryAuth>) {
        self.auth_log.push((operation, auth.cloned()));
    }
}

/// In-memory orchestrator with scripted task rollouts.
pub struct InMemoryOrchestrator {
    state: Mutex<OrchestratorState>,
    ids: Box<dyn IdGenerator>,
    scripts: HashMap<String, RolloutScript>,
    default_script: RolloutScript,
}

impl InMemoryOrchestrator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(OrchestratorState::default()),
            ids: Box::new(UlidGenerator::new(SystemClock)),
            scripts: HashMap::new(),
            default_script: RolloutScript::healthy(),
        }
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Tasks of services running `image` follow `script`.
    pub fn with_script(mut self, image: impl Into<String>, script: RolloutScript) -> Self {
        self.scripts.insert(image.into(), script);
        self
    }

    /// Script for images without their own.
    pub fn with_default_script(mut self, script: RolloutScript) -> Self {
        self.default_script = script;
        self
    }

    /// The next orchestrator call (of any kind) fails with `error`.
    pub async fn fail_next(&self, error: OrchestratorError) {
        self.state.lock().await.fail_next = Some(error);
    }

    /// Images pulled so far, in order.
    pub async fn pulled_images(&self) -> Vec<String> {
        self.state.lock().await.pulled.clone()
    }

    /// Credentials passed to pull / create / update, in call order.
    pub async fn received_auth(&self) -> Vec<(&'static str, Option<RegistryAuth>)> {
        self.state.lock().await.auth_log.clone()
    }

    /// Current tasks of `service` without advancing them.
    pub async fn peek_tasks(&self, service: &str) -> Vec<Task> {
        let state = self.state.lock().await;
        state
            .tasks
            .iter()
            .filter(|task| task.service == service)
            .map(TaskRecord::view)
            .collect()
    }

    fn script_for(&self, image: &str) -> RolloutScript {
        self.scripts
            .get(image)
            .cloned()
            .unwrap_or_else(|| self.default_script.clone())
    }

    fn spawn_tasks(
        &self,
        state: &mut OrchestratorState,
        name: &str,
        spec: &ServiceSpec,
        count: usize,
    ) {
        let script = self.script_for(spec.image());
        for _ in 0..count {
            state.tasks.push(TaskRecord {
                id: self.ids.generate_task_id(),
                service: name.to_string(),
                script: script.clone(),
                step: 0,
                retired: false,
            });
        }
    }
}

impl Default for InMemoryOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Missing mode becomes a single replicated task.
fn normalize(spec: &ServiceSpec) -> ServiceSpec {
    let mut spec = spec.clone();
    if spec.mode.is_none() {
        spec.set_replicas(1);
    }
    spec
}

fn replica_count(spec: &ServiceSpec) -> usize {
    usize::try_from(spec.replicas().unwrap_or(1)).unwrap_or(usize::MAX)
}

/// Equal apart from the replica count.
fn same_template(a: &ServiceSpec, b: &ServiceSpec) -> bool {
    let strip = |spec: &ServiceSpec| ServiceSpec {
        mode: None,
        ..spec.clone()
    };
    strip(a) == strip(b)
}

#[async_trait]
impl TaskSnapshotProvider for InMemoryOrchestrator {
    async fn list_tasks(&self, service: &str) -> Result<Vec<Task>, OrchestratorError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;

        let mut tasks = Vec::new();
        for record in state.tasks.iter_mut().filter(|t| t.service == service) {
            tasks.push(record.view());
            if !record.retired {
                record.step += 1;
            }
        }
        Ok(tasks)
    }
}

#[async_trait]
impl Orchestrator for InMemoryOrchestrator {
    async fn get_service(&self, name: &str) -> Result<ServiceSnapshot, OrchestratorError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;

        state
            .services
            .get(name)
            .map(ServiceRecord::snapshot)
            .ok_or_else(|| OrchestratorError::NotFound(name.to_string()))
    }

    async fn list_services(&self) -> Result<Vec<ServiceSnapshot>, OrchestratorError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;

        Ok(state.services.values().map(ServiceRecord::snapshot).collect())
    }

    async fn create_service(
        &self,
        spec: &ServiceSpec,
        auth: Option<&RegistryAuth>,
    ) -> Result<ServiceId, OrchestratorError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        state.record_auth("create", auth);

        if state.services.contains_key(&spec.name) {
            return Err(OrchestratorError::AlreadyExists(spec.name.clone()));
        }

        let spec = normalize(spec);
        let id = self.ids.generate_service_id();
        state.version += 1;
        let version = state.version;

        self.spawn_tasks(&mut state, &spec.name, &spec, replica_count(&spec));
        state.services.insert(
            spec.name.clone(),
            ServiceRecord {
                id: id.clone(),
                version,
                spec,
            },
        );
        Ok(id)
    }

    async fn update_service(
        &self,
        id: &ServiceId,
        version: u64,
        spec: &ServiceSpec,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), OrchestratorError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        state.record_auth("update", auth);

        let name = state.name_of(id)?;
        let (current, previous) = state
            .services
            .get(&name)
            .map(|record| (record.version, record.spec.clone()))
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))?;
        if current != version {
            return Err(OrchestratorError::VersionConflict {
                service: name,
                submitted: version,
                current,
            });
        }

        let spec = normalize(spec);
        state.version += 1;
        let next = state.version;

        let wanted = replica_count(&spec);
        if same_template(&previous, &spec) {
            let live = state.live_count(&name);
            if wanted < live {
                state.retire_extra(&name, wanted);
            } else {
                self.spawn_tasks(&mut state, &name, &spec, wanted - live);
            }
        } else {
            state.retire(&name);
            self.spawn_tasks(&mut state, &name, &spec, wanted);
        }
        if let Some(record) = state.services.get_mut(&name) {
            record.version = next;
            record.spec = spec;
        }
        Ok(())
    }

    async fn remove_service(&self, id: &ServiceId) -> Result<(), OrchestratorError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;

        let name = state.name_of(id)?;
        state.services.remove(&name);
        state.tasks.retain(|task| task.service != name);
        Ok(())
    }

    async fn pull_image(
        &self,
        image: &str,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), OrchestratorError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        state.record_auth("pull", auth);

        state.pulled.push(image.to_string());
        Ok(())
    }
}
