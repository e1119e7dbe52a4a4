//! ConvergenceMonitor - rollout の収束判定ループ
//!
//! # フロー
//! 1. baseline を確定（その場で取得 or 既知の task ID 集合）
//! 2. poll 間隔だけ待つ
//! 3. task 一覧を取得し、baseline にない task だけを見る
//! 4. MonitorSession::observe() で次の一手を決める
//!    （新しい task がなく、進行中の task もなければ変更なしとして収束）
//! 5. 終端（Converged / Failed / TimedOut）まで 3〜4 を繰り返す
//!
//! 判定ロジックは MonitorSession に閉じ込めてあり、I/O を持ちません。
//! ConvergenceMonitor は取得・待機・イベント発行・キャンセルだけを担当します。

use std::collections::{BTreeSet, HashSet};
use std::future::Future;

use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::app::config::{EmptyPollPolicy, MonitorConfig};
use crate::domain::{
    EventCategory, LifecycleError, MonitorEvent, MonitorPhase, Task, TaskId, TaskPhase, TaskState,
};
use crate::ports::{Clock, EventSink, NoopEventSink, SystemClock, TaskSnapshotProvider};

/// Where the baseline set comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Baseline {
    /// Fetch tasks when monitoring starts and keep the settled ones.
    Capture,
    /// Task identifiers already known to predate the operation.
    Known(HashSet<TaskId>),
}

impl Baseline {
    /// Every task in a snapshot taken before the operation, whatever its state.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        Baseline::Known(tasks.iter().map(|task| task.id.clone()).collect())
    }
}

/// How one monitor run behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorMode {
    /// Keep observing for `settle_polls` after the first running task.
    pub extended: bool,
    pub baseline: Baseline,
}

impl MonitorMode {
    /// Stop at the first running task.
    pub fn single() -> Self {
        Self {
            extended: false,
            baseline: Baseline::Capture,
        }
    }

    /// Keep observing after the first running task.
    pub fn extended() -> Self {
        Self {
            extended: true,
            baseline: Baseline::Capture,
        }
    }

    pub fn with_baseline(mut self, baseline: Baseline) -> Self {
        self.baseline = baseline;
        self
    }
}

/// A new task that failed, as reported by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task_id: TaskId,
    pub state: TaskState,
    pub detail: Option<String>,
}

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Sleep one interval and poll again.
    Continue,
    Converged,
    Failed(TaskFailure),
    TimedOut,
    /// No new task this cycle under `EmptyPollPolicy::Stop`.
    NoNewTasks,
}

/// What `MonitorSession::observe` saw, besides the step itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub step: Step,
    pub new_tasks: usize,
    /// Set on the cycle where the first new task was seen running.
    pub first_running: Option<TaskId>,
}

/// State of one monitor run.
///
/// Pure: feed it snapshots with `observe`, it never does I/O.
#[derive(Debug, Clone)]
pub struct MonitorSession {
    baseline: HashSet<TaskId>,
    extended: bool,
    polls: u32,
    task_running: bool,
    settle_polls: u32,
    running: BTreeSet<TaskId>,
    phase: MonitorPhase,
}

impl MonitorSession {
    pub fn new(baseline: HashSet<TaskId>, extended: bool) -> Self {
        Self {
            baseline,
            extended,
            polls: 0,
            task_running: false,
            settle_polls: 0,
            running: BTreeSet::new(),
            phase: MonitorPhase::Init,
        }
    }

    /// Baseline from a fresh snapshot: only settled (not new/pending) tasks.
    pub fn capture(tasks: &[Task], extended: bool) -> Self {
        let baseline = tasks
            .iter()
            .filter(|task| task.state.is_settled())
            .map(|task| task.id.clone())
            .collect();
        Self::new(baseline, extended)
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn settle_polls(&self) -> u32 {
        self.settle_polls
    }

    pub fn task_running(&self) -> bool {
        self.task_running
    }

    pub fn baseline(&self) -> &HashSet<TaskId> {
        &self.baseline
    }

    /// Run one poll cycle against a fresh snapshot.
    pub fn observe(&mut self, tasks: &[Task], config: &MonitorConfig) -> Observation {
        if self.phase == MonitorPhase::Init {
            self.phase = MonitorPhase::Observing;
        }

        let fresh: Vec<&Task> = tasks
            .iter()
            .filter(|task| !self.baseline.contains(&task.id))
            .collect();

        // 新しい task が running になった後の空 poll は通常の settle として扱う
        if fresh.is_empty() && !self.task_running {
            match config.empty_poll {
                EmptyPollPolicy::Stop => {
                    return self.observation(Step::NoNewTasks, 0, None);
                }
                EmptyPollPolicy::Continue if self.is_quiescent(tasks) => {
                    // scale down や変更のない update では新しい task が作られない
                    self.polls += 1;
                    self.phase = MonitorPhase::Converged;
                    return self.observation(Step::Converged, 0, None);
                }
                EmptyPollPolicy::Continue => {}
            }
        }

        let mut first_running = None;
        for task in &fresh {
            match task.state.phase() {
                TaskPhase::Failure => {
                    self.phase = MonitorPhase::Failed;
                    let failure = TaskFailure {
                        task_id: task.id.clone(),
                        state: task.state,
                        detail: task.error.clone(),
                    };
                    return self.observation(Step::Failed(failure), fresh.len(), None);
                }
                TaskPhase::Running => {
                    if !self.task_running {
                        self.task_running = true;
                        first_running = Some(task.id.clone());
                    }
                    self.running.insert(task.id.clone());
                }
                TaskPhase::Unsettled | TaskPhase::Other => {}
            }
        }

        self.polls += 1;

        if !self.task_running {
            if self.polls >= config.max_polls {
                self.phase = MonitorPhase::TimedOut;
                return self.observation(Step::TimedOut, fresh.len(), None);
            }
            return self.observation(Step::Continue, fresh.len(), None);
        }

        if !self.extended {
            self.phase = MonitorPhase::Converged;
            return self.observation(Step::Converged, fresh.len(), first_running);
        }

        self.settle_polls += 1;
        if self.settle_polls >= config.settle_polls {
            self.phase = MonitorPhase::Converged;
            return self.observation(Step::Converged, fresh.len(), first_running);
        }

        self.phase = if first_running.is_some() {
            MonitorPhase::RunningUnconfirmed
        } else {
            MonitorPhase::RunningSettling
        };
        self.observation(Step::Continue, fresh.len(), first_running)
    }

    /// Nothing is on its way to running. An empty snapshot with an empty
    /// baseline means the orchestrator has not listed a new service yet.
    fn is_quiescent(&self, tasks: &[Task]) -> bool {
        if tasks.is_empty() && self.baseline.is_empty() {
            return false;
        }
        !tasks.iter().any(|task| task.state.is_in_flight())
    }

    fn observation(
        &self,
        step: Step,
        new_tasks: usize,
        first_running: Option<TaskId>,
    ) -> Observation {
        Observation {
            step,
            new_tasks,
            first_running,
        }
    }
}

/// Outcome of a converged run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorReport {
    pub service: String,
    pub polls: u32,
    pub settle_polls: u32,
    /// New tasks seen running during the run.
    pub running_tasks: Vec<TaskId>,
}

/// Drives a `MonitorSession` against a task provider.
///
/// # 使用例
/// ```ignore
/// let monitor = ConvergenceMonitor::new(&orchestrator, MonitorConfig::default())
///     .with_sink(&sink);
/// let report = monitor.run("web", MonitorMode::extended()).await?;
/// ```
pub struct ConvergenceMonitor<'a, P: ?Sized> {
    provider: &'a P,
    config: MonitorConfig,
    sink: &'a dyn EventSink,
    clock: &'a dyn Clock,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<'a, P> ConvergenceMonitor<'a, P>
where
    P: TaskSnapshotProvider + ?Sized,
{
    pub fn new(provider: &'a P, config: MonitorConfig) -> Self {
        Self {
            provider,
            config,
            sink: &NoopEventSink,
            clock: &SystemClock,
            shutdown: None,
        }
    }

    pub fn with_sink(mut self, sink: &'a dyn EventSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Monitoring stops with `LifecycleError::Cancelled` once the channel
    /// holds `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub async fn run(
        &self,
        service: &str,
        mode: MonitorMode,
    ) -> Result<MonitorReport, LifecycleError> {
        let mut shutdown = self.shutdown.clone();

        let mut session = match mode.baseline {
            Baseline::Capture => {
                let tasks = self.fetch(service, &mut shutdown).await?;
                MonitorSession::capture(&tasks, mode.extended)
            }
            Baseline::Known(ids) => MonitorSession::new(ids, mode.extended),
        };

        debug!(
            service = %service,
            baseline = session.baseline().len(),
            extended = mode.extended,
            "Baseline captured"
        );
        self.emit(
            EventCategory::Baseline,
            service,
            "baseline captured",
            json!({ "baseline": session.baseline().len(), "extended": mode.extended }),
        );

        // orchestrator が新しい task をスケジュールするまで待つ
        self.pause(service, &mut shutdown).await?;

        loop {
            let tasks = self.fetch(service, &mut shutdown).await?;
            let observation = session.observe(&tasks, &self.config);

            debug!(
                service = %service,
                polls = session.polls(),
                new_tasks = observation.new_tasks,
                phase = ?session.phase(),
                "Poll cycle"
            );

            if observation.new_tasks == 0 {
                self.emit(
                    EventCategory::NoNewTasks,
                    service,
                    "no new tasks observed",
                    json!({ "polls": session.polls(), "total_tasks": tasks.len() }),
                );
            }

            if let Some(task_id) = &observation.first_running {
                info!(service = %service, task_id = %task_id, "New task running");
                self.emit(
                    EventCategory::TaskRunning,
                    service,
                    "new task is running",
                    json!({ "task_id": task_id, "polls": session.polls() }),
                );
            }

            match observation.step {
                Step::Continue => {
                    if session.task_running() {
                        self.emit(
                            EventCategory::Settling,
                            service,
                            "observing running rollout",
                            json!({
                                "settle_polls": session.settle_polls(),
                                "required": self.config.settle_polls,
                            }),
                        );
                    }
                }
                Step::Converged => {
                    info!(
                        service = %service,
                        polls = session.polls(),
                        settle_polls = session.settle_polls(),
                        "Rollout converged"
                    );
                    self.emit(
                        EventCategory::Converged,
                        service,
                        "rollout converged",
                        json!({ "polls": session.polls(), "settle_polls": session.settle_polls() }),
                    );
                    return Ok(MonitorReport {
                        service: service.to_string(),
                        polls: session.polls(),
                        settle_polls: session.settle_polls(),
                        running_tasks: session.running.iter().cloned().collect(),
                    });
                }
                Step::Failed(failure) => {
                    warn!(
                        service = %service,
                        task_id = %failure.task_id,
                        state = %failure.state,
                        detail = failure.detail.as_deref().unwrap_or(""),
                        "New task failed"
                    );
                    self.emit(
                        EventCategory::TaskFailed,
                        service,
                        "new task failed",
                        json!({
                            "task_id": failure.task_id,
                            "state": failure.state,
                            "detail": failure.detail,
                        }),
                    );
                    return Err(LifecycleError::TaskFailed {
                        service: service.to_string(),
                        task_id: failure.task_id,
                        state: failure.state,
                        detail: failure.detail,
                    });
                }
                Step::TimedOut => {
                    warn!(service = %service, polls = session.polls(), "Rollout timed out");
                    self.emit(
                        EventCategory::TimedOut,
                        service,
                        "no new task reached running in time",
                        json!({ "polls": session.polls() }),
                    );
                    return Err(LifecycleError::Timeout {
                        service: service.to_string(),
                        polls: session.polls(),
                    });
                }
                Step::NoNewTasks => {
                    warn!(service = %service, polls = session.polls(), "Stopping: no new tasks");
                    return Err(LifecycleError::NoNewTasks {
                        service: service.to_string(),
                        polls: session.polls(),
                    });
                }
            }

            self.pause(service, &mut shutdown).await?;
        }
    }

    async fn fetch(
        &self,
        service: &str,
        shutdown: &mut Option<watch::Receiver<bool>>,
    ) -> Result<Vec<Task>, LifecycleError> {
        let tasks = self
            .cancellable(service, shutdown, self.provider.list_tasks(service))
            .await??;
        Ok(tasks)
    }

    async fn pause(
        &self,
        service: &str,
        shutdown: &mut Option<watch::Receiver<bool>>,
    ) -> Result<(), LifecycleError> {
        self.cancellable(service, shutdown, tokio::time::sleep(self.config.poll_interval))
            .await
    }

    /// Race `fut` against the shutdown channel.
    async fn cancellable<F: Future>(
        &self,
        service: &str,
        shutdown: &mut Option<watch::Receiver<bool>>,
        fut: F,
    ) -> Result<F::Output, LifecycleError> {
        let Some(rx) = shutdown.as_mut() else {
            return Ok(fut.await);
        };
        tokio::pin!(fut);
        loop {
            if *rx.borrow_and_update() {
                info!(service = %service, "Monitoring cancelled");
                self.emit(
                    EventCategory::Cancelled,
                    service,
                    "monitoring cancelled",
                    json!({}),
                );
                return Err(LifecycleError::Cancelled {
                    service: service.to_string(),
                });
            }
            tokio::select! {
                out = &mut fut => return Ok(out),
                changed = rx.changed() => {
                    // sender が drop されたらもうキャンセルは来ない
                    if changed.is_err() {
                        return Ok(fut.await);
                    }
                }
            }
        }
    }

    fn emit(
        &self,
        category: EventCategory,
        service: &str,
        message: &str,
        fields: serde_json::Value,
    ) {
        let event =
            MonitorEvent::new(category, service, message, self.clock.now()).with_fields(fields);
        self.sink.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::ScriptedTasks;
    use crate::ports::ChannelEventSink;
    use std::time::Duration;
    use tokio::time::Instant;

    fn task(id: &str, state: TaskState) -> Task {
        Task::new(id, "web", state)
    }

    fn config(max_polls: u32, settle_polls: u32) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_millis(2000),
            max_polls,
            settle_polls,
            empty_poll: EmptyPollPolicy::Continue,
        }
    }

    fn baseline(ids: &[&str]) -> HashSet<TaskId> {
        ids.iter().map(|id| TaskId::new(*id)).collect()
    }

    // ------------------------------------------------------------------
    // MonitorSession（純粋な状態機械）
    // ------------------------------------------------------------------

    #[test]
    fn capture_keeps_only_settled_tasks() {
        let session = MonitorSession::capture(
            &[
                task("t1", TaskState::Running),
                task("t2", TaskState::New),
                task("t3", TaskState::Pending),
                task("t4", TaskState::Shutdown),
            ],
            false,
        );
        assert_eq!(session.baseline(), &baseline(&["t1", "t4"]));
        assert_eq!(session.phase(), MonitorPhase::Init);
    }

    #[test]
    fn pending_then_running_converges() {
        let config = config(30, 1);
        let mut session = MonitorSession::new(baseline(&["t1"]), false);

        let obs = session.observe(
            &[task("t1", TaskState::Running), task("t2", TaskState::Pending)],
            &config,
        );
        assert_eq!(obs.step, Step::Continue);
        assert_eq!(obs.new_tasks, 1);
        assert_eq!(session.phase(), MonitorPhase::Observing);

        let obs = session.observe(
            &[task("t1", TaskState::Running), task("t2", TaskState::Running)],
            &config,
        );
        assert_eq!(obs.step, Step::Converged);
        assert_eq!(obs.first_running, Some(TaskId::new("t2")));
        assert_eq!(session.phase(), MonitorPhase::Converged);
        assert_eq!(session.polls(), 2);
    }

    #[test]
    fn baseline_tasks_are_ignored_even_when_failed() {
        let config = config(30, 1);
        let mut session = MonitorSession::new(baseline(&["t1"]), false);

        let obs = session.observe(
            &[task("t1", TaskState::Failed), task("t2", TaskState::Running)],
            &config,
        );
        assert_eq!(obs.step, Step::Converged);
    }

    #[test]
    fn rejected_new_task_fails_immediately() {
        let config = config(30, 1);
        let mut session = MonitorSession::new(baseline(&["t1"]), true);

        let obs = session.observe(
            &[
                task("t1", TaskState::Running),
                task("t2", TaskState::Rejected).with_error("no suitable node"),
            ],
            &config,
        );
        assert_eq!(
            obs.step,
            Step::Failed(TaskFailure {
                task_id: TaskId::new("t2"),
                state: TaskState::Rejected,
                detail: Some("no suitable node".to_string()),
            })
        );
        assert_eq!(session.phase(), MonitorPhase::Failed);
        // 失敗した cycle は poll として数えない
        assert_eq!(session.polls(), 0);
    }

    #[test]
    fn pending_until_budget_times_out() {
        let config = config(3, 1);
        let mut session = MonitorSession::new(baseline(&["t1"]), false);
        let snapshot = [task("t1", TaskState::Running), task("t2", TaskState::Pending)];

        assert_eq!(session.observe(&snapshot, &config).step, Step::Continue);
        assert_eq!(session.observe(&snapshot, &config).step, Step::Continue);
        assert_eq!(session.observe(&snapshot, &config).step, Step::TimedOut);
        assert_eq!(session.phase(), MonitorPhase::TimedOut);
        assert_eq!(session.polls(), 3);
    }

    #[test]
    fn extended_mode_settles_before_converging() {
        let config = config(30, 3);
        let mut session = MonitorSession::new(HashSet::new(), true);
        let running = [task("t2", TaskState::Running)];

        let obs = session.observe(&running, &config);
        assert_eq!(obs.step, Step::Continue);
        assert_eq!(session.phase(), MonitorPhase::RunningUnconfirmed);

        assert_eq!(session.observe(&running, &config).step, Step::Continue);
        assert_eq!(session.phase(), MonitorPhase::RunningSettling);

        assert_eq!(session.observe(&running, &config).step, Step::Converged);
        assert_eq!(session.settle_polls(), 3);
    }

    #[test]
    fn late_failure_during_settling_is_caught() {
        let config = config(30, 3);
        let mut session = MonitorSession::new(HashSet::new(), true);

        session.observe(&[task("t2", TaskState::Running)], &config);
        let obs = session.observe(&[task("t2", TaskState::Failed)], &config);
        assert!(matches!(obs.step, Step::Failed(ref f) if f.task_id == TaskId::new("t2")));
    }

    #[test]
    fn running_does_not_time_out() {
        let config = config(2, 5);
        let mut session = MonitorSession::new(HashSet::new(), true);
        let running = [task("t2", TaskState::Running)];

        for _ in 0..4 {
            assert_eq!(session.observe(&running, &config).step, Step::Continue);
        }
        assert_eq!(session.observe(&running, &config).step, Step::Converged);
    }

    #[test]
    fn empty_poll_while_in_flight_counts_against_budget() {
        let config = config(2, 1);
        let mut session = MonitorSession::new(baseline(&["t1", "t2"]), false);
        let only_old = [task("t1", TaskState::Shutdown), task("t2", TaskState::Starting)];

        let obs = session.observe(&only_old, &config);
        assert_eq!(obs.step, Step::Continue);
        assert_eq!(obs.new_tasks, 0);
        assert_eq!(session.observe(&only_old, &config).step, Step::TimedOut);
    }

    #[test]
    fn empty_poll_with_settled_tasks_converges() {
        let config = MonitorConfig::default();
        let mut session = MonitorSession::new(baseline(&["t1", "t2", "t3"]), true);

        let obs = session.observe(
            &[
                task("t1", TaskState::Running),
                task("t2", TaskState::Running),
                task("t3", TaskState::Shutdown),
            ],
            &config,
        );
        assert_eq!(obs.step, Step::Converged);
        assert_eq!(obs.first_running, None);
        assert_eq!(session.phase(), MonitorPhase::Converged);
        assert_eq!(session.polls(), 1);
    }

    #[test]
    fn empty_first_poll_of_new_service_keeps_waiting() {
        let config = config(30, 1);
        let mut session = MonitorSession::new(HashSet::new(), true);

        assert_eq!(session.observe(&[], &config).step, Step::Continue);
        assert_eq!(session.polls(), 1);
    }

    #[test]
    fn stop_policy_ignores_empty_poll_while_settling() {
        let config = MonitorConfig {
            empty_poll: EmptyPollPolicy::Stop,
            ..config(30, 3)
        };
        let mut session = MonitorSession::new(HashSet::new(), true);

        assert_eq!(
            session.observe(&[task("t2", TaskState::Running)], &config).step,
            Step::Continue
        );
        assert_eq!(session.observe(&[], &config).step, Step::Continue);
        assert_eq!(session.observe(&[], &config).step, Step::Converged);
    }

    #[test]
    fn empty_poll_stops_under_stop_policy() {
        let config = MonitorConfig {
            empty_poll: EmptyPollPolicy::Stop,
            ..config(30, 1)
        };
        let mut session = MonitorSession::new(baseline(&["t1"]), false);

        let obs = session.observe(&[task("t1", TaskState::Running)], &config);
        assert_eq!(obs.step, Step::NoNewTasks);
        assert_eq!(session.polls(), 0);
    }

    // ------------------------------------------------------------------
    // ConvergenceMonitor（ScriptedTasks を使った非同期テスト）
    // ------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn monitor_converges_without_extra_poll() {
        let provider = ScriptedTasks::new(vec![
            vec![task("t1", TaskState::Running), task("t2", TaskState::Pending)],
            vec![task("t1", TaskState::Running), task("t2", TaskState::Running)],
            vec![task("t1", TaskState::Running), task("t2", TaskState::Failed)],
        ]);
        let monitor = ConvergenceMonitor::new(&provider, config(30, 1));

        let start = Instant::now();
        let report = monitor
            .run("web", MonitorMode::single().with_baseline(Baseline::Known(baseline(&["t1"]))))
            .await
            .unwrap();

        assert_eq!(report.polls, 2);
        assert_eq!(report.running_tasks, vec![TaskId::new("t2")]);
        // 3 件目のスナップショットは取得されない
        assert_eq!(provider.calls(), 2);
        // 初回待機 + cycle 間の待機 1 回
        assert_eq!(start.elapsed(), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_fails_on_first_rejected_cycle() {
        let provider = ScriptedTasks::new(vec![
            vec![task("t1", TaskState::Running)],
            vec![
                task("t1", TaskState::Running),
                task("t2", TaskState::Rejected).with_error("no suitable node"),
            ],
            vec![task("t1", TaskState::Running), task("t2", TaskState::Running)],
        ]);
        let monitor = ConvergenceMonitor::new(&provider, config(30, 1));

        let err = monitor.run("web", MonitorMode::extended()).await.unwrap_err();
        match err {
            LifecycleError::TaskFailed {
                task_id,
                state,
                detail,
                ..
            } => {
                assert_eq!(task_id, TaskId::new("t2"));
                assert_eq!(state, TaskState::Rejected);
                assert_eq!(detail.as_deref(), Some("no suitable node"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // capture + 1 poll
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_times_out_after_budget() {
        let provider = ScriptedTasks::new(vec![vec![
            task("t1", TaskState::Running),
            task("t2", TaskState::Pending),
        ]]);
        let monitor = ConvergenceMonitor::new(&provider, config(3, 1));

        let err = monitor
            .run("web", MonitorMode::single().with_baseline(Baseline::Known(baseline(&["t1"]))))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Timeout { polls: 3, .. }));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_finishes_scale_down_without_new_tasks() {
        let provider = ScriptedTasks::new(vec![vec![
            task("t1", TaskState::Running),
            task("t2", TaskState::Running),
        ]]);
        let monitor = ConvergenceMonitor::new(&provider, MonitorConfig::default());

        let start = Instant::now();
        let report = monitor
            .run(
                "web",
                MonitorMode::extended().with_baseline(Baseline::Known(baseline(&["t1", "t2", "t3"]))),
            )
            .await
            .unwrap();

        assert_eq!(report.polls, 1);
        assert!(report.running_tasks.is_empty());
        assert_eq!(provider.calls(), 1);
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_emits_events_in_order() {
        let provider = ScriptedTasks::new(vec![
            vec![],
            vec![task("t2", TaskState::Pending)],
            vec![task("t2", TaskState::Running)],
        ]);
        let (sink, mut rx) = ChannelEventSink::new();
        let monitor = ConvergenceMonitor::new(&provider, config(30, 0)).with_sink(&sink);

        monitor.run("web", MonitorMode::extended()).await.unwrap();

        let mut categories = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.service, "web");
            categories.push(event.category);
        }
        assert_eq!(
            categories,
            vec![
                EventCategory::Baseline,
                EventCategory::TaskRunning,
                EventCategory::Converged,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_surfaces_provider_errors() {
        let provider = ScriptedTasks::new(vec![vec![]]).failing_at(
            1,
            crate::domain::OrchestratorError::Transport("connection reset".to_string()),
        );
        let monitor = ConvergenceMonitor::new(&provider, config(30, 1));

        let err = monitor.run("web", MonitorMode::single()).await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Orchestrator(crate::domain::OrchestratorError::Transport(_))
        ));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_stops_when_cancelled() {
        let provider = ScriptedTasks::new(vec![vec![task("t2", TaskState::Pending)]]);
        let (tx, rx) = watch::channel(false);
        let monitor = ConvergenceMonitor::new(&provider, config(1000, 1)).with_shutdown(rx);

        let cancel = async {
            tokio::time::sleep(Duration::from_millis(5000)).await;
            tx.send(true).unwrap();
        };
        let (result, ()) = tokio::join!(monitor.run("web", MonitorMode::single()), cancel);

        assert!(matches!(result, Err(LifecycleError::Cancelled { .. })));
        // capture(0ms) + poll(2000ms) + poll(4000ms)
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_shutdown_sender_does_not_cancel() {
        let provider = ScriptedTasks::new(vec![
            vec![],
            vec![task("t2", TaskState::Running)],
        ]);
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let monitor = ConvergenceMonitor::new(&provider, config(30, 1)).with_shutdown(rx);

        let report = monitor.run("web", MonitorMode::single()).await.unwrap();
        assert_eq!(report.polls, 1);
    }
}
