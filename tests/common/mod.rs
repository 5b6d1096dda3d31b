//! Shared fixtures for scheduler integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use device_task_scheduler::prelude::*;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Spawns onto the ambient tokio runtime of the test.
#[derive(Clone, Default)]
pub struct TestSpawner;

impl Spawn for TestSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(fut);
    }
}

/// What a gated job does once its gate opens.
#[derive(Debug, Clone)]
pub enum GateAction {
    /// Return a payload of this many bytes.
    Succeed(usize),
    /// Return `JobError::Failed`.
    Fail(&'static str),
    /// Panic inside the runtime.
    Panic,
    /// Return a payload even if cancellation was requested.
    IgnoreCancel(usize),
}

/// Job runtime whose jobs block until the test opens their gate.
///
/// Jobs honour their cancellation token while waiting, except those set to
/// [`GateAction::IgnoreCancel`].
#[derive(Default)]
pub struct GatedRuntime {
    gates: Mutex<HashMap<TaskId, Arc<Notify>>>,
    actions: Mutex<HashMap<TaskId, GateAction>>,
    started: Mutex<Vec<TaskId>>,
    open: Mutex<HashSet<TaskId>>,
    auto_complete: Option<usize>,
}

impl GatedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every job completes at once with a payload of `size` bytes.
    pub fn completing(size: usize) -> Self {
        Self {
            auto_complete: Some(size),
            ..Self::default()
        }
    }

    fn gate(&self, task_id: TaskId) -> Arc<Notify> {
        Arc::clone(self.gates.lock().entry(task_id).or_default())
    }

    /// Decide what the job does without opening its gate.
    pub fn prepare(&self, task_id: TaskId, action: GateAction) {
        self.actions.lock().insert(task_id, action);
    }

    /// Let the job finish with `action`.
    pub fn release(&self, task_id: TaskId, action: GateAction) {
        self.actions.lock().insert(task_id, action);
        self.open.lock().insert(task_id);
        self.gate(task_id).notify_one();
    }

    /// Let the job finish successfully with a payload of `size` bytes.
    pub fn complete(&self, task_id: TaskId, size: usize) {
        self.release(task_id, GateAction::Succeed(size));
    }

    /// Tasks whose jobs have started, in start order.
    pub fn started(&self) -> Vec<TaskId> {
        self.started.lock().clone()
    }

    fn action(&self, task_id: TaskId) -> GateAction {
        self.actions
            .lock()
            .get(&task_id)
            .cloned()
            .unwrap_or(GateAction::Succeed(0))
    }
}

#[async_trait]
impl JobRuntime for GatedRuntime {
    async fn run(
        &self,
        _profile: &JobProfile,
        cancel: CancellationToken,
        progress: ProgressReporter,
    ) -> Result<Vec<u8>, JobError> {
        let task_id = progress.task_id();
        self.started.lock().push(task_id);
        progress.report("started", 0.1);

        if let Some(size) = self.auto_complete {
            return Ok(vec![0xA5; size]);
        }

        let gate = self.gate(task_id);
        let ignores_cancel = matches!(
            self.actions.lock().get(&task_id),
            Some(GateAction::IgnoreCancel(_))
        );
        let already_open = self.open.lock().contains(&task_id);
        if !already_open {
            if ignores_cancel {
                gate.notified().await;
            } else {
                tokio::select! {
                    () = cancel.cancelled() => return Err(JobError::Cancelled),
                    () = gate.notified() => {}
                }
            }
        }

        progress.report("finishing", 0.9);
        match self.action(task_id) {
            GateAction::Succeed(size) | GateAction::IgnoreCancel(size) => Ok(vec![0x5A; size]),
            GateAction::Fail(reason) => Err(JobError::failed(reason, "device did not respond")),
            GateAction::Panic => panic!("device runtime crashed"),
        }
    }
}

/// Sink that always refuses the payload.
pub struct RejectingSink;

#[async_trait]
impl ResultSink for RejectingSink {
    async fn persist(
        &self,
        _profile: &JobProfile,
        _task: &TaskExecution,
        _payload: &[u8],
    ) -> Result<String, SinkError> {
        Err(SinkError::Rejected("disk full".into()))
    }
}

pub fn profile(id: &str, resources: &[&str]) -> JobProfile {
    JobProfile {
        id: JobProfileId::new(id),
        name: format!("job {id}"),
        output_path: "dumps".into(),
        resources: resources.iter().map(|r| ResourceKey::from(*r)).collect(),
        parameters: serde_json::Value::Null,
    }
}

/// A scheduler on virtual time, driven by explicit admission cycles.
pub struct Harness {
    pub scheduler: TaskScheduler<TestSpawner>,
    pub catalog: Arc<InMemoryJobCatalog>,
    pub runtime: Arc<GatedRuntime>,
    pub sink: Arc<InMemoryResultSink>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(max_concurrent_tasks: usize) -> Self {
        Self::with_runtime(max_concurrent_tasks, GatedRuntime::new())
    }

    pub fn with_runtime(max_concurrent_tasks: usize, runtime: GatedRuntime) -> Self {
        let sink = Arc::new(InMemoryResultSink::new());
        Self::build(max_concurrent_tasks, runtime, Arc::clone(&sink) as Arc<dyn ResultSink>, sink)
    }

    pub fn with_sink(max_concurrent_tasks: usize, sink: Arc<dyn ResultSink>) -> Self {
        Self::build(
            max_concurrent_tasks,
            GatedRuntime::new(),
            sink,
            Arc::new(InMemoryResultSink::new()),
        )
    }

    fn build(
        max_concurrent_tasks: usize,
        runtime: GatedRuntime,
        sink: Arc<dyn ResultSink>,
        memory_sink: Arc<InMemoryResultSink>,
    ) -> Self {
        let catalog = Arc::new(InMemoryJobCatalog::new());
        catalog.insert(profile("dump-flash", &["R1"]));
        catalog.insert(profile("dump-ram", &["R1"]));
        catalog.insert(profile("calibrate", &["R2"]));
        catalog.insert(profile("self-test", &[]));

        let runtime = Arc::new(runtime);
        let clock = Arc::new(ManualClock::starting_now());
        let config = SchedulerConfig {
            max_concurrent_tasks,
            ..SchedulerConfig::default()
        };
        let scheduler = build_scheduler_with_clock(
            &config,
            Arc::clone(&catalog) as Arc<dyn JobCatalog>,
            Arc::clone(&runtime) as Arc<dyn JobRuntime>,
            sink,
            TestSpawner,
            Arc::clone(&clock) as Arc<dyn Clock>,
        )
        .expect("valid config");

        Self {
            scheduler,
            catalog,
            runtime,
            sink: memory_sink,
            clock,
        }
    }

    /// Create and enqueue a task.
    pub fn submit(&self, profile: &str, priority: Priority) -> TaskId {
        let id = self
            .scheduler
            .create_task(&JobProfileId::new(profile), priority)
            .expect("known profile");
        assert!(self.scheduler.enqueue(id));
        id
    }

    pub fn state(&self, task_id: TaskId) -> TaskState {
        self.scheduler.get_by_id(task_id).expect("tracked task").state
    }

    pub fn tick(&self) -> AdmissionReport {
        self.scheduler.run_admission_cycle()
    }

    /// Wait until the task reaches `state`, panicking after two seconds.
    pub async fn wait_for(&self, task_id: TaskId, state: TaskState) -> TaskExecution {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(task) = self.scheduler.get_by_id(task_id) {
                if task.state == state {
                    return task;
                }
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "task {task_id} never reached {state:?}; now {:?}",
                self.scheduler.get_by_id(task_id).map(|t| t.state)
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Wait until the runtime has started the job of `task_id`.
    pub async fn wait_started(&self, task_id: TaskId) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while !self.runtime.started().contains(&task_id) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "job of {task_id} never started"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
