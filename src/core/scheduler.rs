//! Task scheduler: submission, control, queries and administration.
//!
//! State lives in one `SchedulerShared` value, shared between the public facade, the
//! periodic loops and every execution unit. Lock order is always
//! ready queue → task table → (resource coordinator | active executions), and
//! no lock is held across an `.await`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, Notify};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::core::admission::{self, AdmissionReport};
use crate::core::error::{SchedulerError, TransitionError};
use crate::core::estimate;
use crate::core::events::{EventBus, SchedulerEvent, TransitionLog, TransitionRecord};
use crate::core::executor::{JobCatalog, JobRuntime, ResultSink, Spawn};
use crate::core::resource::ResourceCoordinator;
use crate::core::retention;
use crate::core::stats::{SchedulerStatistics, StatisticsAggregator};
use crate::core::task::{ScheduleOutcome, TaskExecution, TaskState};
use crate::infra::queue::InMemoryReadyQueue;
use crate::util::clock::{elapsed_between, Clock, SystemClock};
use crate::util::serde::{JobProfileId, Priority, TaskId};

const DEFAULT_CANCEL_REASON: &str = "cancelled by user";
const STOP_CANCEL_REASON: &str = "scheduler stopped";

/// Cancellation handle of a task with a live execution unit.
pub(crate) struct ActiveExecution {
    pub(crate) token: CancellationToken,
    /// Reason given by the first cancellation request.
    pub(crate) reason: Option<String>,
}

impl ActiveExecution {
    pub(crate) const fn new(token: CancellationToken) -> Self {
        Self {
            token,
            reason: None,
        }
    }

    fn signal(&mut self, reason: &str) {
        self.reason.get_or_insert_with(|| reason.to_owned());
        self.token.cancel();
    }
}

/// State shared by the facade, the loops and the execution units.
pub(crate) struct SchedulerShared {
    pub(crate) config: SchedulerConfig,
    pub(crate) max_concurrent: AtomicUsize,
    pub(crate) tasks: RwLock<HashMap<TaskId, TaskExecution>>,
    pub(crate) queue: Mutex<InMemoryReadyQueue>,
    pub(crate) coordinator: ResourceCoordinator,
    /// Tasks with a live execution unit.
    pub(crate) active: Mutex<HashMap<TaskId, ActiveExecution>>,
    pub(crate) idle: Notify,
    pub(crate) admission_guard: Mutex<()>,
    pub(crate) retention_guard: Mutex<()>,
    pub(crate) events: EventBus,
    pub(crate) transitions: TransitionLog,
    pub(crate) stats: StatisticsAggregator,
    pub(crate) catalog: Arc<dyn JobCatalog>,
    pub(crate) runtime: Arc<dyn JobRuntime>,
    pub(crate) sink: Arc<dyn ResultSink>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) started_at: Mutex<Option<DateTime<Local>>>,
}

impl SchedulerShared {
    /// Apply a transition to one task and announce it if the state moved.
    ///
    /// Returns `None` if the task is unknown or the transition was rejected.
    pub(crate) fn transition<T>(
        &self,
        tasks: &mut HashMap<TaskId, TaskExecution>,
        task_id: TaskId,
        apply: impl FnOnce(&mut TaskExecution) -> Result<T, TransitionError>,
    ) -> Option<T> {
        let task = tasks.get_mut(&task_id)?;
        let from = task.state;
        match apply(task) {
            Ok(value) => {
                if task.state != from {
                    self.announce(Some(from), task);
                }
                Some(value)
            }
            Err(err) => {
                warn!(%err, "transition rejected");
                None
            }
        }
    }

    /// Record and publish a state change. Called with the table write lock
    /// held so subscribers observe transitions in the order they happen.
    ///
    /// `from` is `None` for a task that was just created.
    fn announce(&self, from: Option<TaskState>, task: &TaskExecution) {
        let at = self.clock.now();
        self.transitions.record(TransitionRecord {
            task_id: task.task_id,
            from,
            to: task.state,
            at,
        });
        if task.is_terminal() {
            self.stats.record_outcome(task.state);
        }
        debug!(task_id = %task.task_id, ?from, to = ?task.state, "task transition");
        self.events.publish(SchedulerEvent::StateChanged(task.clone()));
    }

    /// Return the task's keys to the coordinator if it still holds them.
    pub(crate) fn release_resources(&self, task: &mut TaskExecution) {
        if task.resources_held {
            self.coordinator.release(&task.locked_resources);
            task.resources_held = false;
            debug!(task_id = %task.task_id, "resources released");
        }
    }

    fn signal_cancel(&self, task_id: TaskId, reason: &str) -> bool {
        if let Some(execution) = self.active.lock().get_mut(&task_id) {
            execution.signal(reason);
            true
        } else {
            false
        }
    }

    /// Reason recorded for a cancellation request, if any.
    pub(crate) fn cancel_reason(&self, task_id: TaskId) -> Option<String> {
        self.active
            .lock()
            .get(&task_id)
            .and_then(|execution| execution.reason.clone())
    }

    /// Wait until no execution unit is live.
    pub(crate) async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.active.lock().is_empty() {
                return;
            }
            notified.await;
        }
    }

    fn uptime(&self) -> Duration {
        let started = *self.started_at.lock();
        started.map_or(Duration::ZERO, |at| elapsed_between(at, self.clock.now()))
    }
}

/// Resource-aware task scheduler.
///
/// Tasks are created from job profiles, queued or scheduled, admitted by a
/// periodic admission cycle subject to a concurrency ceiling and exclusive
/// resource locks, and executed as independent units on the spawner `S`.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use device_task_scheduler::prelude::*;
///
/// let scheduler = TaskScheduler::new(
///     SchedulerConfig::default(),
///     catalog,
///     runtime,
///     Arc::new(InMemoryResultSink::new()),
///     TokioSpawner::current()?,
/// )?;
/// scheduler.start();
///
/// let id = scheduler.create_task(&JobProfileId::new("dump-flash"), Priority::High)?;
/// scheduler.enqueue(id);
/// ```
pub struct TaskScheduler<S> {
    shared: Arc<SchedulerShared>,
    spawner: S,
    shutdown: Mutex<CancellationToken>,
    running: AtomicBool,
}

impl<S> TaskScheduler<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a scheduler from validated configuration and its collaborators.
    pub fn new(
        config: SchedulerConfig,
        catalog: Arc<dyn JobCatalog>,
        runtime: Arc<dyn JobRuntime>,
        sink: Arc<dyn ResultSink>,
        spawner: S,
    ) -> Result<Self, SchedulerError> {
        Self::new_with_clock(config, catalog, runtime, sink, spawner, Arc::new(SystemClock))
    }

    /// Like [`TaskScheduler::new`], reading time from `clock`.
    pub fn new_with_clock(
        config: SchedulerConfig,
        catalog: Arc<dyn JobCatalog>,
        runtime: Arc<dyn JobRuntime>,
        sink: Arc<dyn ResultSink>,
        spawner: S,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        let shared = SchedulerShared {
            max_concurrent: AtomicUsize::new(config.max_concurrent_tasks),
            tasks: RwLock::new(HashMap::new()),
            queue: Mutex::new(InMemoryReadyQueue::new()),
            coordinator: ResourceCoordinator::new(),
            active: Mutex::new(HashMap::new()),
            idle: Notify::new(),
            admission_guard: Mutex::new(()),
            retention_guard: Mutex::new(()),
            events: EventBus::new(config.event_capacity),
            transitions: TransitionLog::new(config.transition_log_capacity),
            stats: StatisticsAggregator::new(config.statistics_window),
            catalog,
            runtime,
            sink,
            clock,
            started_at: Mutex::new(None),
            config,
        };
        Ok(Self {
            shared: Arc::new(shared),
            spawner,
            shutdown: Mutex::new(CancellationToken::new()),
            running: AtomicBool::new(false),
        })
    }

    // ------------------------------------------------------------------
    // Submit
    // ------------------------------------------------------------------

    /// Create a task in the Created state for a catalog profile.
    pub fn create_task(
        &self,
        profile_id: &JobProfileId,
        priority: Priority,
    ) -> Result<TaskId, SchedulerError> {
        let profile = self
            .shared
            .catalog
            .resolve(profile_id)
            .ok_or_else(|| SchedulerError::UnknownProfile(profile_id.clone()))?;
        if !self.shared.catalog.is_eligible(profile_id) {
            return Err(SchedulerError::ProfileNotEligible(profile_id.clone()));
        }

        let task = TaskExecution::new(&profile, priority, self.shared.clock.now());
        let task_id = task.task_id;
        {
            let mut tasks = self.shared.tasks.write();
            self.shared.announce(None, &task);
            tasks.insert(task_id, task);
        }
        info!(%task_id, profile = %profile_id, %priority, "task created");
        Ok(task_id)
    }

    /// Move a Created task into the ready queue.
    pub fn enqueue(&self, task_id: TaskId) -> bool {
        let mut queue = self.shared.queue.lock();
        let mut tasks = self.shared.tasks.write();
        if self
            .shared
            .transition(&mut tasks, task_id, TaskExecution::enqueue)
            .is_none()
        {
            return false;
        }
        let task = &tasks[&task_id];
        queue.push_new(task_id, task.priority);
        debug!(%task_id, depth = queue.len(), "task enqueued");
        true
    }

    /// Schedule a Created or Queued task for a later time.
    ///
    /// The time is normalized to the local time zone. A time that is already
    /// due sends the task straight to the ready queue.
    pub fn schedule<Tz: TimeZone>(&self, task_id: TaskId, when: DateTime<Tz>) -> bool {
        let when = when.with_timezone(&Local);
        let now = self.shared.clock.now();
        let mut queue = self.shared.queue.lock();
        let mut tasks = self.shared.tasks.write();
        let Some(was_queued) = tasks.get(&task_id).map(|t| t.state == TaskState::Queued) else {
            return false;
        };
        let Some(outcome) = self
            .shared
            .transition(&mut tasks, task_id, |t| t.schedule(when, now))
        else {
            return false;
        };
        match outcome {
            ScheduleOutcome::Deferred => {
                if was_queued {
                    queue.remove(task_id);
                }
                info!(%task_id, %when, "task scheduled");
            }
            ScheduleOutcome::QueuedNow => {
                if !was_queued {
                    let task = &tasks[&task_id];
                    queue.push_new(task_id, task.priority);
                }
                debug!(%task_id, "scheduled time already due; task queued");
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------

    /// Cancel a task.
    ///
    /// Created, Queued, Scheduled and Paused tasks are cancelled immediately
    /// and their resources released. For a Running task the cancellation
    /// signal is delivered to its job runtime and the task becomes Cancelled
    /// once the runtime stops. Terminal tasks are rejected.
    pub fn cancel(&self, task_id: TaskId, reason: Option<&str>) -> bool {
        let reason = reason.unwrap_or(DEFAULT_CANCEL_REASON);
        let now = self.shared.clock.now();
        let mut queue = self.shared.queue.lock();
        let mut tasks = self.shared.tasks.write();
        let Some(state) = tasks.get(&task_id).map(|t| t.state) else {
            return false;
        };

        if state == TaskState::Running {
            let signalled = self.shared.signal_cancel(task_id, reason);
            if signalled {
                info!(%task_id, reason, "cancellation requested for running task");
            }
            return signalled;
        }

        let shared = &self.shared;
        let cancelled = shared
            .transition(&mut tasks, task_id, |t| {
                t.cancel(reason, now)?;
                shared.release_resources(t);
                Ok(())
            })
            .is_some();
        if cancelled {
            queue.remove(task_id);
            if state == TaskState::Paused {
                shared.signal_cancel(task_id, reason);
            }
            info!(%task_id, reason, "task cancelled");
        }
        cancelled
    }

    /// Mark a Running task as paused. It keeps its resources and its slot.
    pub fn pause(&self, task_id: TaskId) -> bool {
        let mut tasks = self.shared.tasks.write();
        self.shared
            .transition(&mut tasks, task_id, TaskExecution::pause)
            .is_some()
    }

    /// Resume a Paused task.
    pub fn resume(&self, task_id: TaskId) -> bool {
        let mut tasks = self.shared.tasks.write();
        self.shared
            .transition(&mut tasks, task_id, TaskExecution::resume)
            .is_some()
    }

    /// Create a fresh task with the same profile and priority as a terminal one.
    pub fn restart(&self, task_id: TaskId) -> Option<TaskId> {
        let (profile_id, priority) = {
            let tasks = self.shared.tasks.read();
            let task = tasks.get(&task_id)?;
            if !task.is_terminal() {
                warn!(%task_id, state = ?task.state, "restart rejected: task not terminal");
                return None;
            }
            (task.job_profile_id.clone(), task.priority)
        };
        match self.create_task(&profile_id, priority) {
            Ok(new_id) => {
                info!(previous = %task_id, %new_id, "task restarted");
                Some(new_id)
            }
            Err(err) => {
                warn!(%task_id, %err, "restart failed");
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Query
    // ------------------------------------------------------------------

    fn collect(&self, filter: impl Fn(&TaskExecution) -> bool) -> Vec<TaskExecution> {
        let mut found: Vec<_> = self
            .shared
            .tasks
            .read()
            .values()
            .filter(|t| filter(t))
            .cloned()
            .collect();
        found.sort_by_key(|t| t.created_at);
        found
    }

    /// Every tracked task, oldest first.
    pub fn get_all(&self) -> Vec<TaskExecution> {
        self.collect(|_| true)
    }

    /// Snapshot of one task.
    pub fn get_by_id(&self, task_id: TaskId) -> Option<TaskExecution> {
        self.shared.tasks.read().get(&task_id).cloned()
    }

    /// Tasks in a given state.
    pub fn get_by_state(&self, state: TaskState) -> Vec<TaskExecution> {
        self.collect(|t| t.state == state)
    }

    /// Tasks with a given priority.
    pub fn get_by_priority(&self, priority: Priority) -> Vec<TaskExecution> {
        self.collect(|t| t.priority == priority)
    }

    /// Tasks bound to a job profile.
    pub fn get_by_job_profile(&self, profile_id: &JobProfileId) -> Vec<TaskExecution> {
        self.collect(|t| &t.job_profile_id == profile_id)
    }

    /// Queued tasks in admission order.
    pub fn get_queued(&self) -> Vec<TaskExecution> {
        let queue = self.shared.queue.lock();
        let tasks = self.shared.tasks.read();
        queue
            .ordered_ids()
            .into_iter()
            .filter_map(|id| tasks.get(&id).cloned())
            .collect()
    }

    /// Running tasks.
    pub fn get_running(&self) -> Vec<TaskExecution> {
        self.get_by_state(TaskState::Running)
    }

    /// Rough estimate of when a task will start. See [`estimate::estimate_start_time`].
    pub fn estimate_start_time(&self, task_id: TaskId) -> Option<DateTime<Local>> {
        let queue = self.shared.queue.lock();
        let tasks = self.shared.tasks.read();
        let task = tasks.get(&task_id)?;
        estimate::estimate_start_time(
            task,
            queue.position(task_id),
            self.shared.clock.now(),
            self.shared.config.queue_estimate_step(),
        )
    }

    /// Subscribe to state-change and progress notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.shared.events.subscribe()
    }

    /// Recent transitions, oldest first. Task creation is recorded with no
    /// previous state.
    pub fn recent_transitions(&self) -> Vec<TransitionRecord> {
        self.shared.transitions.records()
    }

    /// The resource lock registry.
    pub fn resources(&self) -> &ResourceCoordinator {
        &self.shared.coordinator
    }

    // ------------------------------------------------------------------
    // Admin
    // ------------------------------------------------------------------

    /// Start the admission and retention loops. Calling it twice is a no-op.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let shutdown = {
            let mut guard = self.shutdown.lock();
            if guard.is_cancelled() {
                *guard = CancellationToken::new();
            }
            guard.clone()
        };
        self.shared
            .started_at
            .lock()
            .get_or_insert_with(|| self.shared.clock.now());

        let shared = Arc::clone(&self.shared);
        let spawner = self.spawner.clone();
        let token = shutdown.clone();
        let period = self.shared.config.admission_interval();
        self.spawner.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = interval.tick() => {
                        admission::run_loop_cycle(&shared, &spawner, &token);
                    }
                }
            }
            debug!("admission loop stopped");
        });

        let shared = Arc::clone(&self.shared);
        let period = self.shared.config.retention_interval();
        self.spawner.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        retention::run_sweep(&shared);
                    }
                }
            }
            debug!("retention loop stopped");
        });

        info!(
            max_concurrent_tasks = self.max_concurrent_tasks(),
            "scheduler started"
        );
    }

    /// Stop the loops.
    ///
    /// A graceful stop waits until every executing task has reached a
    /// terminal state. Otherwise executing tasks are signalled to cancel and
    /// the call returns at once. Either way the admission loop dispatches
    /// nothing after this returns.
    pub async fn stop(&self, graceful: bool) {
        self.shutdown.lock().cancel();
        self.running.store(false, Ordering::Release);
        // Wait out a cycle already past its shutdown check; its admissions
        // are in `active` once the guard is free.
        drop(self.shared.admission_guard.lock());
        if graceful {
            info!("scheduler stopping; waiting for executing tasks");
            self.shared.wait_idle().await;
        } else {
            let signalled = {
                let mut active = self.shared.active.lock();
                for execution in active.values_mut() {
                    execution.signal(STOP_CANCEL_REASON);
                }
                active.len()
            };
            info!(signalled, "scheduler stopped");
        }
    }

    /// Whether the loops are running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Change the concurrency ceiling. Takes effect on the next admission cycle.
    pub fn set_max_concurrent_tasks(&self, max: usize) -> Result<(), SchedulerError> {
        if max == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_concurrent_tasks must be greater than 0".into(),
            ));
        }
        let previous = self.shared.max_concurrent.swap(max, Ordering::AcqRel);
        info!(previous, max, "concurrency ceiling changed");
        Ok(())
    }

    /// Current concurrency ceiling.
    pub fn max_concurrent_tasks(&self) -> usize {
        self.shared.max_concurrent.load(Ordering::Acquire)
    }

    /// Remove terminal tasks that finished more than `age` ago.
    pub fn cleanup_older_than(&self, age: Duration) -> usize {
        self.shared.sweep_older_than(age)
    }

    /// Counters and timings.
    pub fn get_statistics(&self) -> SchedulerStatistics {
        let tasks = self.shared.tasks.read();
        self.shared
            .stats
            .snapshot(&tasks, self.shared.uptime(), self.max_concurrent_tasks())
    }

    /// Run one admission cycle now.
    pub fn run_admission_cycle(&self) -> AdmissionReport {
        admission::run_cycle(&self.shared, &self.spawner)
    }

    /// Run one retention sweep now with the configured window.
    pub fn run_retention_sweep(&self) -> usize {
        retention::run_sweep(&self.shared)
    }
}
