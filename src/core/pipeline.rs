//! Execution unit for one admitted task.
//!
//! Resolve the profile, check eligibility, run the job, persist the payload,
//! then move the task to its terminal state. Every exit path, including a
//! panic in the job runtime, goes through [`ExecutionGuard`] so resources and
//! the concurrency slot are always given back.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::core::error::JobError;
use crate::core::events::SchedulerEvent;
use crate::core::scheduler::SchedulerShared;
use crate::core::task::{TaskExecution, TaskState};
use crate::util::clock::elapsed_between;
use crate::util::serde::TaskId;

const PROFILE_NOT_FOUND: &str = "profile not found";
const PROFILE_NOT_ELIGIBLE: &str = "profile not eligible";
const PERSIST_FAILED: &str = "failed to persist result";
const EXECUTION_ABORTED: &str = "execution aborted";

/// A task that was moved to Running by the admission cycle.
pub(crate) struct Admitted {
    pub(crate) task_id: TaskId,
    pub(crate) token: CancellationToken,
}

/// How an execution unit ended.
#[derive(Debug)]
pub(crate) enum Outcome {
    Completed { location: String, size: u64 },
    Failed { reason: String, detail: String },
    Cancelled(String),
}

impl Outcome {
    fn failed(reason: &str, detail: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.to_owned(),
            detail: detail.into(),
        }
    }
}

/// Handle a job runtime uses to report progress for its task.
///
/// Reports are ignored unless the task is Running.
#[derive(Clone)]
pub struct ProgressReporter {
    shared: Arc<SchedulerShared>,
    task_id: TaskId,
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("task_id", &self.task_id)
            .finish_non_exhaustive()
    }
}

impl ProgressReporter {
    pub(crate) const fn new(shared: Arc<SchedulerShared>, task_id: TaskId) -> Self {
        Self { shared, task_id }
    }

    /// Task this reporter belongs to.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Record progress. `fraction` is clamped to 0.0..=1.0; non-finite values
    /// are dropped.
    pub fn report(&self, stage: &str, fraction: f64) {
        let mut tasks = self.shared.tasks.write();
        let Some(task) = tasks.get_mut(&self.task_id) else {
            return;
        };
        if task.record_progress(stage, fraction) {
            self.shared.events.publish(SchedulerEvent::ProgressUpdated {
                task_id: self.task_id,
                fraction: task.progress_fraction,
                stage: task.progress_stage.clone(),
            });
        }
    }
}

/// Releases the task's hold on the scheduler when the execution unit ends.
struct ExecutionGuard {
    shared: Arc<SchedulerShared>,
    task_id: TaskId,
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        let aborted = self.shared.finish(
            self.task_id,
            Outcome::failed(EXECUTION_ABORTED, "execution unit ended without an outcome"),
        );
        if aborted {
            error!(task_id = %self.task_id, "execution unit aborted");
        }
        {
            let mut tasks = self.shared.tasks.write();
            if let Some(task) = tasks.get_mut(&self.task_id) {
                self.shared.release_resources(task);
            }
        }
        self.shared.active.lock().remove(&self.task_id);
        self.shared.idle.notify_waiters();
    }
}

/// Drive one admitted task to a terminal state.
pub(crate) async fn execute(shared: Arc<SchedulerShared>, admitted: Admitted) {
    let span = info_span!("task", task_id = %admitted.task_id);
    run(shared, admitted).instrument(span).await;
}

async fn run(shared: Arc<SchedulerShared>, admitted: Admitted) {
    let Admitted { task_id, token } = admitted;
    let _guard = ExecutionGuard {
        shared: Arc::clone(&shared),
        task_id,
    };

    let Some(profile_id) = shared
        .tasks
        .read()
        .get(&task_id)
        .map(|t| t.job_profile_id.clone())
    else {
        warn!("admitted task vanished before execution");
        return;
    };

    let Some(profile) = shared.catalog.resolve(&profile_id) else {
        warn!(profile = %profile_id, "job profile no longer in catalog");
        shared.finish(
            task_id,
            Outcome::failed(PROFILE_NOT_FOUND, format!("catalog has no profile {profile_id}")),
        );
        return;
    };
    if !shared.catalog.is_eligible(&profile_id) {
        warn!(profile = %profile_id, "job profile not eligible at execution");
        shared.finish(
            task_id,
            Outcome::failed(PROFILE_NOT_ELIGIBLE, format!("profile {profile_id} is disabled")),
        );
        return;
    }

    debug!(job = %profile.name, "running job");
    let progress = ProgressReporter::new(Arc::clone(&shared), task_id);
    let result = shared.runtime.run(&profile, token.clone(), progress).await;

    let outcome = match result {
        Ok(payload) => {
            let Some(snapshot) = shared.executing_snapshot(task_id) else {
                debug!("task left execution while running; result discarded");
                return;
            };
            match shared.sink.persist(&profile, &snapshot, &payload).await {
                Ok(location) => Outcome::Completed {
                    location,
                    size: u64::try_from(payload.len()).unwrap_or(u64::MAX),
                },
                Err(err) => {
                    error!(%err, "result sink rejected payload");
                    Outcome::failed(PERSIST_FAILED, err.to_string())
                }
            }
        }
        Err(JobError::Cancelled) => Outcome::Cancelled(
            shared
                .cancel_reason(task_id)
                .unwrap_or_else(|| JobError::Cancelled.to_string()),
        ),
        Err(JobError::Failed { reason, detail }) => {
            warn!(%reason, "job failed");
            Outcome::Failed { reason, detail }
        }
    };

    if token.is_cancelled() && !matches!(outcome, Outcome::Cancelled(_)) {
        debug!("job ignored cancellation signal");
    }
    shared.finish(task_id, outcome);
}

impl SchedulerShared {
    /// Snapshot of a task that is still Running or Paused.
    fn executing_snapshot(&self, task_id: TaskId) -> Option<TaskExecution> {
        self.tasks
            .read()
            .get(&task_id)
            .filter(|t| t.state.occupies_slot())
            .cloned()
    }

    /// Move an executing task to its terminal state and release its resources.
    ///
    /// Returns `false` if the task was not executing any more.
    pub(crate) fn finish(&self, task_id: TaskId, outcome: Outcome) -> bool {
        let now = self.clock.now();
        let mut tasks = self.tasks.write();
        if !tasks.get(&task_id).is_some_and(|t| t.state.occupies_slot()) {
            return false;
        }
        let finished = self
            .transition(&mut tasks, task_id, |t| {
                match outcome {
                    Outcome::Completed { location, size } => t.complete(location, size, now)?,
                    Outcome::Failed { reason, detail } => t.fail(reason, detail, now)?,
                    Outcome::Cancelled(reason) => t.finish_cancelled(reason, now)?,
                }
                self.release_resources(t);
                Ok(t.started_at.map(|at| (t.state, elapsed_between(at, now))))
            });
        let Some(timing) = finished else {
            return false;
        };
        if let Some((state, elapsed)) = timing {
            if state == TaskState::Completed {
                self.stats.record_duration(elapsed);
            }
            info!(%task_id, ?state, elapsed_ms = elapsed.as_millis(), "task finished");
        }
        true
    }
}
