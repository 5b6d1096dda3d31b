//! Admission cycle: promote due scheduled tasks and dispatch ready ones.
//!
//! One cycle runs at a time. Within a cycle the ready queue is drained in
//! priority/FIFO order until the concurrency ceiling is reached or the head
//! task cannot lock its resources. A blocked head stops the cycle so a later,
//! resource-free task never jumps ahead of it.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::executor::Spawn;
use crate::core::pipeline::{self, Admitted};
use crate::core::scheduler::{ActiveExecution, SchedulerShared};
use crate::core::task::{TaskExecution, TaskState};
use crate::util::serde::TaskId;

/// What one admission cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdmissionReport {
    /// Another cycle was in progress or the loop was stopping; nothing was done.
    pub skipped: bool,
    /// Scheduled tasks moved to Queued. They become admissible next cycle.
    pub promoted: Vec<TaskId>,
    /// Tasks moved to Running and dispatched, in admission order.
    pub admitted: Vec<TaskId>,
    /// Queue head whose resources were busy, if the cycle stopped on one.
    pub blocked: Option<TaskId>,
}

/// Run one cycle and spawn an execution unit per admitted task.
pub(crate) fn run_cycle<S: Spawn>(shared: &Arc<SchedulerShared>, spawner: &S) -> AdmissionReport {
    cycle(shared, spawner, None)
}

/// Like [`run_cycle`], but does nothing once `shutdown` is cancelled.
///
/// The token is checked while the cycle guard is held, so a stop that
/// cancels the token and then takes the guard knows no later cycle from
/// the loop will dispatch anything.
pub(crate) fn run_loop_cycle<S: Spawn>(
    shared: &Arc<SchedulerShared>,
    spawner: &S,
    shutdown: &CancellationToken,
) -> AdmissionReport {
    cycle(shared, spawner, Some(shutdown))
}

fn cycle<S: Spawn>(
    shared: &Arc<SchedulerShared>,
    spawner: &S,
    shutdown: Option<&CancellationToken>,
) -> AdmissionReport {
    let skipped = AdmissionReport {
        skipped: true,
        ..AdmissionReport::default()
    };
    let Some(guard) = shared.admission_guard.try_lock() else {
        debug!("admission cycle already in progress; skipping");
        return skipped;
    };
    if shutdown.is_some_and(CancellationToken::is_cancelled) {
        debug!("scheduler stopping; admission cycle skipped");
        return skipped;
    }
    let (report, admitted) = shared.admit();
    drop(guard);

    for admission in admitted {
        spawner.spawn(pipeline::execute(Arc::clone(shared), admission));
    }
    report
}

impl SchedulerShared {
    fn admit(&self) -> (AdmissionReport, Vec<Admitted>) {
        let now = self.clock.now();
        let mut report = AdmissionReport::default();
        let mut admitted = Vec::new();

        let mut queue = self.queue.lock();
        let mut tasks = self.tasks.write();

        let due: Vec<TaskId> = tasks
            .values()
            .filter(|task| task.is_due(now))
            .map(|task| task.task_id)
            .collect();
        for task_id in due {
            if self
                .transition(&mut tasks, task_id, TaskExecution::promote)
                .is_some()
            {
                debug!(%task_id, "scheduled task due; promoted");
                report.promoted.push(task_id);
            }
        }

        let occupied = tasks
            .values()
            .filter(|task| task.state.occupies_slot())
            .count();
        let available = self
            .max_concurrent
            .load(std::sync::atomic::Ordering::Acquire)
            .saturating_sub(occupied);

        while admitted.len() < available {
            let Some(entry) = queue.pop() else {
                break;
            };
            let task_id = entry.task_id;
            let Some(task) = tasks.get_mut(&task_id) else {
                continue;
            };
            if task.state != TaskState::Queued {
                continue;
            }
            if !self.coordinator.try_acquire(&task.locked_resources) {
                debug!(%task_id, "resources busy; holding queue head");
                queue.push(entry);
                report.blocked = Some(task_id);
                break;
            }
            task.resources_held = true;

            if self
                .transition(&mut tasks, task_id, |t| t.start(now))
                .is_none()
            {
                if let Some(task) = tasks.get_mut(&task_id) {
                    self.release_resources(task);
                }
                continue;
            }
            let token = CancellationToken::new();
            self.active
                .lock()
                .insert(task_id, ActiveExecution::new(token.clone()));
            info!(%task_id, job = %tasks[&task_id].job_name, "task admitted");
            admitted.push(Admitted { task_id, token });
            report.admitted.push(task_id);
        }

        for task_id in &report.promoted {
            if let Some(task) = tasks.get(task_id) {
                queue.push_new(*task_id, task.priority);
            }
        }

        (report, admitted)
    }
}
