//! Eviction of old terminal tasks from the task table.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::core::scheduler::SchedulerShared;
use crate::util::clock::to_delta;

/// Run one sweep with the configured retention window.
///
/// Skipped (returning 0) if another sweep is in progress.
pub(crate) fn run_sweep(shared: &Arc<SchedulerShared>) -> usize {
    let Some(_sweep) = shared.retention_guard.try_lock() else {
        debug!("retention sweep already in progress; skipping");
        return 0;
    };
    shared.sweep_older_than(shared.config.retention_window())
}

impl SchedulerShared {
    /// Remove terminal tasks whose completion time is strictly older than
    /// `now - age`. Non-terminal tasks are never touched.
    pub(crate) fn sweep_older_than(&self, age: Duration) -> usize {
        let now = self.clock.now();
        let Some(cutoff) = now.checked_sub_signed(to_delta(age)) else {
            return 0;
        };
        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|_, task| {
            !(task.is_terminal() && task.completed_at.is_some_and(|at| at < cutoff))
        });
        let removed = before - tasks.len();
        if removed > 0 {
            info!(removed, remaining = tasks.len(), "expired tasks removed");
        }
        removed
    }
}
