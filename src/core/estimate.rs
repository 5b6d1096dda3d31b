//! Start-time estimation.
//!
//! A deliberately rough heuristic: every queued task ahead is assumed to take
//! one fixed step. Replace this function to plug in a real estimator.

use std::time::Duration;

use chrono::{DateTime, Local};

use crate::core::task::{TaskExecution, TaskState};
use crate::util::clock::to_delta;

/// Estimate when a task will start.
///
/// Running and Paused tasks report their actual start, Scheduled tasks their
/// due time, and Queued tasks `now + step * queued_ahead`. Other states have
/// no estimate.
#[must_use]
pub fn estimate_start_time(
    task: &TaskExecution,
    queued_ahead: Option<usize>,
    now: DateTime<Local>,
    step: Duration,
) -> Option<DateTime<Local>> {
    match task.state {
        TaskState::Running | TaskState::Paused => task.started_at,
        TaskState::Scheduled => task.scheduled_for,
        TaskState::Queued => {
            let ahead = u32::try_from(queued_ahead.unwrap_or(0)).unwrap_or(u32::MAX);
            now.checked_add_signed(to_delta(step.saturating_mul(ahead)))
        }
        _ => None,
    }
}
