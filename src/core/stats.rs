//! Counters and timings derived from the task table.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::core::task::{TaskExecution, TaskState};
use crate::util::serde::TaskId;

/// Point-in-time view of scheduler activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerStatistics {
    /// Tasks that reached any terminal state since the engine was built.
    pub total_finished: u64,
    /// Tasks that completed successfully.
    pub succeeded: u64,
    /// Tasks that failed.
    pub failed: u64,
    /// Tasks that were cancelled.
    pub cancelled: u64,
    /// Current number of tracked tasks per state. Every state is present.
    pub per_state: BTreeMap<TaskState, usize>,
    /// Mean execution time over the rolling window of successful runs.
    pub average_duration: Option<Duration>,
    /// Time since the engine was started, zero if never started.
    pub uptime: Duration,
    /// Current concurrency ceiling.
    pub max_concurrent_tasks: usize,
}

impl SchedulerStatistics {
    /// Tracked tasks in one state.
    #[must_use]
    pub fn count(&self, state: TaskState) -> usize {
        self.per_state.get(&state).copied().unwrap_or(0)
    }
}

/// Cumulative outcome counters plus a capped window of execution durations.
#[derive(Debug)]
pub(crate) struct StatisticsAggregator {
    total_finished: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    durations: Mutex<VecDeque<Duration>>,
    window: usize,
}

impl StatisticsAggregator {
    pub(crate) fn new(window: usize) -> Self {
        Self {
            total_finished: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            durations: Mutex::new(VecDeque::with_capacity(window)),
            window: window.max(1),
        }
    }

    /// Count a task that just reached a terminal state.
    pub(crate) fn record_outcome(&self, state: TaskState) {
        let counter = match state {
            TaskState::Completed => &self.succeeded,
            TaskState::Failed => &self.failed,
            TaskState::Cancelled => &self.cancelled,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.total_finished.fetch_add(1, Ordering::Relaxed);
    }

    /// Add a successful execution time, dropping the oldest past the window.
    pub(crate) fn record_duration(&self, duration: Duration) {
        let mut durations = self.durations.lock();
        if durations.len() >= self.window {
            durations.pop_front();
        }
        durations.push_back(duration);
    }

    fn average_duration(&self) -> Option<Duration> {
        let durations = self.durations.lock();
        let count = u32::try_from(durations.len()).ok().filter(|n| *n > 0)?;
        Some(durations.iter().sum::<Duration>() / count)
    }

    pub(crate) fn snapshot(
        &self,
        tasks: &HashMap<TaskId, TaskExecution>,
        uptime: Duration,
        max_concurrent_tasks: usize,
    ) -> SchedulerStatistics {
        let mut per_state: BTreeMap<TaskState, usize> =
            TaskState::ALL.iter().map(|state| (*state, 0)).collect();
        for task in tasks.values() {
            *per_state.entry(task.state).or_default() += 1;
        }
        SchedulerStatistics {
            total_finished: self.total_finished.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            per_state,
            average_duration: self.average_duration(),
            uptime,
            max_concurrent_tasks,
        }
    }
}
