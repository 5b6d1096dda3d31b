//! Change notifications and the bounded transition history.
//!
//! Notifications fan out over a `tokio::sync::broadcast` channel. Sending never
//! blocks: a subscriber that falls behind loses its oldest events and sees a
//! `Lagged` error on its next receive.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::core::task::{TaskExecution, TaskState};
use crate::util::serde::TaskId;

/// Notification emitted by the scheduler.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A task changed state; carries the full snapshot after the change.
    StateChanged(TaskExecution),
    /// A running task reported progress.
    ProgressUpdated {
        /// Reporting task.
        task_id: TaskId,
        /// Clamped progress fraction.
        fraction: f64,
        /// Free-text stage.
        stage: String,
    },
}

impl SchedulerEvent {
    /// Task the event refers to.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        match self {
            Self::StateChanged(task) => task.task_id,
            Self::ProgressUpdated { task_id, .. } => *task_id,
        }
    }
}

/// Publish/subscribe hub for [`SchedulerEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SchedulerEvent>,
}

impl EventBus {
    /// Create a bus that buffers up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Register a new subscriber. It sees events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: SchedulerEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One recorded state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionRecord {
    /// Task that moved.
    pub task_id: TaskId,
    /// Previous state; `None` when the record marks the task's creation.
    pub from: Option<TaskState>,
    /// New state.
    pub to: TaskState,
    /// When the move happened.
    pub at: DateTime<Local>,
}

/// Bounded ring of recent transitions, oldest dropped first.
#[derive(Debug)]
pub struct TransitionLog {
    records: Mutex<VecDeque<TransitionRecord>>,
    max_records: usize,
}

impl TransitionLog {
    /// Create a log holding at most `max_records` entries.
    #[must_use]
    pub fn new(max_records: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(max_records.min(1024))),
            max_records,
        }
    }

    /// Append a record.
    pub fn record(&self, record: TransitionRecord) {
        if self.max_records == 0 {
            return;
        }
        let mut records = self.records.lock();
        if records.len() >= self.max_records {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Snapshot, oldest first.
    pub fn records(&self) -> Vec<TransitionRecord> {
        self.records.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(from: TaskState, to: TaskState) -> TransitionRecord {
        TransitionRecord {
            task_id: TaskId::new(),
            from: Some(from),
            to,
            at: Local::now(),
        }
    }

    #[test]
    fn transition_log_overflow_drops_oldest() {
        let log = TransitionLog::new(2);
        log.record(record(TaskState::Created, TaskState::Queued));
        log.record(record(TaskState::Queued, TaskState::Running));
        log.record(record(TaskState::Running, TaskState::Completed));

        let records = log.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].to, TaskState::Running);
        assert_eq!(records[1].to, TaskState::Completed);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        bus.publish(SchedulerEvent::ProgressUpdated {
            task_id: TaskId::new(),
            fraction: 0.5,
            stage: "read".into(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_in_publish_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let id = TaskId::new();
        for step in 0..3u32 {
            bus.publish(SchedulerEvent::ProgressUpdated {
                task_id: id,
                fraction: f64::from(step) / 2.0,
                stage: format!("step-{step}"),
            });
        }
        for step in 0..3u32 {
            match rx.recv().await.unwrap() {
                SchedulerEvent::ProgressUpdated { stage, .. } => {
                    assert_eq!(stage, format!("step-{step}"));
                }
                SchedulerEvent::StateChanged(_) => panic!("unexpected state event"),
            }
        }
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for _ in 0..5 {
            bus.publish(SchedulerEvent::ProgressUpdated {
                task_id: TaskId::new(),
                fraction: 0.0,
                stage: String::new(),
            });
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
    }
}
