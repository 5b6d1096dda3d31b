//! In-memory ready queue with priority and FIFO-within-priority ordering.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::util::serde::{Priority, TaskId};

/// Position of one Queued task in the ready queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Queued task.
    pub task_id: TaskId,
    /// Task priority.
    pub priority: Priority,
    /// Monotonic enqueue order within the queue.
    pub sequence: u64,
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first, then earlier enqueue (reversed for max-heap).
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Priority heap of Queued tasks.
///
/// An entry that is popped and pushed back keeps its ordering key, so a task
/// returned after a failed resource acquisition goes straight back to the head.
#[derive(Debug, Default)]
pub struct InMemoryReadyQueue {
    entries: BinaryHeap<QueueEntry>,
    next_sequence: u64,
}

impl InMemoryReadyQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a task, assigning the next sequence number.
    pub fn push_new(&mut self, task_id: TaskId, priority: Priority) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push(QueueEntry {
            task_id,
            priority,
            sequence,
        });
    }

    /// Put back a previously popped entry with its original key.
    pub fn push(&mut self, entry: QueueEntry) {
        self.entries.push(entry);
    }

    /// Remove the best entry.
    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.entries.pop()
    }

    /// Best entry without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&QueueEntry> {
        self.entries.peek()
    }

    /// Drop a task from the queue. Returns whether it was present.
    pub fn remove(&mut self, task_id: TaskId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.task_id != task_id);
        self.entries.len() != before
    }

    /// Task ids in admission order.
    #[must_use]
    pub fn ordered_ids(&self) -> Vec<TaskId> {
        let mut sorted = self.entries.clone().into_sorted_vec();
        sorted.reverse();
        sorted.into_iter().map(|entry| entry.task_id).collect()
    }

    /// Number of entries ahead of the task, if queued.
    #[must_use]
    pub fn position(&self, task_id: TaskId) -> Option<usize> {
        let target = self.entries.iter().find(|entry| entry.task_id == task_id)?;
        Some(self.entries.iter().filter(|entry| *entry > target).count())
    }

    /// Whether the task is queued.
    #[must_use]
    pub fn contains(&self, task_id: TaskId) -> bool {
        self.entries.iter().any(|entry| entry.task_id == task_id)
    }

    /// Current depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
