//! Task records and their lifecycle state machine.
//!
//! A [`TaskExecution`] is only ever mutated by the scheduler while it holds the
//! task table write lock. Every method here either applies a permitted
//! transition or returns a [`TransitionError`] and leaves the record untouched.

use std::collections::BTreeSet;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::core::error::TransitionError;
use crate::core::executor::JobProfile;
use crate::core::resource::ResourceKey;
use crate::util::serde::{JobProfileId, Priority, TaskId};

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Created but not yet submitted.
    Created,
    /// Waiting in the ready queue.
    Queued,
    /// Waiting for its scheduled time.
    Scheduled,
    /// Holding its resources and executing.
    Running,
    /// Marked paused by the user; still holds resources and a slot.
    Paused,
    /// Finished with a persisted result.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled before or during execution.
    Cancelled,
}

impl TaskState {
    /// Every state, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Created,
        Self::Queued,
        Self::Scheduled,
        Self::Running,
        Self::Paused,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    /// Completed, Failed or Cancelled.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// States from which a synchronous cancel is permitted.
    #[must_use]
    pub const fn can_cancel(self) -> bool {
        matches!(
            self,
            Self::Created | Self::Queued | Self::Scheduled | Self::Paused
        )
    }

    /// States that consume a concurrency slot.
    #[must_use]
    pub const fn occupies_slot(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

/// Outcome of a successful `schedule` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// The time lies in the future; the task waits in Scheduled.
    Deferred,
    /// The time was already due; the task went straight to Queued.
    QueuedNow,
}

/// One scheduled unit of work and its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskExecution {
    /// Process-unique identifier.
    pub task_id: TaskId,
    /// Catalog entry this task runs.
    pub job_profile_id: JobProfileId,
    /// Display label captured at creation.
    pub job_name: String,
    /// Ready-queue ordering class.
    pub priority: Priority,
    /// Exclusive resources the job requires.
    pub locked_resources: BTreeSet<ResourceKey>,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Creation time.
    pub created_at: DateTime<Local>,
    /// Time the task entered Running.
    pub started_at: Option<DateTime<Local>>,
    /// Time the task reached a terminal state.
    pub completed_at: Option<DateTime<Local>>,
    /// Last reported progress, 0.0 to 1.0.
    pub progress_fraction: f64,
    /// Last reported progress stage.
    pub progress_stage: String,
    /// Where the result payload was persisted.
    pub result_location: Option<String>,
    /// Size of the persisted payload in bytes.
    pub result_size: Option<u64>,
    /// Short failure reason.
    pub failure_reason: Option<String>,
    /// Detailed failure diagnostics.
    pub failure_detail: Option<String>,
    /// Why the task was cancelled.
    pub cancellation_reason: Option<String>,
    /// Due time while Scheduled.
    pub scheduled_for: Option<DateTime<Local>>,
    /// Whether the coordinator currently holds `locked_resources` for this task.
    pub resources_held: bool,
}

impl TaskExecution {
    /// Create a record in the Created state from a resolved profile.
    #[must_use]
    pub fn new(profile: &JobProfile, priority: Priority, now: DateTime<Local>) -> Self {
        Self {
            task_id: TaskId::new(),
            job_profile_id: profile.id.clone(),
            job_name: profile.name.clone(),
            priority,
            locked_resources: profile.resources.clone(),
            state: TaskState::Created,
            created_at: now,
            started_at: None,
            completed_at: None,
            progress_fraction: 0.0,
            progress_stage: String::new(),
            result_location: None,
            result_size: None,
            failure_reason: None,
            failure_detail: None,
            cancellation_reason: None,
            scheduled_for: None,
            resources_held: false,
        }
    }

    /// Whether the task is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether a Scheduled task has reached its due time.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Local>) -> bool {
        self.state == TaskState::Scheduled && self.scheduled_for.is_some_and(|at| at <= now)
    }

    fn reject(&self, action: &'static str) -> TransitionError {
        TransitionError {
            task_id: self.task_id,
            from: self.state,
            action,
        }
    }

    /// Created → Queued.
    pub(crate) fn enqueue(&mut self) -> Result<(), TransitionError> {
        if self.state != TaskState::Created {
            return Err(self.reject("enqueue"));
        }
        self.state = TaskState::Queued;
        Ok(())
    }

    /// Created|Queued → Scheduled, or → Queued when `when` is already due.
    pub(crate) fn schedule(
        &mut self,
        when: DateTime<Local>,
        now: DateTime<Local>,
    ) -> Result<ScheduleOutcome, TransitionError> {
        if !matches!(self.state, TaskState::Created | TaskState::Queued) {
            return Err(self.reject("schedule"));
        }
        if when <= now {
            self.state = TaskState::Queued;
            self.scheduled_for = None;
            return Ok(ScheduleOutcome::QueuedNow);
        }
        self.state = TaskState::Scheduled;
        self.scheduled_for = Some(when);
        Ok(ScheduleOutcome::Deferred)
    }

    /// Scheduled → Queued once due.
    pub(crate) fn promote(&mut self) -> Result<(), TransitionError> {
        if self.state != TaskState::Scheduled {
            return Err(self.reject("promote"));
        }
        self.state = TaskState::Queued;
        self.scheduled_for = None;
        Ok(())
    }

    /// Queued → Running.
    pub(crate) fn start(&mut self, now: DateTime<Local>) -> Result<(), TransitionError> {
        if self.state != TaskState::Queued {
            return Err(self.reject("start"));
        }
        self.state = TaskState::Running;
        self.started_at = Some(now);
        Ok(())
    }

    /// Running → Paused.
    pub(crate) fn pause(&mut self) -> Result<(), TransitionError> {
        if self.state != TaskState::Running {
            return Err(self.reject("pause"));
        }
        self.state = TaskState::Paused;
        Ok(())
    }

    /// Paused → Running.
    pub(crate) fn resume(&mut self) -> Result<(), TransitionError> {
        if self.state != TaskState::Paused {
            return Err(self.reject("resume"));
        }
        self.state = TaskState::Running;
        Ok(())
    }

    /// Synchronous cancel from Created, Queued, Scheduled or Paused.
    pub(crate) fn cancel(
        &mut self,
        reason: impl Into<String>,
        now: DateTime<Local>,
    ) -> Result<(), TransitionError> {
        if !self.state.can_cancel() {
            return Err(self.reject("cancel"));
        }
        self.state = TaskState::Cancelled;
        self.scheduled_for = None;
        self.cancellation_reason = Some(reason.into());
        self.completed_at = Some(now);
        Ok(())
    }

    fn ensure_executing(&self, action: &'static str) -> Result<(), TransitionError> {
        if self.state.occupies_slot() {
            Ok(())
        } else {
            Err(self.reject(action))
        }
    }

    /// Running → Completed.
    pub(crate) fn complete(
        &mut self,
        location: String,
        size: u64,
        now: DateTime<Local>,
    ) -> Result<(), TransitionError> {
        self.ensure_executing("complete")?;
        self.state = TaskState::Completed;
        self.result_location = Some(location);
        self.result_size = Some(size);
        self.progress_fraction = 1.0;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Running → Failed.
    pub(crate) fn fail(
        &mut self,
        reason: impl Into<String>,
        detail: impl Into<String>,
        now: DateTime<Local>,
    ) -> Result<(), TransitionError> {
        self.ensure_executing("fail")?;
        self.state = TaskState::Failed;
        self.failure_reason = Some(reason.into());
        self.failure_detail = Some(detail.into());
        self.completed_at = Some(now);
        Ok(())
    }

    /// Running → Cancelled after the runtime honored the cancellation signal.
    pub(crate) fn finish_cancelled(
        &mut self,
        reason: impl Into<String>,
        now: DateTime<Local>,
    ) -> Result<(), TransitionError> {
        self.ensure_executing("finish cancelled")?;
        self.state = TaskState::Cancelled;
        self.cancellation_reason = Some(reason.into());
        self.completed_at = Some(now);
        Ok(())
    }

    /// Record progress. Ignored unless Running or for non-finite fractions.
    pub(crate) fn record_progress(&mut self, stage: &str, fraction: f64) -> bool {
        if self.state != TaskState::Running || !fraction.is_finite() {
            return false;
        }
        self.progress_fraction = fraction.clamp(0.0, 1.0);
        stage.clone_into(&mut self.progress_stage);
        true
    }
}
