//! Error types for scheduler operations.

use thiserror::Error;

use crate::core::task::TaskState;
use crate::util::serde::{JobProfileId, TaskId};

/// Errors produced by scheduler components.
///
/// Rejected state transitions are not errors at the public surface; they are
/// reported as `false`/`None` by the control calls.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The job catalog has no entry for the profile.
    #[error("unknown job profile: {0}")]
    UnknownProfile(JobProfileId),
    /// The job catalog reports the profile as not currently runnable.
    #[error("job profile not eligible: {0}")]
    ProfileNotEligible(JobProfileId),
    /// Configuration value out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Outcome reported by a job runtime that did not produce a payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    /// The runtime observed the cancellation signal and stopped.
    #[error("operation canceled")]
    Cancelled,
    /// The job failed.
    #[error("{reason}")]
    Failed {
        /// Short, user-facing reason.
        reason: String,
        /// Detailed diagnostic text.
        detail: String,
    },
}

impl JobError {
    /// Build a failure from a reason and diagnostic detail.
    pub fn failed(reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
            detail: detail.into(),
        }
    }
}

/// A state-machine move that is not permitted from the task's current state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("task {task_id}: cannot {action} from {from:?}")]
pub struct TransitionError {
    /// Task the transition was attempted on.
    pub task_id: TaskId,
    /// State the task was in.
    pub from: TaskState,
    /// Name of the rejected action.
    pub action: &'static str,
}

/// Failure to persist a job's result payload.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The sink refused the payload.
    #[error("sink rejected payload: {0}")]
    Rejected(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
