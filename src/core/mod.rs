//! Core scheduling engine: task lifecycle, resource locking, admission,
//! execution and bookkeeping.

pub mod admission;
pub mod error;
pub mod estimate;
pub mod events;
pub mod executor;
pub mod pipeline;
pub mod resource;
mod retention;
pub mod scheduler;
pub mod stats;
pub mod task;

pub use admission::AdmissionReport;
pub use error::{AppResult, JobError, SchedulerError, SinkError, TransitionError};
pub use estimate::estimate_start_time;
pub use events::{EventBus, SchedulerEvent, TransitionLog, TransitionRecord};
pub use executor::{JobCatalog, JobProfile, JobRuntime, ResultSink, Spawn};
pub use pipeline::ProgressReporter;
pub use resource::{ResourceCoordinator, ResourceKey};
pub use scheduler::TaskScheduler;
pub use stats::SchedulerStatistics;
pub use task::{ScheduleOutcome, TaskExecution, TaskState};
