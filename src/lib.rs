//! # Device Task Scheduler
//!
//! A resource-aware task scheduling engine for long-running device jobs such
//! as memory dumps, flash reads and calibration runs.
//!
//! Jobs are described by profiles in a [`core::JobCatalog`]. Each submission
//! becomes a [`core::TaskExecution`] that moves through a small state machine:
//!
//! ```text
//! Created ─► Queued ─► Running ─► Completed | Failed | Cancelled
//!    │         ▲  ▲       │ ▲
//!    └► Scheduled ┘       ▼ │
//!                       Paused
//! ```
//!
//! ## Key Features
//!
//! - **Exclusive resources**: a task locks every resource key its profile names,
//!   all-or-nothing, before it runs. Two tasks sharing a key never overlap.
//! - **Priority admission**: a periodic admission cycle drains the ready queue in
//!   priority order (FIFO within a priority) up to a concurrency ceiling.
//! - **Deferred start**: tasks can be scheduled for a later time and are promoted
//!   once due.
//! - **Cooperative cancellation**: running jobs receive a `CancellationToken`.
//! - **Notifications**: every state change and progress report is broadcast to
//!   subscribers.
//! - **Retention and statistics**: old terminal tasks are evicted periodically;
//!   outcome counters and a rolling average duration are kept.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use device_task_scheduler::prelude::*;
//!
//! let catalog = Arc::new(InMemoryJobCatalog::new());
//! catalog.insert(JobProfile {
//!     id: JobProfileId::new("dump-flash"),
//!     name: "Dump flash".into(),
//!     output_path: "dumps".into(),
//!     resources: [ResourceKey::from("uart0")].into_iter().collect(),
//!     parameters: serde_json::json!({ "base": "0x0800_0000", "len": 1_048_576 }),
//! });
//!
//! let scheduler = build_scheduler(
//!     &SchedulerConfig::from_env()?,
//!     catalog,
//!     Arc::new(MyDeviceRuntime::connect()?),
//!     Arc::new(FileResultSink::new("/var/lib/device-jobs")),
//!     TokioSpawner::current()?,
//! )?;
//! scheduler.start();
//!
//! let mut events = scheduler.subscribe();
//! let id = scheduler.create_task(&JobProfileId::new("dump-flash"), Priority::High)?;
//! scheduler.enqueue(id);
//!
//! while let Ok(event) = events.recv().await {
//!     if let SchedulerEvent::StateChanged(task) = event {
//!         if task.task_id == id && task.is_terminal() {
//!             break;
//!         }
//!     }
//! }
//! scheduler.stop(true).await;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling engine and collaborator contracts.
pub mod core;
/// Configuration models.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// In-process adapters for queues, catalogs and result sinks.
pub mod infra;
/// Runtime adapters.
pub mod runtime;
/// Shared utilities: identifiers, clocks and tracing setup.
pub mod util;

/// Commonly used types, re-exported for `use device_task_scheduler::prelude::*`.
pub mod prelude {
    pub use crate::builders::{build_scheduler, build_scheduler_with_clock};
    pub use crate::config::SchedulerConfig;
    pub use crate::core::{
        AdmissionReport, JobCatalog, JobError, JobProfile, JobRuntime, ProgressReporter,
        ResourceKey, ResultSink, SchedulerError, SchedulerEvent, SchedulerStatistics, SinkError,
        Spawn, TaskExecution, TaskScheduler, TaskState,
    };
    pub use crate::infra::catalog::InMemoryJobCatalog;
    pub use crate::infra::sink::{FileResultSink, InMemoryResultSink};
    pub use crate::runtime::TokioSpawner;
    pub use crate::util::clock::{Clock, ManualClock, SystemClock};
    pub use crate::util::serde::{JobProfileId, Priority, TaskId};
}
