//! Contracts for the collaborators the scheduler drives.
//!
//! The scheduler never performs device work itself. It resolves profiles
//! through a [`JobCatalog`], runs them through a [`JobRuntime`], writes the
//! payload through a [`ResultSink`], and spawns execution units through a
//! [`Spawn`] implementation.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::error::{JobError, SinkError};
use crate::core::pipeline::ProgressReporter;
use crate::core::resource::ResourceKey;
use crate::core::task::TaskExecution;
use crate::util::serde::JobProfileId;

/// Executable configuration of a job, as resolved by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProfile {
    /// Catalog identifier.
    pub id: JobProfileId,
    /// Display name.
    pub name: String,
    /// Directory or prefix the result is written under.
    pub output_path: PathBuf,
    /// Exclusive resources the job needs while running.
    pub resources: BTreeSet<ResourceKey>,
    /// Runtime-specific parameters (address ranges, baud rates, ...).
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// Resolves job profile identifiers to executable configuration.
pub trait JobCatalog: Send + Sync {
    /// Look up a profile.
    fn resolve(&self, id: &JobProfileId) -> Option<JobProfile>;

    /// Whether the profile may run right now.
    fn is_eligible(&self, id: &JobProfileId) -> bool;
}

/// Performs the long-running device operation for a job.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use device_task_scheduler::core::{JobError, JobProfile, JobRuntime, ProgressReporter};
/// use tokio_util::sync::CancellationToken;
///
/// struct MemoryDump;
///
/// #[async_trait]
/// impl JobRuntime for MemoryDump {
///     async fn run(
///         &self,
///         profile: &JobProfile,
///         cancel: CancellationToken,
///         progress: ProgressReporter,
///     ) -> Result<Vec<u8>, JobError> {
///         let mut image = Vec::new();
///         for page in 0..64u8 {
///             if cancel.is_cancelled() {
///                 return Err(JobError::Cancelled);
///             }
///             image.push(page);
///             progress.report("reading", f64::from(page + 1) / 64.0);
///         }
///         Ok(image)
///     }
/// }
/// ```
#[async_trait]
pub trait JobRuntime: Send + Sync {
    /// Run the job to completion.
    ///
    /// Implementations should observe `cancel` and return
    /// [`JobError::Cancelled`] once they stop because of it.
    async fn run(
        &self,
        profile: &JobProfile,
        cancel: CancellationToken,
        progress: ProgressReporter,
    ) -> Result<Vec<u8>, JobError>;
}

/// Destination for a job's result payload.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persist the payload and return where it was stored.
    async fn persist(
        &self,
        profile: &JobProfile,
        task: &TaskExecution,
        payload: &[u8],
    ) -> Result<String, SinkError>;
}

/// Abstraction for spawning task execution on a runtime.
pub trait Spawn {
    /// Spawn a future that runs to completion independently of the caller.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
