//! Build a scheduler from configuration and its collaborators.

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::core::{JobCatalog, JobRuntime, ResultSink, SchedulerError, Spawn, TaskScheduler};
use crate::util::clock::{Clock, SystemClock};

/// Build a scheduler reading wall-clock time.
pub fn build_scheduler<S>(
    cfg: &SchedulerConfig,
    catalog: Arc<dyn JobCatalog>,
    runtime: Arc<dyn JobRuntime>,
    sink: Arc<dyn ResultSink>,
    spawner: S,
) -> Result<TaskScheduler<S>, SchedulerError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    build_scheduler_with_clock(cfg, catalog, runtime, sink, spawner, Arc::new(SystemClock))
}

/// Build a scheduler that reads time from `clock`.
pub fn build_scheduler_with_clock<S>(
    cfg: &SchedulerConfig,
    catalog: Arc<dyn JobCatalog>,
    runtime: Arc<dyn JobRuntime>,
    sink: Arc<dyn ResultSink>,
    spawner: S,
    clock: Arc<dyn Clock>,
) -> Result<TaskScheduler<S>, SchedulerError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    cfg.validate()
        .map_err(|e| SchedulerError::InvalidConfig(format!("config invalid: {e}")))?;
    let scheduler =
        TaskScheduler::new_with_clock(cfg.clone(), catalog, runtime, sink, spawner, clock)?;
    tracing::debug!(
        max_concurrent_tasks = cfg.max_concurrent_tasks,
        admission_interval_ms = cfg.admission_interval_ms,
        "scheduler built"
    );
    Ok(scheduler)
}
