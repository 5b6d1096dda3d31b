//! Tests for builder modules

use std::sync::Arc;

use async_trait::async_trait;
use device_task_scheduler::prelude::*;
use tokio_util::sync::CancellationToken;

struct NoopRuntime;

#[async_trait]
impl JobRuntime for NoopRuntime {
    async fn run(
        &self,
        _profile: &JobProfile,
        _cancel: CancellationToken,
        _progress: ProgressReporter,
    ) -> Result<Vec<u8>, JobError> {
        Ok(Vec::new())
    }
}

fn build(config: &SchedulerConfig) -> Result<TaskScheduler<TokioSpawner>, SchedulerError> {
    build_scheduler(
        config,
        Arc::new(InMemoryJobCatalog::new()),
        Arc::new(NoopRuntime),
        Arc::new(InMemoryResultSink::new()),
        TokioSpawner::current()?,
    )
}

#[tokio::test]
async fn test_build_scheduler_from_config() {
    let config = SchedulerConfig {
        max_concurrent_tasks: 6,
        ..SchedulerConfig::default()
    };
    let scheduler = build(&config).unwrap();
    assert_eq!(scheduler.max_concurrent_tasks(), 6);
    assert!(!scheduler.is_running());
    assert!(scheduler.get_all().is_empty());
}

#[tokio::test]
async fn test_build_scheduler_rejects_invalid_config() {
    let config = SchedulerConfig {
        statistics_window: 0,
        ..SchedulerConfig::default()
    };
    let err = build(&config).err().unwrap();
    assert!(matches!(err, SchedulerError::InvalidConfig(_)));
}
