//! Tests for error types

use device_task_scheduler::core::{JobError, SchedulerError, SinkError};
use device_task_scheduler::util::serde::JobProfileId;

#[test]
fn test_unknown_profile_error() {
    let err = SchedulerError::UnknownProfile(JobProfileId::new("dump-flash"));
    assert_eq!(format!("{err}"), "unknown job profile: dump-flash");
}

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("max_concurrent_tasks must be greater than 0".into());
    assert_eq!(
        err.to_string(),
        "invalid configuration: max_concurrent_tasks must be greater than 0"
    );
}

#[test]
fn test_job_error_messages() {
    assert_eq!(JobError::Cancelled.to_string(), "operation canceled");
    let failed = JobError::failed("read timeout", "no ack after 3 retries");
    assert_eq!(failed.to_string(), "read timeout");
    assert_eq!(
        failed,
        JobError::Failed {
            reason: "read timeout".into(),
            detail: "no ack after 3 retries".into(),
        }
    );
}

#[test]
fn test_sink_error_from_io() {
    let err: SinkError = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
    assert!(matches!(err, SinkError::Io(_)));
    assert_eq!(err.to_string(), "io error: denied");
}
