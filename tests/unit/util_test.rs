//! Tests for utility types

use std::time::Duration;

use chrono::{Local, TimeDelta};
use device_task_scheduler::util::{
    elapsed_between, to_delta, Clock, JobProfileId, ManualClock, Priority, TaskId,
};

#[test]
fn test_priority_ordering() {
    assert!(Priority::Critical > Priority::High);
    assert!(Priority::High > Priority::Normal);
    assert!(Priority::Normal > Priority::Low);
    assert_eq!(Priority::default(), Priority::Normal);
}

#[test]
fn test_priority_serde_names() {
    assert_eq!(serde_json::to_string(&Priority::Critical).unwrap(), "\"critical\"");
    let parsed: Priority = serde_json::from_str("\"low\"").unwrap();
    assert_eq!(parsed, Priority::Low);
}

#[test]
fn test_task_ids_are_unique() {
    let a = TaskId::new();
    let b = TaskId::new();
    assert_ne!(a, b);
    assert_eq!(a.to_string(), a.as_uuid().to_string());
}

#[test]
fn test_job_profile_id_display() {
    let id = JobProfileId::from("calibrate");
    assert_eq!(id.as_str(), "calibrate");
    assert_eq!(id.to_string(), "calibrate");
}

#[test]
fn test_manual_clock() {
    let start = Local::now();
    let clock = ManualClock::new(start);
    clock.advance(Duration::from_secs(90));
    assert_eq!(clock.now(), start + TimeDelta::seconds(90));
    assert_eq!(elapsed_between(start, clock.now()), Duration::from_secs(90));
    assert_eq!(elapsed_between(clock.now(), start), Duration::ZERO);
}

#[test]
fn test_to_delta_saturates() {
    assert_eq!(to_delta(Duration::from_secs(5)), TimeDelta::seconds(5));
    assert_eq!(to_delta(Duration::MAX), TimeDelta::MAX);
}

#[test]
fn test_init_tracing_is_idempotent() {
    device_task_scheduler::util::init_tracing();
    assert!(!device_task_scheduler::util::init_tracing_with("debug"));
}
