//! Tests for configuration validation and loading

use std::time::Duration;

use device_task_scheduler::config::SchedulerConfig;

#[test]
fn test_default_config_is_valid() {
    let config = SchedulerConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.max_concurrent_tasks, 4);
    assert_eq!(config.admission_interval(), Duration::from_secs(1));
    assert_eq!(config.retention_window(), Duration::from_secs(24 * 60 * 60));
    assert_eq!(config.queue_estimate_step(), Duration::from_secs(300));
}

#[test]
fn test_zero_values_rejected() {
    let zero_ceiling = SchedulerConfig {
        max_concurrent_tasks: 0,
        ..SchedulerConfig::default()
    };
    assert!(zero_ceiling.validate().is_err());

    let zero_interval = SchedulerConfig {
        admission_interval_ms: 0,
        ..SchedulerConfig::default()
    };
    assert!(zero_interval.validate().is_err());

    let zero_capacity = SchedulerConfig {
        event_capacity: 0,
        ..SchedulerConfig::default()
    };
    assert!(zero_capacity.validate().is_err());
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{
        "max_concurrent_tasks": 2,
        "retention_window_secs": 3600
    }"#;

    let config = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(config.max_concurrent_tasks, 2);
    assert_eq!(config.retention_window(), Duration::from_secs(3600));
    assert_eq!(config.admission_interval_ms, 1_000);
}

#[test]
fn test_scheduler_config_from_json_rejects_invalid() {
    assert!(SchedulerConfig::from_json_str(r#"{ "max_concurrent_tasks": 0 }"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").is_err());
}

#[test]
fn test_scheduler_config_from_env_overrides() {
    std::env::set_var("SCHEDULER_MAX_CONCURRENT_TASKS", "7");
    std::env::set_var("SCHEDULER_RETENTION_WINDOW_SECS", " 120 ");
    let config = SchedulerConfig::from_env().unwrap();
    assert_eq!(config.max_concurrent_tasks, 7);
    assert_eq!(config.retention_window_secs, 120);

    std::env::set_var("SCHEDULER_MAX_CONCURRENT_TASKS", "many");
    let err = SchedulerConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("SCHEDULER_MAX_CONCURRENT_TASKS"));

    std::env::set_var("SCHEDULER_MAX_CONCURRENT_TASKS", "0");
    assert!(SchedulerConfig::from_env().is_err());

    std::env::remove_var("SCHEDULER_MAX_CONCURRENT_TASKS");
    std::env::remove_var("SCHEDULER_RETENTION_WINDOW_SECS");
}
