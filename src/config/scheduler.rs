//! Scheduler configuration structure.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::AppResult;

/// Tunables for admission, retention, statistics and notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Concurrency ceiling for Running (and Paused) tasks.
    pub max_concurrent_tasks: usize,
    /// Admission loop period in milliseconds.
    pub admission_interval_ms: u64,
    /// Retention sweep period in seconds.
    pub retention_interval_secs: u64,
    /// Age after which terminal tasks are evicted, in seconds.
    pub retention_window_secs: u64,
    /// Number of execution durations kept for the rolling average.
    pub statistics_window: usize,
    /// Events buffered per subscriber before it starts lagging.
    pub event_capacity: usize,
    /// Number of recent transitions kept in the transition log.
    pub transition_log_capacity: usize,
    /// Assumed wait per queued task ahead, in seconds, for start-time estimates.
    pub queue_estimate_step_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 4,
            admission_interval_ms: 1_000,
            retention_interval_secs: 300,
            retention_window_secs: 24 * 60 * 60,
            statistics_window: 100,
            event_capacity: 1_024,
            transition_log_capacity: 512,
            queue_estimate_step_secs: 300,
        }
    }
}

impl SchedulerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_tasks == 0 {
            return Err("max_concurrent_tasks must be greater than 0".into());
        }
        if self.admission_interval_ms == 0 {
            return Err("admission_interval_ms must be greater than 0".into());
        }
        if self.retention_interval_secs == 0 {
            return Err("retention_interval_secs must be greater than 0".into());
        }
        if self.statistics_window == 0 {
            return Err("statistics_window must be greater than 0".into());
        }
        if self.event_capacity == 0 {
            return Err("event_capacity must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from defaults overridden by `SCHEDULER_*` variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();
        override_from_env("SCHEDULER_MAX_CONCURRENT_TASKS", &mut cfg.max_concurrent_tasks)?;
        override_from_env("SCHEDULER_ADMISSION_INTERVAL_MS", &mut cfg.admission_interval_ms)?;
        override_from_env("SCHEDULER_RETENTION_INTERVAL_SECS", &mut cfg.retention_interval_secs)?;
        override_from_env("SCHEDULER_RETENTION_WINDOW_SECS", &mut cfg.retention_window_secs)?;
        override_from_env("SCHEDULER_STATISTICS_WINDOW", &mut cfg.statistics_window)?;
        override_from_env("SCHEDULER_EVENT_CAPACITY", &mut cfg.event_capacity)?;
        override_from_env("SCHEDULER_TRANSITION_LOG_CAPACITY", &mut cfg.transition_log_capacity)?;
        override_from_env("SCHEDULER_QUEUE_ESTIMATE_STEP_SECS", &mut cfg.queue_estimate_step_secs)?;
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }

    /// Admission loop period.
    #[must_use]
    pub const fn admission_interval(&self) -> Duration {
        Duration::from_millis(self.admission_interval_ms)
    }

    /// Retention sweep period.
    #[must_use]
    pub const fn retention_interval(&self) -> Duration {
        Duration::from_secs(self.retention_interval_secs)
    }

    /// Age after which terminal tasks are evicted.
    #[must_use]
    pub const fn retention_window(&self) -> Duration {
        Duration::from_secs(self.retention_window_secs)
    }

    /// Assumed wait per queued task ahead.
    #[must_use]
    pub const fn queue_estimate_step(&self) -> Duration {
        Duration::from_secs(self.queue_estimate_step_secs)
    }
}

fn override_from_env<T>(name: &str, slot: &mut T) -> AppResult<()>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => {
            *slot = raw
                .trim()
                .parse()
                .with_context(|| format!("{name} has invalid value `{raw}`"))?;
            Ok(())
        }
        Err(std::env::VarError::NotPresent) => Ok(()),
        Err(err) => Err(err).with_context(|| format!("{name} is not valid unicode")),
    }
}
