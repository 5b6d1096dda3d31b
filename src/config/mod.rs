//! Configuration models for the scheduling engine.

pub mod scheduler;

pub use scheduler::SchedulerConfig;
