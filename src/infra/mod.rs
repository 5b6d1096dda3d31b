//! In-process adapters for the scheduler's collaborator contracts.

pub mod catalog;
pub mod queue;
pub mod sink;
