//! Ready-queue backends.

pub mod memory;

pub use memory::{InMemoryReadyQueue, QueueEntry};
