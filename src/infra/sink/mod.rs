//! Result sink backends.

pub mod file;
pub mod memory;

pub use file::FileResultSink;
pub use memory::{InMemoryResultSink, StoredResult};
