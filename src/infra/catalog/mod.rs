//! Job catalog backends.

pub mod memory;

pub use memory::InMemoryJobCatalog;
