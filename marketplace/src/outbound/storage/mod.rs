//! Key-value store adapters.
//!
//! - [`InMemoryStore`]: process-local map, used by tests and ephemeral runs.
//! - [`FileStore`]: one JSON document inside a capability-scoped directory.

mod atomic_io;
mod file;
mod memory;

pub use file::FileStore;
pub use memory::InMemoryStore;
