//! [`ObjectStore`](narrate_core::ObjectStore) adapters.
//!
//! - [`FsObjectStore`]: files under a local directory, atomic writes
//! - [`MemoryObjectStore`]: process memory, optional simulated read lag
#![deny(unused_crate_dependencies)]

mod fs;
mod memory;

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;
