//! Confreg Persistence - Key-value storage backends
//!
//! This crate provides:
//! - The `KvStore` trait the registry is written against
//! - An in-memory backend for standalone use and tests
//! - A Consul KV backend for shared, durable storage

pub mod consul;
pub mod memory;
pub mod model;
pub mod traits;

use std::sync::Arc;

pub use consul::{ConsulConfig, ConsulKvStore};
pub use memory::MemoryKvStore;
pub use model::{ABSENT_REVISION, KvEntry, StorageMode};
pub use traits::KvStore;

/// Build the storage backend selected by `mode`.
pub fn create_store(
    mode: StorageMode,
    consul: ConsulConfig,
) -> anyhow::Result<Arc<dyn KvStore>> {
    let store: Arc<dyn KvStore> = match mode {
        StorageMode::Memory => Arc::new(MemoryKvStore::new()),
        StorageMode::Consul => {
            tracing::info!(address = %consul.address, "Using Consul KV storage");
            Arc::new(ConsulKvStore::new(consul)?)
        }
    };
    Ok(store)
}
