//! Key-value storage trait
//!
//! The registry is written against this minimal contract: single-key reads
//! and writes, prefix listing, and compare-and-swap on the key revision.
//! There are no multi-key transactions.

use async_trait::async_trait;

use crate::model::{ABSENT_REVISION, KvEntry, StorageMode};

/// Key-value storage operations
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get the current storage mode
    fn storage_mode(&self) -> StorageMode;

    /// Read a single key
    async fn get(&self, key: &str) -> anyhow::Result<Option<KvEntry>>;

    /// Unconditionally write a key
    async fn put(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()>;

    /// Write only if the key's revision equals `expected_revision`.
    ///
    /// `ABSENT_REVISION` matches a key that does not exist. Returns `false`
    /// when the precondition does not hold; the store is left untouched.
    async fn compare_and_swap(
        &self,
        key: &str,
        value: Vec<u8>,
        expected_revision: u64,
    ) -> anyhow::Result<bool>;

    /// Create a key only if it is absent
    async fn put_if_absent(&self, key: &str, value: Vec<u8>) -> anyhow::Result<bool> {
        self.compare_and_swap(key, value, ABSENT_REVISION).await
    }

    /// Unconditionally delete a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Delete only if the key exists with exactly `expected_revision`
    async fn compare_and_delete(&self, key: &str, expected_revision: u64)
    -> anyhow::Result<bool>;

    /// List every entry whose key starts with `prefix`
    async fn list_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<KvEntry>>;

    /// Health check for the storage backend
    async fn health_check(&self) -> anyhow::Result<()>;
}
