//! In-memory storage backend
//!
//! Keeps every key in a `DashMap` with a process-wide, monotonically
//! increasing revision counter. Per-key atomicity comes from the map's
//! entry locking, so compare-and-swap never races with another writer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::model::{ABSENT_REVISION, KvEntry, StorageMode};
use crate::traits::KvStore;

/// Stored value with metadata
#[derive(Debug, Clone)]
struct StoredValue {
    value: Vec<u8>,
    revision: u64,
}

/// In-memory key-value store
#[derive(Clone)]
pub struct MemoryKvStore {
    store: Arc<DashMap<String, StoredValue>>,
    /// Next revision to hand out; starts above `ABSENT_REVISION`
    index: Arc<AtomicU64>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            index: Arc::new(AtomicU64::new(ABSENT_REVISION + 1)),
        }
    }

    fn next_index(&self) -> u64 {
        self.index.fetch_add(1, Ordering::SeqCst)
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    fn storage_mode(&self) -> StorageMode {
        StorageMode::Memory
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<KvEntry>> {
        Ok(self.store.get(key).map(|stored| KvEntry {
            key: key.to_string(),
            value: stored.value.clone(),
            revision: stored.revision,
        }))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()> {
        let revision = self.next_index();
        self.store
            .insert(key.to_string(), StoredValue { value, revision });
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        value: Vec<u8>,
        expected_revision: u64,
    ) -> anyhow::Result<bool> {
        match self.store.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if expected_revision == ABSENT_REVISION
                    || occupied.get().revision != expected_revision
                {
                    return Ok(false);
                }
                let revision = self.next_index();
                occupied.insert(StoredValue { value, revision });
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                if expected_revision != ABSENT_REVISION {
                    return Ok(false);
                }
                let revision = self.next_index();
                vacant.insert(StoredValue { value, revision });
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.store.remove(key);
        Ok(())
    }

    async fn compare_and_delete(
        &self,
        key: &str,
        expected_revision: u64,
    ) -> anyhow::Result<bool> {
        Ok(self
            .store
            .remove_if(key, |_, stored| stored.revision == expected_revision)
            .is_some())
    }

    async fn list_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<KvEntry>> {
        let mut entries: Vec<KvEntry> = self
            .store
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| KvEntry {
                key: entry.key().clone(),
                value: entry.value().value.clone(),
                revision: entry.value().revision,
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryKvStore::new();
        store.put("configs/db/1", b"a".to_vec()).await.unwrap();

        let entry = store.get("configs/db/1").await.unwrap().unwrap();
        assert_eq!(entry.key, "configs/db/1");
        assert_eq!(entry.value, b"a".to_vec());
        assert!(entry.revision > ABSENT_REVISION);

        assert!(store.get("configs/db/2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_bumps_revision() {
        let store = MemoryKvStore::new();
        store.put("k", b"1".to_vec()).await.unwrap();
        let first = store.get("k").await.unwrap().unwrap().revision;
        store.put("k", b"2".to_vec()).await.unwrap();
        let second = store.get("k").await.unwrap().unwrap().revision;
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_put_if_absent() {
        let store = MemoryKvStore::new();
        assert!(store.put_if_absent("k", b"1".to_vec()).await.unwrap());
        assert!(!store.put_if_absent("k", b"2".to_vec()).await.unwrap());

        let entry = store.get("k").await.unwrap().unwrap();
        assert_eq!(entry.value, b"1".to_vec());
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = MemoryKvStore::new();
        store.put("k", b"1".to_vec()).await.unwrap();
        let revision = store.get("k").await.unwrap().unwrap().revision;

        assert!(!store
            .compare_and_swap("k", b"x".to_vec(), revision + 100)
            .await
            .unwrap());
        assert!(store
            .compare_and_swap("k", b"2".to_vec(), revision)
            .await
            .unwrap());
        // The old revision is stale now
        assert!(!store
            .compare_and_swap("k", b"3".to_vec(), revision)
            .await
            .unwrap());
        assert_eq!(store.get("k").await.unwrap().unwrap().value, b"2".to_vec());

        // Non-zero revision never matches an absent key
        assert!(!store
            .compare_and_swap("missing", b"x".to_vec(), revision)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_compare_and_delete() {
        let store = MemoryKvStore::new();
        store.put("k", b"1".to_vec()).await.unwrap();
        let revision = store.get("k").await.unwrap().unwrap().revision;

        assert!(!store.compare_and_delete("k", revision + 1).await.unwrap());
        assert!(store.compare_and_delete("k", revision).await.unwrap());
        assert!(!store.compare_and_delete("k", revision).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let store = MemoryKvStore::new();
        store.put("configs/b/1", b"b".to_vec()).await.unwrap();
        store.put("configs/a/1", b"a".to_vec()).await.unwrap();
        store.put("configGroups/a/1", b"g".to_vec()).await.unwrap();

        let entries = store.list_by_prefix("configs/").await.unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["configs/a/1", "configs/b/1"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_put_if_absent_single_winner() {
        let store = MemoryKvStore::new();
        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .put_if_absent("race", format!("{}", i).into_bytes())
                        .await
                        .unwrap()
                })
            })
            .collect();

        let results = futures::future::join_all(tasks).await;
        let winners = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();
        assert_eq!(winners, 1);
    }
}
