//! Generic CRUD over one versioned entity family
//!
//! Uniqueness of `(name, version)` is enforced by create-if-absent on the
//! store, so racing creates for the same pair have exactly one winner.
//! Update and delete are conditioned on the revision that was read, which
//! keeps them from resurrecting or clobbering a concurrently deleted entry.

use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info, warn};

use confreg_common::{ConfregError, Result, validate_identifier};
use confreg_persistence::{KvEntry, KvStore};

use crate::keys::entity_key;
use crate::model::{Versioned, describe};

/// Attempts made by a conditional write before giving up on contention
pub const MAX_CAS_ATTEMPTS: usize = 16;

/// CRUD operations for one entity family
pub struct EntityRegistry<T> {
    store: Arc<dyn KvStore>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Versioned> EntityRegistry<T> {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    fn key(name: &str, version: u32) -> String {
        entity_key(T::KEY_PREFIX, name, version)
    }

    fn encode(entity: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(entity)
            .with_context(|| format!("failed to encode {}", entity.describe()))
            .map_err(ConfregError::from)
    }

    fn decode(entry: &KvEntry) -> Result<T> {
        serde_json::from_slice(&entry.value)
            .with_context(|| format!("stored value at '{}' is not a valid {}", entry.key, T::KIND))
            .map_err(ConfregError::from)
    }

    pub async fn create(&self, entity: &T) -> Result<()> {
        entity.validate()?;
        let key = Self::key(entity.name(), entity.version());

        if !self.store.put_if_absent(&key, Self::encode(entity)?).await? {
            return Err(ConfregError::already_exists(entity.describe()));
        }

        info!(
            kind = T::KIND,
            name = entity.name(),
            version = entity.version(),
            "Created entity"
        );
        Ok(())
    }

    pub async fn get(&self, name: &str, version: u32) -> Result<T> {
        self.get_with_revision(name, version)
            .await
            .map(|(entity, _)| entity)
    }

    /// Read an entity together with the revision needed for a conditional write
    pub async fn get_with_revision(&self, name: &str, version: u32) -> Result<(T, u64)> {
        validate_identifier("name", name)?;
        let entry = self
            .store
            .get(&Self::key(name, version))
            .await?
            .ok_or_else(|| ConfregError::not_found(describe::<T>(name, version)))?;

        Ok((Self::decode(&entry)?, entry.revision))
    }

    /// Replace the stored value only if it is still at `revision`
    pub async fn replace_if_unchanged(&self, entity: &T, revision: u64) -> Result<bool> {
        let key = Self::key(entity.name(), entity.version());
        Ok(self
            .store
            .compare_and_swap(&key, Self::encode(entity)?, revision)
            .await?)
    }

    pub async fn update(&self, entity: &T) -> Result<()> {
        entity.validate()?;

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let (_, revision) = self
                .get_with_revision(entity.name(), entity.version())
                .await?;

            if self.replace_if_unchanged(entity, revision).await? {
                info!(
                    kind = T::KIND,
                    name = entity.name(),
                    version = entity.version(),
                    "Updated entity"
                );
                return Ok(());
            }
            debug!(kind = T::KIND, name = entity.name(), attempt, "Update lost a race, retrying");
        }

        Err(contention(&entity.describe()))
    }

    pub async fn delete(&self, name: &str, version: u32) -> Result<()> {
        validate_identifier("name", name)?;
        let key = Self::key(name, version);

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let entry = self
                .store
                .get(&key)
                .await?
                .ok_or_else(|| ConfregError::not_found(describe::<T>(name, version)))?;

            if self.store.compare_and_delete(&key, entry.revision).await? {
                info!(kind = T::KIND, name, version, "Deleted entity");
                return Ok(());
            }
            debug!(kind = T::KIND, name, attempt, "Delete lost a race, retrying");
        }

        Err(contention(&describe::<T>(name, version)))
    }

    /// Every stored entity of this family, in key order.
    ///
    /// A record that cannot be decoded fails the whole listing with a
    /// storage fault rather than returning a partial result.
    pub async fn get_all(&self) -> Result<Vec<T>> {
        let entries = self.store.list_by_prefix(T::KEY_PREFIX).await?;

        entries
            .iter()
            .map(|entry| {
                Self::decode(entry).inspect_err(|e| {
                    warn!(key = %entry.key, error = %e, "Undecodable entry in listing")
                })
            })
            .collect()
    }
}

pub(crate) fn contention(what: &str) -> ConfregError {
    ConfregError::StorageFault(anyhow::anyhow!(
        "gave up writing {} after {} conflicting attempts",
        what,
        MAX_CAS_ATTEMPTS
    ))
}

#[cfg(test)]
mod tests {
    use confreg_persistence::MemoryKvStore;

    use super::*;
    use crate::model::{Configuration, LabeledConfiguration, Labels, Parameters};

    fn registry() -> EntityRegistry<Configuration> {
        EntityRegistry::new(Arc::new(MemoryKvStore::new()))
    }

    fn config(name: &str, version: u32, value: &str) -> Configuration {
        let mut parameters = Parameters::new();
        parameters.insert("key".to_string(), value.to_string());
        Configuration::new(name, version, parameters)
    }

    #[tokio::test]
    async fn test_create_then_get_roundtrip() {
        let registry = registry();
        let created = config("db", 1, "a");
        registry.create(&created).await.unwrap();

        assert_eq!(registry.get("db", 1).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_create_twice_already_exists() {
        let registry = registry();
        registry.create(&config("db", 1, "a")).await.unwrap();

        let err = registry.create(&config("db", 1, "b")).await.unwrap_err();
        assert!(matches!(err, ConfregError::AlreadyExists(_)));
        assert_eq!(registry.get("db", 1).await.unwrap(), config("db", 1, "a"));

        // Another version of the same name is a distinct entity
        registry.create(&config("db", 2, "b")).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_missing_not_found() {
        let err = registry().get("db", 1).await.unwrap_err();
        assert!(matches!(err, ConfregError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_then_get() {
        let registry = registry();
        registry.create(&config("db", 1, "a")).await.unwrap();
        registry.update(&config("db", 1, "b")).await.unwrap();

        assert_eq!(registry.get("db", 1).await.unwrap(), config("db", 1, "b"));
    }

    #[tokio::test]
    async fn test_update_missing_not_found() {
        let registry = registry();
        let err = registry.update(&config("db", 1, "a")).await.unwrap_err();
        assert!(matches!(err, ConfregError::NotFound(_)));
        // Update must not create
        assert!(registry.get("db", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_delete() {
        let registry = registry();
        registry.create(&config("db", 1, "a")).await.unwrap();
        registry.delete("db", 1).await.unwrap();

        assert!(matches!(
            registry.get("db", 1).await,
            Err(ConfregError::NotFound(_))
        ));
        assert!(matches!(
            registry.delete("db", 1).await,
            Err(ConfregError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_get_all_only_sees_own_family() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let plain = EntityRegistry::<Configuration>::new(store.clone());
        let labeled = EntityRegistry::<LabeledConfiguration>::new(store);

        plain.create(&config("a", 1, "x")).await.unwrap();
        plain.create(&config("b", 1, "y")).await.unwrap();
        labeled
            .create(&LabeledConfiguration::new(
                "a",
                1,
                Parameters::new(),
                Labels::new(),
            ))
            .await
            .unwrap();

        assert_eq!(plain.get_all().await.unwrap().len(), 2);
        assert_eq!(labeled.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_all_fails_on_corrupt_entry() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let registry = EntityRegistry::<Configuration>::new(store.clone());
        registry.create(&config("a", 1, "x")).await.unwrap();
        store
            .put("plainConfigs/broken/1", b"not json".to_vec())
            .await
            .unwrap();

        let err = registry.get_all().await.unwrap_err();
        assert!(matches!(err, ConfregError::StorageFault(_)));
        assert!(err.to_string().contains("plainConfigs/broken/1"));
    }

    #[tokio::test]
    async fn test_invalid_name_rejected_before_storage() {
        let store = Arc::new(MemoryKvStore::new());
        let registry = EntityRegistry::<Configuration>::new(store.clone());

        let err = registry.create(&config("a/b", 1, "x")).await.unwrap_err();
        assert!(matches!(err, ConfregError::ValidationError(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_returned_value_is_a_copy() {
        let registry = registry();
        registry.create(&config("db", 1, "a")).await.unwrap();

        let mut fetched = registry.get("db", 1).await.unwrap();
        fetched.parameters.insert("key".to_string(), "mutated".to_string());

        assert_eq!(registry.get("db", 1).await.unwrap(), config("db", 1, "a"));
    }
}
