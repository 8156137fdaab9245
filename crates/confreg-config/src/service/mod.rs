//! Registry services
//!
//! - `entity`: CRUD over one versioned entity family
//! - `group`: group CRUD and membership edits
//! - `idempotency`: deduplication of tokenized creates

pub mod entity;
pub mod group;
pub mod idempotency;

use std::sync::Arc;

use confreg_common::Result;
use confreg_persistence::{KvStore, StorageMode};

use crate::model::{Configuration, ConfigurationGroup, LabeledConfiguration};

pub use entity::EntityRegistry;
pub use group::GroupService;
pub use idempotency::{IdempotencyLedger, compute_content_hash};

/// Entry point for every registry operation, shared by all request handlers
#[derive(Clone)]
pub struct ConfigRegistry {
    store: Arc<dyn KvStore>,
    configs: EntityRegistry<Configuration>,
    labeled: EntityRegistry<LabeledConfiguration>,
    groups: GroupService,
    ledger: IdempotencyLedger,
}

impl ConfigRegistry {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            configs: EntityRegistry::new(store.clone()),
            labeled: EntityRegistry::new(store.clone()),
            groups: GroupService::new(store.clone()),
            ledger: IdempotencyLedger::new(store.clone()),
            store,
        }
    }

    pub fn configs(&self) -> &EntityRegistry<Configuration> {
        &self.configs
    }

    pub fn labeled(&self) -> &EntityRegistry<LabeledConfiguration> {
        &self.labeled
    }

    pub fn groups(&self) -> &GroupService {
        &self.groups
    }

    pub fn ledger(&self) -> &IdempotencyLedger {
        &self.ledger
    }

    pub fn storage_mode(&self) -> StorageMode {
        self.store.storage_mode()
    }

    pub async fn health_check(&self) -> anyhow::Result<()> {
        self.store.health_check().await
    }

    pub async fn create_configuration(
        &self,
        config: &Configuration,
        idempotency_key: Option<&str>,
    ) -> Result<()> {
        self.ledger
            .create_once(idempotency_key, config, || self.configs.create(config))
            .await
    }

    pub async fn create_labeled_configuration(
        &self,
        config: &LabeledConfiguration,
        idempotency_key: Option<&str>,
    ) -> Result<()> {
        self.ledger
            .create_once(idempotency_key, config, || self.labeled.create(config))
            .await
    }

    pub async fn create_group(
        &self,
        group: &ConfigurationGroup,
        idempotency_key: Option<&str>,
    ) -> Result<()> {
        self.ledger
            .create_once(idempotency_key, group, || self.groups.create(group))
            .await
    }
}
