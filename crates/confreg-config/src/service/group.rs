//! Configuration group service
//!
//! Group membership edits are read-modify-write on a single stored record.
//! Two mechanisms keep them from losing updates:
//! - an in-process mutex per group, so local writers queue instead of
//!   spinning on the store
//! - a compare-and-swap on the record revision, so writers in other
//!   processes sharing the same store cannot be overwritten

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use confreg_common::{ConfregError, Result};
use confreg_persistence::KvStore;

use crate::keys::{GROUP_PREFIX, entity_key};
use crate::model::{ConfigurationGroup, LabeledConfiguration, Labels, Versioned, describe};
use crate::service::entity::{EntityRegistry, MAX_CAS_ATTEMPTS, contention};

/// Result of applying an edit to a group snapshot
enum Edit<R> {
    /// The snapshot was changed and must be written back
    Changed(R),
    /// Nothing to write
    Unchanged(R),
}

/// Held while a group is being edited, or while waiting to edit it.
///
/// Drops its map entry once nobody else holds or waits on the same group.
/// The handle exists before the wait starts, so a waiter cancelled mid-wait
/// cleans up as well.
struct GroupLock<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    mutex: Option<Arc<Mutex<()>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for GroupLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.mutex.take();
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Group CRUD plus membership operations
#[derive(Clone)]
pub struct GroupService {
    groups: EntityRegistry<ConfigurationGroup>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl GroupService {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            groups: EntityRegistry::new(store),
            locks: Arc::new(DashMap::new()),
        }
    }

    pub async fn create(&self, group: &ConfigurationGroup) -> Result<()> {
        self.groups.create(group).await
    }

    pub async fn get(&self, name: &str, version: u32) -> Result<ConfigurationGroup> {
        self.groups.get(name, version).await
    }

    pub async fn get_all(&self) -> Result<Vec<ConfigurationGroup>> {
        self.groups.get_all().await
    }

    pub async fn delete(&self, name: &str, version: u32) -> Result<()> {
        let _lock = self.lock_group(name, version).await;
        self.groups.delete(name, version).await
    }

    /// Append a member. Fails with `Conflict` if the group already holds a
    /// member with the same `(name, version)`.
    pub async fn add_config(
        &self,
        group_name: &str,
        group_version: u32,
        member: LabeledConfiguration,
    ) -> Result<()> {
        member.validate()?;

        self.mutate(group_name, group_version, |group| {
            if group.contains_member(&member.name, member.version) {
                return Err(ConfregError::conflict(format!(
                    "{} already holds member '{}/{}'",
                    group.describe(),
                    member.name,
                    member.version
                )));
            }
            group.configuration.push(member.clone());
            Ok(Edit::Changed(()))
        })
        .await?;

        info!(
            group = group_name,
            group_version,
            member = %member.name,
            member_version = member.version,
            "Added member to group"
        );
        Ok(())
    }

    /// Remove the member with the given identity.
    pub async fn remove_config(
        &self,
        group_name: &str,
        group_version: u32,
        member_name: &str,
        member_version: u32,
    ) -> Result<LabeledConfiguration> {
        let removed = self
            .mutate(group_name, group_version, |group| {
                let position = group
                    .configuration
                    .iter()
                    .position(|m| m.same_identity(member_name, member_version))
                    .ok_or_else(|| {
                        ConfregError::not_found(format!(
                            "member '{}/{}' of {}",
                            member_name,
                            member_version,
                            group.describe()
                        ))
                    })?;
                Ok(Edit::Changed(group.configuration.remove(position)))
            })
            .await?;

        info!(
            group = group_name,
            group_version,
            member = member_name,
            member_version,
            "Removed member from group"
        );
        Ok(removed)
    }

    /// Members whose labels exactly equal `filter`. An empty result is not
    /// an error.
    pub async fn get_filtered_configs(
        &self,
        group_name: &str,
        group_version: u32,
        filter: &Labels,
    ) -> Result<Vec<LabeledConfiguration>> {
        Ok(self
            .groups
            .get(group_name, group_version)
            .await?
            .filtered(filter))
    }

    /// Remove every member `get_filtered_configs` would return, keeping the
    /// rest in their original order. Returns how many were removed; zero
    /// matches is a successful no-op.
    pub async fn remove_by_labels(
        &self,
        group_name: &str,
        group_version: u32,
        filter: &Labels,
    ) -> Result<usize> {
        let removed = self
            .mutate(group_name, group_version, |group| {
                let before = group.configuration.len();
                group
                    .configuration
                    .retain(|member| !member.labels.matches_exactly(filter));
                let removed = before - group.configuration.len();

                if removed == 0 {
                    Ok(Edit::Unchanged(0))
                } else {
                    Ok(Edit::Changed(removed))
                }
            })
            .await?;

        info!(
            group = group_name,
            group_version,
            removed,
            "Removed members by labels"
        );
        Ok(removed)
    }

    /// Apply `edit` to the latest snapshot of a group and write it back
    /// conditionally, re-reading on a lost race.
    async fn mutate<R, F>(&self, name: &str, version: u32, mut edit: F) -> Result<R>
    where
        F: FnMut(&mut ConfigurationGroup) -> Result<Edit<R>>,
    {
        let _lock = self.lock_group(name, version).await;

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let (mut group, revision) = self.groups.get_with_revision(name, version).await?;

            match edit(&mut group)? {
                Edit::Unchanged(outcome) => return Ok(outcome),
                Edit::Changed(outcome) => {
                    if self.groups.replace_if_unchanged(&group, revision).await? {
                        return Ok(outcome);
                    }
                }
            }
            debug!(group = name, version, attempt, "Group write lost a race, retrying");
        }

        Err(contention(&describe::<ConfigurationGroup>(name, version)))
    }

    async fn lock_group(&self, name: &str, version: u32) -> GroupLock<'_> {
        let key = entity_key(GROUP_PREFIX, name, version);
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let mut lock = GroupLock {
            locks: &self.locks,
            key,
            mutex: Some(mutex.clone()),
            guard: None,
        };
        lock.guard = Some(mutex.lock_owned().await);
        lock
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.len()
    }
}
