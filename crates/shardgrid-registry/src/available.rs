//! Available-shard registry: durable catalog of every shard that has
//! been created for an entity type and its allocation state.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;
use serde_json::json;
use tracing::debug;

use shardgrid_backend::{
    BackendError, BatchGetRequest, GetItemRequest, ItemKey, PutItemRequest, QueryRequest,
    StorageGateway, UpdateItemRequest,
};

use crate::error::{RegistryError, RegistryResult};
use crate::types::{
    AllocationState, RegistryTables, ShardEntry, ShardListRequest, columns, epoch_millis,
};

/// Registry over the available-shard table.
///
/// `Clone` is cheap; all clones share the same gateway.
pub struct AvailableShardRegistry<S> {
    store: Arc<S>,
    tables: RegistryTables,
}

impl<S> Clone for AvailableShardRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            tables: self.tables.clone(),
        }
    }
}

impl<S: StorageGateway> AvailableShardRegistry<S> {
    pub fn new(store: Arc<S>, tables: RegistryTables) -> Self {
        Self { store, tables }
    }

    /// Insert a new shard row in `disabled` state, so runtime allocation
    /// cannot reach it until provisioning completes.
    ///
    /// Fails with [`RegistryError::ShardExists`] if the shard is already
    /// registered (strongly-consistent pre-check).
    pub async fn add_shard(&self, shard_name: &str, entity_type: &str) -> RegistryResult<()> {
        if self.get_shard_by_name(shard_name).await?.is_some() {
            return Err(RegistryError::ShardExists(shard_name.to_string()));
        }
        let now = epoch_millis();
        let entry = ShardEntry {
            shard_name: shard_name.to_string(),
            entity_type: entity_type.to_string(),
            allocation: AllocationState::Disabled,
            created_at: now,
            updated_at: now,
        };
        self.store
            .put_item(PutItemRequest {
                table: self.tables.available_table.clone(),
                item: entry.to_item(),
            })
            .await?;
        debug!(shard_name, entity_type, "shard registered (disabled)");
        Ok(())
    }

    /// Set a shard's allocation state and bump `updated_at`. Returns the
    /// updated entry. Fails with [`RegistryError::ShardNotFound`] if the
    /// shard is not registered.
    pub async fn configure_shard(
        &self,
        shard_name: &str,
        allocation: AllocationState,
    ) -> RegistryResult<ShardEntry> {
        let updated = self
            .store
            .update_item(UpdateItemRequest {
                table: self.tables.available_table.clone(),
                key: ItemKey::partition(shard_name),
                set: vec![
                    (
                        columns::ALLOCATION_TYPE.to_string(),
                        json!(allocation.as_str()),
                    ),
                    (columns::UPDATED_AT.to_string(), json!(epoch_millis())),
                ],
            })
            .await
            .map_err(|e| match e {
                BackendError::ItemNotFound { .. } => {
                    RegistryError::ShardNotFound(shard_name.to_string())
                }
                other => RegistryError::Backend(other),
            })?;
        debug!(shard_name, allocation = allocation.as_str(), "shard reconfigured");
        ShardEntry::from_item(&updated)
    }

    /// Strongly-consistent point lookup.
    pub async fn get_shard_by_name(&self, shard_name: &str) -> RegistryResult<Option<ShardEntry>> {
        let found = self
            .store
            .get_item(GetItemRequest {
                table: self.tables.available_table.clone(),
                key: ItemKey::partition(shard_name),
                consistent: true,
            })
            .await?;
        match found {
            Some(item) => Ok(Some(ShardEntry::from_item(&item)?)),
            None => Ok(None),
        }
    }

    /// Batched existence check. Names absent from the backend response
    /// are reported `false`.
    pub async fn has_shards(&self, shard_names: &[String]) -> RegistryResult<HashMap<String, bool>> {
        let mut result: HashMap<String, bool> = shard_names
            .iter()
            .map(|name| (name.clone(), false))
            .collect();
        if shard_names.is_empty() {
            return Ok(result);
        }

        let found = self
            .store
            .batch_get_item(BatchGetRequest {
                table: self.tables.available_table.clone(),
                keys: shard_names
                    .iter()
                    .map(|name| ItemKey::partition(name.as_str()))
                    .collect(),
                consistent: true,
            })
            .await?;
        for item in &found {
            let entry = ShardEntry::from_item(item)?;
            result.insert(entry.shard_name, true);
        }
        Ok(result)
    }

    /// List shards per `(entity_type, filter)` request, one secondary-
    /// index query per request, all dispatched concurrently.
    ///
    /// An `All` filter omits the allocation predicate. Zero rows for a
    /// request is a valid, successful result; the aggregate call fails
    /// only if a sub-query itself fails.
    pub async fn shards_by_entity(
        &self,
        requests: &[ShardListRequest],
    ) -> RegistryResult<HashMap<ShardListRequest, Vec<ShardEntry>>> {
        let queries = requests.iter().map(|req| {
            self.store.query(QueryRequest {
                table: self.tables.available_table.clone(),
                index: Some(self.tables.entity_allocation_index.clone()),
                partition: (columns::ENTITY_TYPE.to_string(), json!(req.entity_type)),
                filter: req
                    .filter
                    .allocation()
                    .map(|state| (columns::ALLOCATION_TYPE.to_string(), json!(state.as_str()))),
                consistent: false,
            })
        });
        let responses = try_join_all(queries).await?;

        let mut result = HashMap::new();
        for (req, items) in requests.iter().zip(responses) {
            let entries = items
                .iter()
                .map(ShardEntry::from_item)
                .collect::<RegistryResult<Vec<_>>>()?;
            result.insert(req.clone(), entries);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ShardFilter;
    use shardgrid_backend::EmbeddedStore;

    async fn registry() -> AvailableShardRegistry<EmbeddedStore> {
        let store = Arc::new(EmbeddedStore::open_in_memory().unwrap());
        let tables = RegistryTables::default();
        tables.ensure(store.as_ref()).await.unwrap();
        AvailableShardRegistry::new(store, tables)
    }

    #[tokio::test]
    async fn add_shard_starts_disabled() {
        let reg = registry().await;
        reg.add_shard("shard_0", "user").await.unwrap();

        let entry = reg.get_shard_by_name("shard_0").await.unwrap().unwrap();
        assert_eq!(entry.allocation, AllocationState::Disabled);
        assert_eq!(entry.entity_type, "user");
        assert_eq!(entry.created_at, entry.updated_at);
    }

    #[tokio::test]
    async fn add_shard_twice_fails() {
        let reg = registry().await;
        reg.add_shard("shard_0", "user").await.unwrap();

        let err = reg.add_shard("shard_0", "user").await.unwrap_err();
        assert!(matches!(err, RegistryError::ShardExists(_)));
    }

    #[tokio::test]
    async fn configure_shard_round_trip() {
        let reg = registry().await;
        reg.add_shard("shard_0", "user").await.unwrap();

        let updated = reg
            .configure_shard("shard_0", AllocationState::Enabled)
            .await
            .unwrap();
        assert_eq!(updated.allocation, AllocationState::Enabled);

        let fetched = reg.get_shard_by_name("shard_0").await.unwrap().unwrap();
        assert_eq!(fetched.allocation, AllocationState::Enabled);
    }

    #[tokio::test]
    async fn configure_unknown_shard_is_not_found() {
        let reg = registry().await;
        let err = reg
            .configure_shard("ghost", AllocationState::Enabled)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::ShardNotFound(_)));
    }

    #[tokio::test]
    async fn has_shards_reports_absent_as_false() {
        let reg = registry().await;
        reg.add_shard("shard_0", "user").await.unwrap();
        reg.add_shard("shard_1", "user").await.unwrap();

        let result = reg
            .has_shards(&[
                "shard_0".to_string(),
                "shard_1".to_string(),
                "shard_9".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(result.get("shard_0"), Some(&true));
        assert_eq!(result.get("shard_1"), Some(&true));
        assert_eq!(result.get("shard_9"), Some(&false));
    }

    #[tokio::test]
    async fn shards_by_entity_filters_and_fans_out() {
        let reg = registry().await;
        reg.add_shard("shard_0", "user").await.unwrap();
        reg.add_shard("shard_1", "user").await.unwrap();
        reg.add_shard("shard_2", "token").await.unwrap();
        reg.configure_shard("shard_0", AllocationState::Enabled)
            .await
            .unwrap();

        let enabled_user = ShardListRequest::new("user", ShardFilter::Enabled);
        let all_user = ShardListRequest::new("user", ShardFilter::All);
        let all_session = ShardListRequest::new("session", ShardFilter::All);

        let result = reg
            .shards_by_entity(&[
                enabled_user.clone(),
                all_user.clone(),
                all_session.clone(),
            ])
            .await
            .unwrap();

        let enabled = &result[&enabled_user];
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].shard_name, "shard_0");

        assert_eq!(result[&all_user].len(), 2);
        // Zero rows is a success, not a failure.
        assert!(result[&all_session].is_empty());
    }
}
