//! Managed-shard registry: durable catalog of identifier-to-shard pins.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use shardgrid_backend::{BatchGetRequest, ItemKey, PutItemRequest, StorageGateway};

use crate::error::RegistryResult;
use crate::types::{RegistryTables, ShardAssignment};

/// Registry over the managed-shard table.
pub struct ManagedShardRegistry<S> {
    store: Arc<S>,
    tables: RegistryTables,
}

impl<S> Clone for ManagedShardRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            tables: self.tables.clone(),
        }
    }
}

impl<S: StorageGateway> ManagedShardRegistry<S> {
    pub fn new(store: Arc<S>, tables: RegistryTables) -> Self {
        Self { store, tables }
    }

    /// Batched point lookup of pins. Identifiers with no pin map to
    /// `None`; absence is not an error.
    pub async fn get_assignments(
        &self,
        entity_type: &str,
        identifiers: &[String],
    ) -> RegistryResult<HashMap<String, Option<ShardAssignment>>> {
        let mut result: HashMap<String, Option<ShardAssignment>> = identifiers
            .iter()
            .map(|id| (id.clone(), None))
            .collect();
        if identifiers.is_empty() {
            return Ok(result);
        }

        let found = self
            .store
            .batch_get_item(BatchGetRequest {
                table: self.tables.managed_table.clone(),
                keys: identifiers
                    .iter()
                    .map(|id| ItemKey::composite(entity_type, id.as_str()))
                    .collect(),
                consistent: true,
            })
            .await?;
        for item in &found {
            let assignment = ShardAssignment::from_item(item)?;
            result.insert(assignment.identifier.clone(), Some(assignment));
        }
        Ok(result)
    }

    /// Persist a pin. This is an unconditional write: concurrent
    /// assignments for the same identifier race and the last writer
    /// wins. Callers needing at-most-once semantics must serialize
    /// allocation attempts per identifier themselves.
    pub async fn assign(
        &self,
        entity_type: &str,
        identifier: &str,
        shard_name: &str,
    ) -> RegistryResult<()> {
        let assignment = ShardAssignment {
            entity_type: entity_type.to_string(),
            identifier: identifier.to_string(),
            shard_name: shard_name.to_string(),
        };
        self.store
            .put_item(PutItemRequest {
                table: self.tables.managed_table.clone(),
                item: assignment.to_item(),
            })
            .await?;
        debug!(entity_type, identifier, shard_name, "identifier pinned to shard");
        Ok(())
    }
}
