//! ShardManager — the public shard management operations.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use shardgrid_alloc::AllocationEngine;
use shardgrid_backend::{ScalingGateway, StorageGateway, TableSpec};
use shardgrid_cache::{ShardListCache, TtlStore, shard_list_cache};
use shardgrid_provision::{
    ProvisionRequest, ProvisioningOrchestrator, ShardScalingConfig,
};
use shardgrid_registry::{
    AvailableShardRegistry, ManagedShardRegistry, ShardAssignment, ShardEntry, ShardFilter,
    ShardListRequest,
};

use crate::config::ShardGridConfig;
use crate::error::{ShardError, ShardResult};

/// Shard management facade over explicitly injected gateways.
///
/// Point lookups of pins go straight to the managed-shard registry;
/// shard listings go through the TTL-bounded read-through cache, which
/// the allocation engine shares.
pub struct ShardManager<S: StorageGateway, A> {
    config: ShardGridConfig,
    storage: Arc<S>,
    available: AvailableShardRegistry<S>,
    managed: ManagedShardRegistry<S>,
    shard_lists: ShardListCache<S>,
    engine: AllocationEngine<S>,
    orchestrator: ProvisioningOrchestrator<S, A>,
}

impl<S: StorageGateway, A: ScalingGateway> ShardManager<S, A> {
    /// Build a manager from its collaborators.
    pub fn new(storage: Arc<S>, scaling: Arc<A>, config: ShardGridConfig) -> Self {
        let available = AvailableShardRegistry::new(storage.clone(), config.tables.clone());
        let managed = ManagedShardRegistry::new(storage.clone(), config.tables.clone());
        let shard_lists =
            shard_list_cache(available.clone(), TtlStore::new(), config.cache_ttl());
        let engine = AllocationEngine::new(managed.clone(), shard_lists.clone());
        let orchestrator =
            ProvisioningOrchestrator::new(storage.clone(), scaling, available.clone());
        Self {
            config,
            storage,
            available,
            managed,
            shard_lists,
            engine,
            orchestrator,
        }
    }

    /// Create the registry tables if they do not exist yet.
    pub async fn ensure_registry_tables(&self) -> ShardResult<()> {
        self.config.tables.ensure(self.storage.as_ref()).await?;
        Ok(())
    }

    /// Ensure a pin exists for `(entity_type, identifier)`, creating one
    /// if absent. Idempotent: an existing pin is left untouched.
    pub async fn allocate(&self, entity_type: &str, identifier: &str) -> ShardResult<()> {
        self.engine.allocate(entity_type, identifier).await?;
        Ok(())
    }

    /// Whether the identifier has a pin. Absence is folded into
    /// `Ok(false)`, never an error.
    pub async fn has_allocated_shard(
        &self,
        entity_type: &str,
        identifier: &str,
    ) -> ShardResult<bool> {
        let pins = self
            .managed
            .get_assignments(entity_type, std::slice::from_ref(&identifier.to_string()))
            .await?;
        Ok(pins.get(identifier).is_some_and(Option::is_some))
    }

    /// Batched pin lookup. Identifiers with no pin map to `None`.
    pub async fn get_managed_shards(
        &self,
        entity_type: &str,
        identifiers: &[String],
    ) -> ShardResult<HashMap<String, Option<ShardAssignment>>> {
        Ok(self.managed.get_assignments(entity_type, identifiers).await?)
    }

    /// List shards for an entity type through the shard-list cache.
    ///
    /// `shard_type` defaults to `all` when absent or empty; a non-empty
    /// unrecognized value fails with `invalid_shard_type`.
    pub async fn get_shard_list(
        &self,
        entity_type: &str,
        shard_type: Option<&str>,
    ) -> ShardResult<Vec<ShardEntry>> {
        let filter = match shard_type {
            None | Some("") => ShardFilter::All,
            Some(value) => ShardFilter::parse(value).ok_or_else(|| {
                debug!(shard_type = value, "unrecognized shard type filter");
                ShardError::InvalidShardType {
                    value: value.to_string(),
                }
            })?,
        };

        let request = ShardListRequest::new(entity_type, filter);
        let mut listings = self
            .shard_lists
            .fetch(std::slice::from_ref(&request))
            .await?;
        Ok(listings.remove(&request).unwrap_or_default())
    }

    /// Provision a new shard: create its table, register it disabled,
    /// configure auto-scaling, and enable it. Falls back to the
    /// configured default scaling parameters when the caller supplies
    /// none.
    pub async fn provision_shard(
        &self,
        schema: TableSpec,
        entity_type: &str,
        scaling: Option<ShardScalingConfig>,
    ) -> ShardResult<()> {
        let request = ProvisionRequest {
            schema,
            entity_type: entity_type.to_string(),
            scaling: scaling.unwrap_or_else(|| self.config.scaling.clone()),
        };
        self.orchestrator.provision(&request).await?;
        Ok(())
    }

    /// The underlying orchestrator, for resuming a partially failed
    /// provisioning run at a specific step.
    pub fn orchestrator(&self) -> &ProvisioningOrchestrator<S, A> {
        &self.orchestrator
    }

    /// The available-shard registry, for operator-level reads such as
    /// `get_shard_by_name` and `has_shards`.
    pub fn available_shards(&self) -> &AvailableShardRegistry<S> {
        &self.available
    }
}
