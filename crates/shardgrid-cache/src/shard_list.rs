//! Shard-list cache: read-through front for the available-shard
//! registry's list query.
//!
//! Keyed by `(entity_type, filter)` with a 24-hour TTL. Registry
//! mutations do not invalidate entries: a shard enabled after a listing
//! was cached stays invisible to readers of that listing until the TTL
//! window passes. The registries stay the source of truth; this layer
//! is acceptable for allocation candidate selection but never for
//! confirming that a pin exists.

use std::time::Duration;

use shardgrid_backend::StorageGateway;
use shardgrid_registry::{
    AvailableShardRegistry, RegistryError, ShardEntry, ShardListRequest,
};

use crate::read_through::{CacheError, CacheSource, ReadThroughCache};
use crate::store::TtlStore;

/// Time-to-live of cached shard listings.
pub const SHARD_LIST_TTL: Duration = Duration::from_secs(86_400);

/// Error type of shard-list cache fetches.
pub type ShardListCacheError = CacheError<RegistryError>;

/// Cache source backed by the available-shard registry.
pub struct ShardListSource<S> {
    registry: AvailableShardRegistry<S>,
}

impl<S> Clone for ShardListSource<S> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<S> ShardListSource<S> {
    pub fn new(registry: AvailableShardRegistry<S>) -> Self {
        Self { registry }
    }
}

impl<S: StorageGateway> CacheSource for ShardListSource<S> {
    type Id = ShardListRequest;
    type Value = Vec<ShardEntry>;
    type Error = RegistryError;

    fn cache_key(&self, id: &ShardListRequest) -> String {
        format!("sm_gsl_et_{}_st_{}", id.entity_type, id.filter.as_str())
    }

    async fn fetch_from_source(
        &self,
        ids: &[ShardListRequest],
    ) -> Result<std::collections::HashMap<ShardListRequest, Vec<ShardEntry>>, RegistryError> {
        self.registry.shards_by_entity(ids).await
    }
}

/// Read-through shard-list cache.
pub type ShardListCache<S> = ReadThroughCache<ShardListSource<S>>;

/// Build a shard-list cache over the given registry and shared store.
pub fn shard_list_cache<S: StorageGateway>(
    registry: AvailableShardRegistry<S>,
    store: TtlStore,
    ttl: Duration,
) -> ShardListCache<S> {
    ReadThroughCache::new(ShardListSource::new(registry), store, ttl)
}
