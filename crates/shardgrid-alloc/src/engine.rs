//! Allocation engine — picks an enabled shard for an identifier and
//! persists the pin.

use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_64;

use shardgrid_backend::StorageGateway;
use shardgrid_cache::ShardListCache;
use shardgrid_registry::{ManagedShardRegistry, ShardFilter, ShardListRequest};

use crate::error::{AllocError, AllocResult};

/// Result of an allocation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationOutcome {
    /// Shard the identifier is pinned to.
    pub shard_name: String,
    /// False if a pin already existed and was returned unchanged.
    pub newly_assigned: bool,
}

/// Index of the shard an identifier maps to, given the listing size.
///
/// xxh3 is stable across processes and releases, so the same identifier
/// always lands on the same index for a fixed listing.
pub fn shard_index(identifier: &str, shard_count: usize) -> usize {
    (xxh3_64(identifier.as_bytes()) % shard_count as u64) as usize
}

/// Deterministic shard allocation over the enabled-shard listing.
pub struct AllocationEngine<S: StorageGateway> {
    managed: ManagedShardRegistry<S>,
    shard_lists: ShardListCache<S>,
}

impl<S: StorageGateway> AllocationEngine<S> {
    pub fn new(managed: ManagedShardRegistry<S>, shard_lists: ShardListCache<S>) -> Self {
        Self {
            managed,
            shard_lists,
        }
    }

    /// Ensure a pin exists for `(entity_type, identifier)`, creating one
    /// if absent.
    ///
    /// The existence check goes straight to the managed-shard registry;
    /// the cache is consulted only for candidate selection. The pin
    /// write is last-writer-wins: concurrent first allocations for the
    /// same identifier may race, and callers needing at-most-once
    /// semantics must serialize attempts per identifier themselves.
    pub async fn allocate(
        &self,
        entity_type: &str,
        identifier: &str,
    ) -> AllocResult<AllocationOutcome> {
        let existing = self
            .managed
            .get_assignments(entity_type, std::slice::from_ref(&identifier.to_string()))
            .await?;
        if let Some(Some(assignment)) = existing.get(identifier) {
            debug!(
                entity_type,
                identifier,
                shard_name = %assignment.shard_name,
                "identifier already pinned"
            );
            return Ok(AllocationOutcome {
                shard_name: assignment.shard_name.clone(),
                newly_assigned: false,
            });
        }

        let request = ShardListRequest::new(entity_type, ShardFilter::Enabled);
        let mut listings = self
            .shard_lists
            .fetch(std::slice::from_ref(&request))
            .await?;
        let shards = listings.remove(&request).unwrap_or_default();
        if shards.is_empty() {
            return Err(AllocError::NoShardsAvailable {
                entity_type: entity_type.to_string(),
            });
        }

        let index = shard_index(identifier, shards.len());
        let shard_name = shards[index].shard_name.clone();
        self.managed
            .assign(entity_type, identifier, &shard_name)
            .await?;
        info!(
            entity_type,
            identifier,
            shard_name = %shard_name,
            index,
            shard_count = shards.len(),
            "identifier allocated"
        );
        Ok(AllocationOutcome {
            shard_name,
            newly_assigned: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use shardgrid_backend::EmbeddedStore;
    use shardgrid_cache::{SHARD_LIST_TTL, TtlStore, shard_list_cache};
    use shardgrid_registry::{AllocationState, AvailableShardRegistry, RegistryTables};

    struct Fixture {
        available: AvailableShardRegistry<EmbeddedStore>,
        managed: ManagedShardRegistry<EmbeddedStore>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(EmbeddedStore::open_in_memory().unwrap());
        let tables = RegistryTables::default();
        tables.ensure(store.as_ref()).await.unwrap();
        Fixture {
            available: AvailableShardRegistry::new(store.clone(), tables.clone()),
            managed: ManagedShardRegistry::new(store, tables),
        }
    }

    impl Fixture {
        /// Engine with an uncached shard list, so registry changes are
        /// visible immediately.
        fn engine(&self) -> AllocationEngine<EmbeddedStore> {
            let cache = shard_list_cache(self.available.clone(), TtlStore::new(), Duration::ZERO);
            AllocationEngine::new(self.managed.clone(), cache)
        }

        async fn add_enabled(&self, shard: &str, entity: &str) {
            self.available.add_shard(shard, entity).await.unwrap();
            self.available
                .configure_shard(shard, AllocationState::Enabled)
                .await
                .unwrap();
        }
    }

    #[test]
    fn shard_index_is_deterministic() {
        let a = shard_index("alice", 3);
        let b = shard_index("alice", 3);
        assert_eq!(a, b);
        assert!(a < 3);
    }

    #[test]
    fn shard_index_spreads_identifiers() {
        // Not a distribution test, just that different identifiers can
        // land on different shards at all.
        let indexes: std::collections::HashSet<usize> = (0..32)
            .map(|i| shard_index(&format!("client_{i}"), 4))
            .collect();
        assert!(indexes.len() > 1);
    }

    #[tokio::test]
    async fn allocate_pins_to_hashed_index() {
        let fx = fixture().await;
        // Key-ordered listing: shard_0, shard_1, shard_2.
        fx.add_enabled("shard_0", "user").await;
        fx.add_enabled("shard_1", "user").await;
        fx.add_enabled("shard_2", "user").await;

        let engine = fx.engine();
        let outcome = engine.allocate("user", "alice").await.unwrap();
        assert!(outcome.newly_assigned);

        let expected = format!(
            "shard_{}",
            shard_index("alice", 3)
        );
        assert_eq!(outcome.shard_name, expected);

        // Pin is persisted.
        let pins = fx
            .managed
            .get_assignments("user", &["alice".to_string()])
            .await
            .unwrap();
        assert_eq!(pins["alice"].as_ref().unwrap().shard_name, expected);
    }

    #[tokio::test]
    async fn identifiers_with_equal_index_share_a_shard() {
        let fx = fixture().await;
        fx.add_enabled("shard_0", "user").await;
        fx.add_enabled("shard_1", "user").await;
        fx.add_enabled("shard_2", "user").await;

        let index = shard_index("client_0", 3);
        let partner = (1..)
            .map(|i| format!("client_{i}"))
            .find(|id| shard_index(id, 3) == index)
            .unwrap();

        let engine = fx.engine();
        let first = engine.allocate("user", "client_0").await.unwrap();
        let second = engine.allocate("user", &partner).await.unwrap();
        assert_eq!(first.shard_name, second.shard_name);
    }

    #[tokio::test]
    async fn allocate_without_enabled_shards_fails() {
        let fx = fixture().await;
        // A disabled shard is not a candidate.
        fx.available.add_shard("shard_0", "user").await.unwrap();

        let engine = fx.engine();
        let err = engine.allocate("user", "alice").await.unwrap_err();
        assert!(matches!(err, AllocError::NoShardsAvailable { .. }));
    }

    #[tokio::test]
    async fn disabled_shards_are_never_candidates() {
        let fx = fixture().await;
        fx.available.add_shard("shard_0", "user").await.unwrap();
        fx.available.add_shard("shard_1", "user").await.unwrap();
        fx.add_enabled("shard_2", "user").await;

        let engine = fx.engine();
        // Only shard_2 is enabled, so every identifier lands there.
        for id in ["alice", "bob", "carol", "dave"] {
            let outcome = engine.allocate("user", id).await.unwrap();
            assert_eq!(outcome.shard_name, "shard_2");
        }
    }

    #[tokio::test]
    async fn existing_pin_is_not_recomputed() {
        let fx = fixture().await;
        fx.add_enabled("shard_0", "user").await;
        fx.add_enabled("shard_1", "user").await;
        fx.add_enabled("shard_2", "user").await;

        let engine = fx.engine();
        let first = engine.allocate("user", "alice").await.unwrap();
        assert!(first.newly_assigned);

        // Grow the enabled set; the pin must survive unchanged even
        // though the hash now indexes a five-shard listing.
        fx.add_enabled("shard_3", "user").await;
        fx.add_enabled("shard_4", "user").await;

        let second = engine.allocate("user", "alice").await.unwrap();
        assert!(!second.newly_assigned);
        assert_eq!(second.shard_name, first.shard_name);
    }

    #[tokio::test]
    async fn allocation_uses_cached_listing() {
        let fx = fixture().await;
        fx.add_enabled("shard_0", "user").await;

        // Long-TTL cache: warm it, then enable another shard.
        let cache = shard_list_cache(fx.available.clone(), TtlStore::new(), SHARD_LIST_TTL);
        let engine = AllocationEngine::new(fx.managed.clone(), cache);

        engine.allocate("user", "warmup").await.unwrap();
        fx.add_enabled("shard_1", "user").await;

        // New allocations still see the one-shard listing until the TTL
        // expires; no eager invalidation exists.
        let outcome = engine.allocate("user", "alice").await.unwrap();
        assert_eq!(outcome.shard_name, "shard_0");
    }
}
