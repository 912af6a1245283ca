//! Allocation error types.

use thiserror::Error;

use shardgrid_cache::ShardListCacheError;
use shardgrid_registry::RegistryError;

/// Result type alias for allocation operations.
pub type AllocResult<T> = Result<T, AllocError>;

/// Errors that can occur during allocation.
#[derive(Debug, Error)]
pub enum AllocError {
    /// No enabled shard exists for the entity type. Fatal until an
    /// operator provisions capacity; retrying cannot help.
    #[error("no enabled shards available for entity type {entity_type}")]
    NoShardsAvailable { entity_type: String },

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("shard list fetch failed: {0}")]
    ShardList(#[from] ShardListCacheError),
}
