//! shardgrid-registry — durable shard catalogs.
//!
//! Two registries back the sharding core, both source of truth for
//! their table:
//!
//! - [`AvailableShardRegistry`]: one row per physical shard, carrying
//!   the entity type it stores and whether allocation to it is enabled.
//!   Rows are created disabled and flipped enabled only once the shard
//!   is fully provisioned.
//! - [`ManagedShardRegistry`]: one row per `(entity_type, identifier)`
//!   pin. Absence of a row means "not yet allocated".
//!
//! No transaction spans both tables; each write is a single-row
//! operation and cross-registry consistency is reconciled by callers
//! re-querying.

pub mod available;
pub mod error;
pub mod managed;
pub mod types;

pub use available::AvailableShardRegistry;
pub use error::{RegistryError, RegistryResult};
pub use managed::ManagedShardRegistry;
pub use types::{
    AllocationState, RegistryTables, ShardAssignment, ShardEntry, ShardFilter, ShardListRequest,
    epoch_millis,
};
