//! shardgrid-alloc — deterministic shard allocation.
//!
//! The [`AllocationEngine`] pins a not-yet-assigned identifier to one of
//! the currently enabled shards for its entity type: a stable xxh3 hash
//! of the identifier, modulo the enabled-shard count, indexes into the
//! listing returned by the shard-list cache. Existing pins are returned
//! unchanged; the engine never re-shards an identifier.

pub mod engine;
pub mod error;

pub use engine::{AllocationEngine, AllocationOutcome, shard_index};
pub use error::{AllocError, AllocResult};
