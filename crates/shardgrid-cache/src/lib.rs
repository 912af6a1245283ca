//! shardgrid-cache — read-through caching for shard-list queries.
//!
//! A [`ReadThroughCache`] is parameterized by a [`CacheSource`]: the
//! source supplies the cache-key builder and the batched fetch that
//! resolves misses. Values live in a shared [`TtlStore`] as JSON bytes
//! and expire purely by time; no component invalidates entries when the
//! underlying data changes.
//!
//! [`ShardListCache`] is the one concrete instantiation: it fronts the
//! available-shard registry's list query with a 24-hour TTL.

#![allow(async_fn_in_trait)]

pub mod read_through;
pub mod shard_list;
pub mod store;

pub use read_through::{CacheError, CacheSource, ReadThroughCache};
pub use shard_list::{SHARD_LIST_TTL, ShardListCache, ShardListCacheError, ShardListSource, shard_list_cache};
pub use store::TtlStore;
