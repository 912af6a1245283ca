//! Generic read-through multi-key cache.
//!
//! Replaces inheritance-style cache variants with a single cache type
//! parameterized by a source: the source builds cache keys and resolves
//! misses with one batched fetch. Hits never touch the source; source
//! failures are propagated as-is with nothing cached and no stale value
//! served.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::store::TtlStore;

/// Errors from a read-through fetch.
#[derive(Debug, Error)]
pub enum CacheError<E> {
    /// A source fetch was attempted with zero ids. Defensive contract:
    /// correct callers never trigger this.
    #[error("fetch attempted with no cache ids")]
    InvalidCacheIds,

    #[error("cache codec error: {0}")]
    Codec(String),

    #[error(transparent)]
    Source(E),
}

/// Supplies the key builder and the batched miss-resolution fetch for a
/// [`ReadThroughCache`].
pub trait CacheSource: Send + Sync {
    type Id: Clone + Eq + Hash + Send + Sync;
    type Value: Clone + Serialize + DeserializeOwned + Send;
    type Error: std::error::Error;

    /// Namespaced cache key for one id.
    fn cache_key(&self, id: &Self::Id) -> String;

    /// Resolve the given ids from the source of truth. Called only on a
    /// miss, restricted to exactly the missed ids.
    async fn fetch_from_source(
        &self,
        ids: &[Self::Id],
    ) -> Result<HashMap<Self::Id, Self::Value>, Self::Error>;
}

/// Read-through cache over a [`CacheSource`].
pub struct ReadThroughCache<C: CacheSource> {
    source: C,
    store: TtlStore,
    ttl: Duration,
}

impl<C: CacheSource + Clone> Clone for ReadThroughCache<C> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            store: self.store.clone(),
            ttl: self.ttl,
        }
    }
}

impl<C: CacheSource> ReadThroughCache<C> {
    pub fn new(source: C, store: TtlStore, ttl: Duration) -> Self {
        Self { source, store, ttl }
    }

    /// Fetch values for the given ids, serving hits from the store and
    /// resolving misses with a single batched source call.
    pub async fn fetch(
        &self,
        ids: &[C::Id],
    ) -> Result<HashMap<C::Id, C::Value>, CacheError<C::Error>> {
        let mut result = HashMap::new();
        let mut missed: Vec<C::Id> = Vec::new();

        for id in ids {
            let key = self.source.cache_key(id);
            match self.store.get(&key) {
                Some(bytes) => {
                    let value: C::Value = serde_json::from_slice(&bytes)
                        .map_err(|e| CacheError::Codec(e.to_string()))?;
                    result.insert(id.clone(), value);
                }
                None => missed.push(id.clone()),
            }
        }

        if !missed.is_empty() {
            debug!(hits = result.len(), misses = missed.len(), "cache miss, fetching from source");
            let fetched = self.fetch_missing(&missed).await?;
            for (id, value) in fetched {
                let bytes =
                    serde_json::to_vec(&value).map_err(|e| CacheError::Codec(e.to_string()))?;
                self.store.set(&self.source.cache_key(&id), bytes, self.ttl);
                result.insert(id, value);
            }
        }

        Ok(result)
    }

    async fn fetch_missing(
        &self,
        ids: &[C::Id],
    ) -> Result<HashMap<C::Id, C::Value>, CacheError<C::Error>> {
        if ids.is_empty() {
            return Err(CacheError::InvalidCacheIds);
        }
        self.source
            .fetch_from_source(ids)
            .await
            .map_err(CacheError::Source)
    }

    /// The shared store backing this cache.
    pub fn store(&self) -> &TtlStore {
        &self.store
    }
}
