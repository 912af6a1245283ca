//! Shared TTL-bounded byte store.
//!
//! Holds serialized cache values with a per-entry expiry. Expiry is
//! checked on read; expired entries are treated as absent and reclaimed
//! by [`TtlStore::purge_expired`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

struct Slot {
    payload: Vec<u8>,
    expires_at: Instant,
}

/// Thread-safe TTL store. `Clone` is cheap; all clones share entries.
#[derive(Clone, Default)]
pub struct TtlStore {
    entries: Arc<RwLock<HashMap<String, Slot>>>,
}

impl TtlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the payload if the key is present and not expired.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).and_then(|slot| {
            if Instant::now() < slot.expires_at {
                Some(slot.payload.clone())
            } else {
                None
            }
        })
    }

    /// Insert or replace an entry with the given time-to-live.
    pub fn set(&self, key: &str, payload: Vec<u8>, ttl: Duration) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.to_string(),
            Slot {
                payload,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn remove(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }

    /// Drop all expired entries.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, slot| now < slot.expires_at);
    }

    /// Number of entries, including ones that have expired but not yet
    /// been purged.
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
