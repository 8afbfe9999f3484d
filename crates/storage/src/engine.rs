//! Storage engine: combines the memtable with an LRU read cache.
//!
//! Reads consult the cache first and populate it on a miss. Writes go to
//! the memtable, then the cache is refreshed with whatever the memtable
//! kept, so a superseded write never pollutes the cache.

use crate::cache::ReadCache;
use crate::memtable::{Memtable, PutOutcome};
use quorumkv_common::VersionedValue;

/// The per-node store. All operations are synchronous; the async boundary
/// is at the caller (HTTP layer), which wraps the engine in a lock.
#[derive(Debug)]
pub struct StorageEngine {
    memtable: Memtable,
    cache: ReadCache,
}

impl StorageEngine {
    pub fn new(cache_capacity: usize) -> Self {
        tracing::info!("storage engine opened with cache capacity {}", cache_capacity);
        Self {
            memtable: Memtable::new(),
            cache: ReadCache::new(cache_capacity),
        }
    }

    /// Get the value for a key.
    pub fn get(&mut self, key: &str) -> Option<VersionedValue> {
        if let Some(hit) = self.cache.get(key) {
            return Some(hit);
        }
        let found = self.memtable.get(key)?;
        self.cache.put(key, found.clone());
        Some(found)
    }

    /// Store a value. A missing version is generated from the wall clock.
    /// Returns the value stored for the key afterwards.
    pub fn put(&mut self, key: &str, value: String, version: Option<u64>) -> PutOutcome {
        let incoming = match version {
            Some(v) => VersionedValue::new(value, v),
            None => VersionedValue::now(value),
        };
        let outcome = self.memtable.put(key, incoming);
        self.cache.put(key, outcome.stored().clone());
        outcome
    }

    /// Remove a key. Returns `true` if it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.cache.remove(key);
        self.memtable.remove(key).is_some()
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.memtable.len()
    }

    /// Number of entries currently cached.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}
