//! Bounded LRU read cache in front of the memtable.

use lru::LruCache;
use quorumkv_common::VersionedValue;
use std::num::NonZeroUsize;

#[derive(Debug)]
pub struct ReadCache {
    entries: LruCache<String, VersionedValue>,
}

impl ReadCache {
    /// A zero capacity is bumped to one entry.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Look up a key, marking it most recently used.
    pub fn get(&mut self, key: &str) -> Option<VersionedValue> {
        self.entries.get(key).cloned()
    }

    pub fn put(&mut self, key: &str, value: VersionedValue) {
        self.entries.put(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.pop(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = ReadCache::new(2);
        cache.put("a", VersionedValue::new("1", 1));
        cache.put("b", VersionedValue::new("2", 1));

        // Touch "a" so "b" becomes the eviction candidate.
        assert!(cache.get("a").is_some());
        cache.put("c", VersionedValue::new("3", 1));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_remove() {
        let mut cache = ReadCache::new(4);
        cache.put("a", VersionedValue::new("1", 1));
        cache.remove("a");
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_bumped() {
        let cache = ReadCache::new(0);
        assert_eq!(cache.capacity(), 1);
    }
}
