//! In-memory table for key lookups.
//!
//! One `VersionedValue` per key. Writes are last-write-wins on the version
//! number: a write carrying a lower version than the stored one is dropped.

use quorumkv_common::VersionedValue;
use std::collections::HashMap;

/// Outcome of a [`Memtable::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    /// The incoming value is now stored.
    Applied(VersionedValue),
    /// A strictly newer version was already stored and is kept.
    Superseded(VersionedValue),
}

impl PutOutcome {
    /// The value stored for the key after the put.
    pub fn stored(&self) -> &VersionedValue {
        match self {
            PutOutcome::Applied(v) | PutOutcome::Superseded(v) => v,
        }
    }

    pub fn into_stored(self) -> VersionedValue {
        match self {
            PutOutcome::Applied(v) | PutOutcome::Superseded(v) => v,
        }
    }
}

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct Memtable {
    data: HashMap<String, VersionedValue>,
}

impl Memtable {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<VersionedValue> {
        self.data.get(key).cloned()
    }

    /// Put a value. Equal versions overwrite (idempotent re-delivery of the
    /// same write); lower versions never replace a newer stored value.
    pub fn put(&mut self, key: &str, incoming: VersionedValue) -> PutOutcome {
        match self.data.get(key) {
            Some(existing) if existing.version > incoming.version => {
                PutOutcome::Superseded(existing.clone())
            }
            _ => {
                self.data.insert(key.to_string(), incoming.clone());
                PutOutcome::Applied(incoming)
            }
        }
    }

    /// Remove a key. Returns the removed value, if any.
    pub fn remove(&mut self, key: &str) -> Option<VersionedValue> {
        self.data.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let mut mt = Memtable::new();
        let out = mt.put("k1", VersionedValue::new("v1", 10));
        assert_eq!(out, PutOutcome::Applied(VersionedValue::new("v1", 10)));
        assert_eq!(mt.get("k1"), Some(VersionedValue::new("v1", 10)));
        assert_eq!(mt.get("missing"), None);
    }

    #[test]
    fn test_newer_version_replaces() {
        let mut mt = Memtable::new();
        mt.put("k1", VersionedValue::new("old", 5));
        mt.put("k1", VersionedValue::new("new", 9));
        assert_eq!(mt.get("k1").unwrap().value, "new");
        assert_eq!(mt.len(), 1);
    }

    #[test]
    fn test_older_version_is_dropped() {
        let mut mt = Memtable::new();
        mt.put("k1", VersionedValue::new("new", 9));
        let out = mt.put("k1", VersionedValue::new("old", 5));
        assert_eq!(out, PutOutcome::Superseded(VersionedValue::new("new", 9)));
        assert_eq!(out.stored().version, 9);
        assert_eq!(mt.get("k1").unwrap().value, "new");
    }

    #[test]
    fn test_equal_version_overwrites() {
        let mut mt = Memtable::new();
        mt.put("k1", VersionedValue::new("a", 7));
        let out = mt.put("k1", VersionedValue::new("b", 7));
        assert!(matches!(out, PutOutcome::Applied(_)));
        assert_eq!(mt.get("k1").unwrap().value, "b");
    }

    #[test]
    fn test_remove() {
        let mut mt = Memtable::new();
        mt.put("k1", VersionedValue::new("v1", 1));
        mt.put("k2", VersionedValue::new("v2", 1));
        assert_eq!(mt.remove("k1").unwrap().value, "v1");
        assert!(mt.remove("k1").is_none());
        assert!(!mt.contains_key("k1"));
        assert!(mt.contains_key("k2"));
        assert_eq!(mt.len(), 1);
    }
}
