//! Key placement: maps a key string to its ordered replica set.
//!
//! The node list is fixed at construction. A key's primary is
//! `u32_be(sha256(key)[..4]) % node_count`; the replica set is the primary
//! followed by the next nodes in list order, wrapping around.

use quorumkv_common::NodeAddr;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Hash a key to the 32-bit ring position used for placement.
pub fn key_hash(key: &str) -> u32 {
    let digest = Sha256::digest(key.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Deterministic router over a statically ordered node list.
#[derive(Debug, Clone)]
pub struct ConsistentHashRouter {
    nodes: Arc<[NodeAddr]>,
}

impl ConsistentHashRouter {
    pub fn new(nodes: Vec<NodeAddr>) -> Self {
        Self {
            nodes: nodes.into(),
        }
    }

    pub fn nodes(&self) -> &[NodeAddr] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Index of the key's primary node, or `None` for an empty node list.
    pub fn primary_index(&self, key: &str) -> Option<usize> {
        if self.nodes.is_empty() {
            return None;
        }
        Some(key_hash(key) as usize % self.nodes.len())
    }

    /// The ordered replica set for a key: `min(rf, node_count)` distinct
    /// nodes starting at the primary.
    pub fn replicas_for(&self, key: &str, rf: usize) -> Vec<NodeAddr> {
        let Some(primary) = self.primary_index(key) else {
            return Vec::new();
        };
        let count = rf.min(self.nodes.len());
        (0..count)
            .map(|i| self.nodes[(primary + i) % self.nodes.len()].clone())
            .collect()
    }

    pub fn primary_for(&self, key: &str) -> Option<NodeAddr> {
        self.replicas_for(key, 1).into_iter().next()
    }
}
