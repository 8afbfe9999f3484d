//! In-memory store for hinted-handoff hints.
//!
//! Each hint represents a write that was not applied to its intended
//! replica. Hints are kept in one FIFO queue per target node and delivered
//! by [`crate::hint_delivery`] once the target is healthy again. Queues are
//! created on the first hint for a node and dropped once drained.

use dashmap::DashMap;
use quorumkv_common::{now_ms, NodeAddr, VersionedValue};
use std::collections::{BTreeMap, VecDeque};
use tokio::sync::{Mutex, MutexGuard};

/// A hint: a write that needs to be delivered to a specific target node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    pub target: NodeAddr,
    pub key: String,
    pub versioned: VersionedValue,
    pub created_at_ms: u64,
}

/// Per-node FIFO queues of pending hints.
///
/// Safe to share across request handlers and delivery passes: appends and
/// pops take a short per-shard lock that is never held across `.await`.
/// Delivery passes additionally serialise on [`HintStore::lock_delivery`].
#[derive(Debug, Default)]
pub struct HintStore {
    queues: DashMap<NodeAddr, VecDeque<Hint>>,
    delivery: Mutex<()>,
}

impl HintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a write for `target`, stamped with the current time.
    pub fn store_hint(&self, target: &NodeAddr, key: &str, versioned: &VersionedValue) {
        self.push_back(Hint {
            target: target.clone(),
            key: key.to_string(),
            versioned: versioned.clone(),
            created_at_ms: now_ms(),
        });
        quorumkv_metrics::metrics().hints_stored.inc();
    }

    /// Append a hint to the tail of its target's queue.
    pub(crate) fn push_back(&self, hint: Hint) {
        self.queues
            .entry(hint.target.clone())
            .or_default()
            .push_back(hint);
    }

    /// Take the oldest hint for `target`.
    pub(crate) fn pop_front(&self, target: &NodeAddr) -> Option<Hint> {
        self.queues.get_mut(target)?.pop_front()
    }

    /// Drop `target`'s queue if it is empty.
    pub(crate) fn remove_if_empty(&self, target: &NodeAddr) {
        self.queues.remove_if(target, |_, q| q.is_empty());
    }

    /// Acquire the delivery lock; held for a whole delivery pass.
    pub(crate) async fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().await
    }

    /// Pending hints for a single node.
    pub fn pending_count(&self, target: &NodeAddr) -> usize {
        self.queues.get(target).map(|q| q.len()).unwrap_or(0)
    }

    /// Pending hints for each of `nodes` (zero when none are queued).
    pub fn pending_snapshot(&self, nodes: &[NodeAddr]) -> BTreeMap<String, usize> {
        nodes
            .iter()
            .map(|n| (n.to_string(), self.pending_count(n)))
            .collect()
    }

    /// Snapshot of the hints queued for `target`, oldest first.
    pub fn hints_for_node(&self, target: &NodeAddr) -> Vec<Hint> {
        self.queues
            .get(target)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Nodes with at least one pending hint, sorted.
    pub fn all_target_nodes(&self) -> Vec<NodeAddr> {
        let mut targets: Vec<NodeAddr> = self
            .queues
            .iter()
            .filter(|e| !e.value().is_empty())
            .map(|e| e.key().clone())
            .collect();
        targets.sort();
        targets
    }

    /// Total number of pending hints.
    pub fn hint_count(&self) -> usize {
        self.queues.iter().map(|e| e.value().len()).sum()
    }

    /// Number of live queues (including any not yet cleaned up).
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
