//! Node health table and the background probe loop that maintains it.
//!
//! Health is advisory: the monitor overwrites every entry each cycle, and
//! coordinators mark a node down as soon as a call to it fails. Every entry
//! starts healthy so the first requests after startup are not rejected
//! before the first probe round completes.

use crate::replica_client::ReplicaClient;
use dashmap::DashMap;
use futures::future::join_all;
use quorumkv_common::NodeAddr;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Shared up/down table for the configured nodes.
#[derive(Debug)]
pub struct HealthRegistry {
    nodes: Vec<NodeAddr>,
    table: DashMap<NodeAddr, bool>,
}

impl HealthRegistry {
    pub fn new(nodes: Vec<NodeAddr>) -> Self {
        let table = DashMap::new();
        for node in &nodes {
            table.insert(node.clone(), true);
        }
        Self { nodes, table }
    }

    /// Configured nodes, in configuration order.
    pub fn nodes(&self) -> &[NodeAddr] {
        &self.nodes
    }

    /// Unknown nodes are reported unhealthy.
    pub fn is_healthy(&self, node: &NodeAddr) -> bool {
        self.table.get(node).map(|e| *e).unwrap_or(false)
    }

    /// Record an observation. Returns the previous state.
    pub fn mark(&self, node: &NodeAddr, healthy: bool) -> bool {
        let previous = self
            .table
            .insert(node.clone(), healthy)
            .unwrap_or(false);
        if previous && !healthy {
            quorumkv_metrics::metrics().nodes_marked_down.inc();
            tracing::warn!("node {} marked DOWN", node);
        } else if !previous && healthy {
            tracing::info!("node {} marked UP", node);
        }
        previous
    }

    pub fn mark_down(&self, node: &NodeAddr) {
        self.mark(node, false);
    }

    pub fn mark_up(&self, node: &NodeAddr) {
        self.mark(node, true);
    }

    /// The healthy members of `candidates`, order preserved.
    pub fn healthy_subset(&self, candidates: &[NodeAddr]) -> Vec<NodeAddr> {
        candidates
            .iter()
            .filter(|n| self.is_healthy(n))
            .cloned()
            .collect()
    }

    /// Health of every configured node.
    pub fn snapshot(&self) -> BTreeMap<String, bool> {
        self.nodes
            .iter()
            .map(|n| (n.to_string(), self.is_healthy(n)))
            .collect()
    }
}

/// Configuration for the health monitor background task.
#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    /// Time between probe rounds.
    pub probe_interval: Duration,
    /// Upper bound on a single probe.
    pub probe_timeout: Duration,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(2),
            probe_timeout: Duration::from_secs(1),
        }
    }
}

/// Probe every configured node once and record the results.
///
/// Probes run concurrently, each under its own timeout, so one hung node
/// cannot delay the verdict on the others. Returns the number of nodes
/// found healthy.
pub async fn probe_all<R: ReplicaClient>(
    registry: &HealthRegistry,
    client: &R,
    probe_timeout: Duration,
) -> usize {
    let probes = registry.nodes().iter().map(|node| async move {
        let healthy = matches!(
            tokio::time::timeout(probe_timeout, client.probe(node)).await,
            Ok(Ok(()))
        );
        (node, healthy)
    });

    let results = join_all(probes).await;

    let mut up = 0usize;
    for (node, healthy) in results {
        if healthy {
            up += 1;
        } else {
            quorumkv_metrics::metrics().probe_failures.inc();
        }
        registry.mark(node, healthy);
    }
    up
}

/// Spawn the background health monitor. It runs until the runtime shuts
/// down.
#[allow(clippy::needless_pass_by_value)] // config is moved into the spawned task
pub fn spawn_health_monitor<R: ReplicaClient>(
    registry: Arc<HealthRegistry>,
    client: Arc<R>,
    config: HealthMonitorConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(config.probe_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            let up = probe_all(&registry, client.as_ref(), config.probe_timeout).await;
            tracing::trace!("health round: {}/{} nodes up", up, registry.nodes().len());
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
