//! Chaos injection wrapper for [`ReplicaClient`].
//!
//! [`ChaosReplicaClient`] wraps any `R: ReplicaClient` and injects
//! configurable failures: random errors, per-node outages, and latency.
//! A node marked failed refuses probes as well, so the health monitor sees
//! the outage the same way it would see a stopped process.

use crate::replica_client::{ReplicaClient, ReplicaError};
use quorumkv_common::{NodeAddr, VersionedValue};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;

/// Configuration for replica chaos injection.
#[derive(Debug, Clone)]
pub struct ChaosReplicaConfig {
    /// Probability of returning an error \[0.0, 1.0\].
    pub failure_rate: f64,
    /// Fixed latency injected before forwarding.
    pub latency: Duration,
    /// Random additional latency in \[0, jitter\].
    pub jitter: Duration,
}

impl Default for ChaosReplicaConfig {
    fn default() -> Self {
        Self {
            failure_rate: 0.0,
            latency: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }
}

/// A [`ReplicaClient`] wrapper that injects chaos (failures, latency, per-node blocks).
pub struct ChaosReplicaClient<R: ReplicaClient> {
    inner: Arc<R>,
    config: Arc<RwLock<ChaosReplicaConfig>>,
    /// Nodes that are explicitly marked as failed.
    failed_nodes: Arc<RwLock<HashSet<NodeAddr>>>,
}

impl<R: ReplicaClient> std::fmt::Debug for ChaosReplicaClient<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaosReplicaClient").finish_non_exhaustive()
    }
}

impl<R: ReplicaClient> ChaosReplicaClient<R> {
    pub fn new(inner: R, config: ChaosReplicaConfig) -> Self {
        Self {
            inner: Arc::new(inner),
            config: Arc::new(RwLock::new(config)),
            failed_nodes: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Mark a node as permanently failed (until recovered).
    pub async fn fail_node(&self, node: &NodeAddr) {
        self.failed_nodes.write().await.insert(node.clone());
    }

    /// Remove a node from the failed set.
    pub async fn recover_node(&self, node: &NodeAddr) {
        self.failed_nodes.write().await.remove(node);
    }

    pub async fn is_failed(&self, node: &NodeAddr) -> bool {
        self.failed_nodes.read().await.contains(node)
    }

    /// The wrapped client, bypassing chaos.
    pub fn inner(&self) -> &Arc<R> {
        &self.inner
    }

    /// Dynamically update the random failure rate.
    pub async fn set_failure_rate(&self, rate: f64) {
        self.config.write().await.failure_rate = rate;
    }

    /// Apply chaos checks: returns Err if the request should fail.
    async fn maybe_fail(&self, target: &NodeAddr) -> Result<(), ReplicaError> {
        if self.is_failed(target).await {
            return Err(ReplicaError::RpcFailed(format!(
                "chaos: node {} marked as failed",
                target
            )));
        }

        // Read config
        let (delay, failure_rate) = {
            let config = self.config.read().await;
            let jitter_ms = if config.jitter.is_zero() {
                0
            } else {
                rand::thread_rng().gen_range(0..=config.jitter.as_millis() as u64)
            };
            let delay = config.latency + Duration::from_millis(jitter_ms);
            (delay, config.failure_rate)
        };

        // Inject latency
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        // Random failure
        if failure_rate > 0.0 && rand::thread_rng().gen_bool(failure_rate.min(1.0)) {
            return Err(ReplicaError::RpcFailed("chaos: random failure".into()));
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl<R: ReplicaClient> ReplicaClient for ChaosReplicaClient<R> {
    async fn probe(&self, target: &NodeAddr) -> Result<(), ReplicaError> {
        if self.is_failed(target).await {
            return Err(ReplicaError::RpcFailed("chaos: node marked as failed".into()));
        }
        self.inner.probe(target).await
    }

    async fn replica_put(
        &self,
        target: &NodeAddr,
        key: &str,
        versioned: &VersionedValue,
    ) -> Result<(), ReplicaError> {
        self.maybe_fail(target).await?;
        self.inner.replica_put(target, key, versioned).await
    }

    async fn replica_get(
        &self,
        target: &NodeAddr,
        key: &str,
    ) -> Result<Option<VersionedValue>, ReplicaError> {
        self.maybe_fail(target).await?;
        self.inner.replica_get(target, key).await
    }
}

// ────────────────────────── Tests ──────────────────────────
