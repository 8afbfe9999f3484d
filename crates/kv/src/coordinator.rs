//! KV coordinator: serves gateway PUT/GET by driving the replicas of a key.
//!
//! The coordinator:
//! 1. Maps a key to its ordered replica set (via placement)
//! 2. Filters the set through the health registry
//! 3. Writes sequentially until W acks, hinting every replica it skips
//! 4. Reads sequentially until R responses, picking the highest version
//! 5. Optionally repairs stale responders in the background

use crate::health::HealthRegistry;
use crate::hint_delivery::{deliver_hints, DeliveryReport};
use crate::hint_store::HintStore;
use crate::placement::ConsistentHashRouter;
use crate::replica_client::ReplicaClient;
use quorumkv_common::{now_ms, NodeAddr, VersionedValue};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Quorum and replication configuration.
#[derive(Debug, Clone)]
pub struct QuorumConfig {
    /// Replication factor (N).
    pub n: usize,
    /// Default write quorum (W).
    pub default_w: usize,
    /// Default read quorum (R).
    pub default_r: usize,
    /// Whether reads repair stale replicas unless the caller says otherwise.
    pub read_repair: bool,
    /// Whether to store hints for replicas a write did not reach.
    pub hinted_handoff: bool,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            n: 3,
            default_w: 2,
            default_r: 2,
            read_repair: true,
            hinted_handoff: true,
        }
    }
}

/// Per-replica accounting for a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub key: String,
    pub version: u64,
    /// Effective write quorum after clamping.
    pub w: usize,
    /// Replicas that acknowledged the write.
    pub written: Vec<NodeAddr>,
    /// Replicas covered by a queued hint instead.
    pub hinted: Vec<NodeAddr>,
    /// Replicas whose write attempt failed (also hinted).
    pub failed: Vec<NodeAddr>,
}

/// Result of a successful read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadOutcome {
    pub key: String,
    pub value: String,
    pub version: u64,
    /// Replica the winning value came from.
    pub source: NodeAddr,
    /// Effective read quorum after clamping.
    pub r: usize,
    /// Replicas that answered, in scan order.
    pub responded: Vec<NodeAddr>,
    /// Replicas scheduled for read repair.
    pub repaired: Vec<NodeAddr>,
}

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("{op} needs {needed} healthy replica(s), only {} available", .healthy.len())]
    InsufficientReplicas {
        op: &'static str,
        needed: usize,
        healthy: Vec<NodeAddr>,
    },
    #[error("write quorum not reached: need {needed}, got {}", .outcome.written.len())]
    WriteQuorumNotReached { needed: usize, outcome: WriteOutcome },
    #[error("read quorum not reached: need {needed}, got {got}")]
    ReadQuorumNotReached {
        needed: usize,
        got: usize,
        responded: Vec<NodeAddr>,
        failed: Vec<NodeAddr>,
    },
    #[error("key not found")]
    NotFound,
}

/// Replication coordinator for the gateway.
///
/// Generic over `R: ReplicaClient` for testability: the gateway uses
/// `HttpReplicaClient`, unit tests use in-memory fakes.
pub struct KvCoordinator<R: ReplicaClient> {
    router: ConsistentHashRouter,
    health: Arc<HealthRegistry>,
    hints: Arc<HintStore>,
    client: Arc<R>,
    config: QuorumConfig,
}

impl<R: ReplicaClient> std::fmt::Debug for KvCoordinator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvCoordinator")
            .field("nodes", &self.router.nodes())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<R: ReplicaClient> KvCoordinator<R> {
    pub fn new(
        router: ConsistentHashRouter,
        health: Arc<HealthRegistry>,
        hints: Arc<HintStore>,
        client: Arc<R>,
        config: QuorumConfig,
    ) -> Self {
        Self {
            router,
            health,
            hints,
            client,
            config,
        }
    }

    pub fn router(&self) -> &ConsistentHashRouter {
        &self.router
    }

    pub fn health(&self) -> &Arc<HealthRegistry> {
        &self.health
    }

    pub fn hint_store(&self) -> &Arc<HintStore> {
        &self.hints
    }

    pub fn client(&self) -> &Arc<R> {
        &self.client
    }

    pub fn config(&self) -> &QuorumConfig {
        &self.config
    }

    /// Replication factor actually achievable with the configured nodes.
    pub fn effective_n(&self) -> usize {
        self.config.n.min(self.router.node_count())
    }

    // -----------------------------------------------------------------------
    // PUT
    // -----------------------------------------------------------------------

    /// Write `value` to the key's replicas and wait for `w` acks.
    ///
    /// `version` defaults to the current wall clock in milliseconds; `w`
    /// defaults to the configured write quorum and is clamped to `[1, N]`.
    /// Partial writes are never rolled back.
    pub async fn put(
        &self,
        key: &str,
        value: impl Into<String>,
        version: Option<u64>,
        w: Option<usize>,
    ) -> Result<WriteOutcome, KvError> {
        let m = quorumkv_metrics::metrics();
        let _timer = quorumkv_metrics::start_kv_timer("put");
        m.kv_puts.inc();

        let n = self.effective_n();
        let w = clamp_quorum(w, self.config.default_w, n);
        let versioned = VersionedValue::new(value, version.unwrap_or_else(now_ms));
        let replicas = self.router.replicas_for(key, n);

        let healthy = self.health.healthy_subset(&replicas);
        if healthy.len() < w {
            m.quorum_failures
                .with_label_values(&["put", "insufficient_replicas"])
                .inc();
            tracing::warn!(
                "write of '{}' rejected: need {} healthy replica(s), have {}",
                key,
                w,
                healthy.len()
            );
            return Err(KvError::InsufficientReplicas {
                op: "write",
                needed: w,
                healthy,
            });
        }

        let mut outcome = WriteOutcome {
            key: key.to_string(),
            version: versioned.version,
            w,
            written: Vec::with_capacity(w),
            hinted: Vec::new(),
            failed: Vec::new(),
        };

        for target in &replicas {
            if outcome.written.len() >= w || !self.health.is_healthy(target) {
                self.queue_hint(target, key, &versioned, &mut outcome);
                continue;
            }

            match self.client.replica_put(target, key, &versioned).await {
                Ok(()) => outcome.written.push(target.clone()),
                Err(e) => {
                    tracing::warn!("write of '{}' to {} failed: {}", key, target, e);
                    self.health.mark_down(target);
                    outcome.failed.push(target.clone());
                    self.queue_hint(target, key, &versioned, &mut outcome);
                }
            }
        }

        if !outcome.hinted.is_empty() {
            m.hints_pending.set(self.hints.hint_count() as i64);
            tracing::debug!(
                "stored {} hint(s) for key '{}'",
                outcome.hinted.len(),
                key
            );
        }

        if outcome.written.len() < w {
            m.quorum_failures
                .with_label_values(&["put", "quorum_not_reached"])
                .inc();
            tracing::warn!(
                "write quorum for '{}' not reached: {}/{}",
                key,
                outcome.written.len(),
                w
            );
            return Err(KvError::WriteQuorumNotReached {
                needed: w,
                outcome,
            });
        }

        tracing::debug!(
            "write of '{}' v{} acked by {}/{} replica(s)",
            key,
            outcome.version,
            outcome.written.len(),
            replicas.len()
        );
        Ok(outcome)
    }

    fn queue_hint(
        &self,
        target: &NodeAddr,
        key: &str,
        versioned: &VersionedValue,
        outcome: &mut WriteOutcome,
    ) {
        if !self.config.hinted_handoff {
            return;
        }
        self.hints.store_hint(target, key, versioned);
        outcome.hinted.push(target.clone());
    }

    // -----------------------------------------------------------------------
    // GET
    // -----------------------------------------------------------------------

    /// Read a key from `r` healthy replicas and return the latest version.
    ///
    /// `repair` overrides the configured read-repair setting for this call.
    /// A replica answering "not found" counts toward `r` as an empty read and
    /// is not marked down.
    pub async fn get(
        &self,
        key: &str,
        r: Option<usize>,
        repair: Option<bool>,
    ) -> Result<ReadOutcome, KvError> {
        let m = quorumkv_metrics::metrics();
        let _timer = quorumkv_metrics::start_kv_timer("get");
        m.kv_gets.inc();

        let n = self.effective_n();
        let r = clamp_quorum(r, self.config.default_r, n);
        let replicas = self.router.replicas_for(key, n);

        let healthy = self.health.healthy_subset(&replicas);
        if healthy.len() < r {
            m.quorum_failures
                .with_label_values(&["get", "insufficient_replicas"])
                .inc();
            tracing::warn!(
                "read of '{}' rejected: need {} healthy replica(s), have {}",
                key,
                r,
                healthy.len()
            );
            return Err(KvError::InsufficientReplicas {
                op: "read",
                needed: r,
                healthy,
            });
        }

        let mut responses: Vec<(NodeAddr, Option<VersionedValue>)> = Vec::with_capacity(r);
        let mut failed = Vec::new();

        for target in &healthy {
            if responses.len() >= r {
                break;
            }
            match self.client.replica_get(target, key).await {
                Ok(value) => responses.push((target.clone(), value)),
                Err(e) => {
                    tracing::warn!("read of '{}' from {} failed: {}", key, target, e);
                    self.health.mark_down(target);
                    failed.push(target.clone());
                }
            }
        }

        let responded: Vec<NodeAddr> = responses.iter().map(|(node, _)| node.clone()).collect();

        if responses.len() < r {
            m.quorum_failures
                .with_label_values(&["get", "quorum_not_reached"])
                .inc();
            tracing::warn!(
                "read quorum for '{}' not reached: {}/{}",
                key,
                responses.len(),
                r
            );
            return Err(KvError::ReadQuorumNotReached {
                needed: r,
                got: responses.len(),
                responded,
                failed,
            });
        }

        let Some((source, winner)) = pick_latest(&responses) else {
            return Err(KvError::NotFound);
        };
        let source = source.clone();
        let winner = winner.clone();

        let repaired = if repair.unwrap_or(self.config.read_repair) {
            stale_replicas(&responses, winner.version)
        } else {
            Vec::new()
        };
        if !repaired.is_empty() {
            self.spawn_read_repair(key.to_string(), winner.clone(), repaired.clone());
        }

        Ok(ReadOutcome {
            key: key.to_string(),
            value: winner.value,
            version: winner.version,
            source,
            r,
            responded,
            repaired,
        })
    }

    // -----------------------------------------------------------------------
    // Internal: read repair
    // -----------------------------------------------------------------------

    /// Push the winning value to stale replicas in the background. Failures
    /// are logged and dropped; the next read or hint pass gets another go.
    fn spawn_read_repair(&self, key: String, winner: VersionedValue, targets: Vec<NodeAddr>) {
        let client = self.client.clone();

        tokio::spawn(async move {
            for target in &targets {
                match client.replica_put(target, &key, &winner).await {
                    Ok(()) => {
                        quorumkv_metrics::metrics().read_repairs.inc();
                        tracing::debug!(
                            "read repair: wrote '{}' v{} to {}",
                            key,
                            winner.version,
                            target
                        );
                    }
                    Err(e) => {
                        tracing::debug!("read repair of '{}' on {} failed: {}", key, target, e);
                    }
                }
            }
        });
    }

    // -----------------------------------------------------------------------
    // Cluster views
    // -----------------------------------------------------------------------

    /// Run one hint delivery pass now.
    pub async fn flush_hints(&self) -> DeliveryReport {
        deliver_hints(&self.hints, &self.health, self.client.as_ref()).await
    }

    /// Up/down flag for every configured node.
    pub fn cluster_health(&self) -> BTreeMap<String, bool> {
        self.health.snapshot()
    }

    /// Pending hint count for every configured node.
    pub fn pending_hints(&self) -> BTreeMap<String, usize> {
        self.hints.pending_snapshot(self.router.nodes())
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

fn clamp_quorum(requested: Option<usize>, default: usize, n: usize) -> usize {
    requested.unwrap_or(default).clamp(1, n.max(1))
}

/// Highest version among the responses that carry a value. Ties go to the
/// earliest response.
pub fn pick_latest(
    responses: &[(NodeAddr, Option<VersionedValue>)],
) -> Option<(&NodeAddr, &VersionedValue)> {
    let mut best: Option<(&NodeAddr, &VersionedValue)> = None;
    for (node, value) in responses {
        let Some(value) = value else { continue };
        match best {
            Some((_, current)) if current.version >= value.version => {}
            _ => best = Some((node, value)),
        }
    }
    best
}

/// Responders that returned nothing or a strictly older version.
fn stale_replicas(
    responses: &[(NodeAddr, Option<VersionedValue>)],
    latest: u64,
) -> Vec<NodeAddr> {
    responses
        .iter()
        .filter(|(_, value)| value.as_ref().map_or(true, |v| v.version < latest))
        .map(|(node, _)| node.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replica_client::ReplicaError;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Duration;

    // -----------------------------------------------------------------------
    // In-memory ReplicaClient with call counters
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct MemReplicaClient {
        stores: Mutex<HashMap<NodeAddr, HashMap<String, VersionedValue>>>,
        failing: Mutex<HashSet<NodeAddr>>,
        put_calls: Mutex<Vec<NodeAddr>>,
        puts: AtomicUsize,
        gets: AtomicUsize,
    }

    impl MemReplicaClient {
        fn seed(&self, node: &NodeAddr, key: &str, versioned: VersionedValue) {
            self.stores
                .lock()
                .unwrap()
                .entry(node.clone())
                .or_default()
                .insert(key.to_string(), versioned);
        }

        fn stored(&self, node: &NodeAddr, key: &str) -> Option<VersionedValue> {
            self.stores
                .lock()
                .unwrap()
                .get(node)
                .and_then(|s| s.get(key).cloned())
        }

        fn fail(&self, node: &NodeAddr) {
            self.failing.lock().unwrap().insert(node.clone());
        }

        fn recover(&self, node: &NodeAddr) {
            self.failing.lock().unwrap().remove(node);
        }

        fn is_failing(&self, node: &NodeAddr) -> bool {
            self.failing.lock().unwrap().contains(node)
        }

        fn put_targets(&self) -> Vec<NodeAddr> {
            self.put_calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ReplicaClient for MemReplicaClient {
        async fn probe(&self, target: &NodeAddr) -> Result<(), ReplicaError> {
            if self.is_failing(target) {
                return Err(ReplicaError::RpcFailed("down".into()));
            }
            Ok(())
        }

        async fn replica_put(
            &self,
            target: &NodeAddr,
            key: &str,
            versioned: &VersionedValue,
        ) -> Result<(), ReplicaError> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.put_calls.lock().unwrap().push(target.clone());
            if self.is_failing(target) {
                return Err(ReplicaError::RpcFailed("connection refused".into()));
            }
            self.seed(target, key, versioned.clone());
            Ok(())
        }

        async fn replica_get(
            &self,
            target: &NodeAddr,
            key: &str,
        ) -> Result<Option<VersionedValue>, ReplicaError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.is_failing(target) {
                return Err(ReplicaError::RpcFailed("connection refused".into()));
            }
            Ok(self.stored(target, key))
        }
    }

    fn nodes(count: usize) -> Vec<NodeAddr> {
        (0..count)
            .map(|i| NodeAddr::new(format!("http://127.0.0.1:{}", 8081 + i)))
            .collect()
    }

    fn setup(config: QuorumConfig) -> (KvCoordinator<MemReplicaClient>, Arc<MemReplicaClient>) {
        let nodes = nodes(3);
        let client = Arc::new(MemReplicaClient::default());
        let coord = KvCoordinator::new(
            ConsistentHashRouter::new(nodes.clone()),
            Arc::new(HealthRegistry::new(nodes)),
            Arc::new(HintStore::new()),
            client.clone(),
            config,
        );
        (coord, client)
    }

    fn replicas(coord: &KvCoordinator<MemReplicaClient>, key: &str) -> Vec<NodeAddr> {
        coord.router().replicas_for(key, 3)
    }

    // -----------------------------------------------------------------------
    // Write path
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_write_all_healthy_acks_exactly_w() {
        let (coord, client) = setup(QuorumConfig::default());
        let reps = replicas(&coord, "k1");

        let outcome = coord.put("k1", "v1", None, None).await.unwrap();
        assert_eq!(outcome.w, 2);
        assert_eq!(outcome.written, reps[..2].to_vec());
        assert_eq!(client.puts.load(Ordering::SeqCst), 2);
        // The replica past the quorum is covered by a hint, not a call.
        assert_eq!(outcome.hinted, vec![reps[2].clone()]);
        assert_eq!(coord.hint_store().pending_count(&reps[2]), 1);
        assert!(outcome.failed.is_empty());
    }

    #[tokio::test]
    async fn test_write_fails_fast_without_calls() {
        let (coord, client) = setup(QuorumConfig::default());
        let reps = replicas(&coord, "k1");
        coord.health().mark_down(&reps[0]);
        coord.health().mark_down(&reps[1]);

        let err = coord.put("k1", "v1", None, None).await.unwrap_err();
        match err {
            KvError::InsufficientReplicas {
                op,
                needed,
                healthy,
            } => {
                assert_eq!(op, "write");
                assert_eq!(needed, 2);
                assert_eq!(healthy, vec![reps[2].clone()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(client.puts.load(Ordering::SeqCst), 0);
        assert_eq!(coord.hint_store().hint_count(), 0);
    }

    #[tokio::test]
    async fn test_write_hints_unhealthy_replica_without_calling_it() {
        let (coord, client) = setup(QuorumConfig::default());
        let reps = replicas(&coord, "k1");
        coord.health().mark_down(&reps[0]);

        let outcome = coord.put("k1", "v1", None, None).await.unwrap();
        assert_eq!(outcome.written, vec![reps[1].clone(), reps[2].clone()]);
        assert_eq!(outcome.hinted, vec![reps[0].clone()]);
        assert_eq!(coord.hint_store().pending_count(&reps[0]), 1);
        assert!(!client.put_targets().contains(&reps[0]));
    }

    #[tokio::test]
    async fn test_write_failure_demotes_and_hints() {
        let (coord, client) = setup(QuorumConfig::default());
        let reps = replicas(&coord, "k1");
        client.fail(&reps[1]);

        let outcome = coord.put("k1", "v1", None, Some(3)).await;
        let Err(KvError::WriteQuorumNotReached { needed, outcome }) = outcome else {
            panic!("expected WriteQuorumNotReached");
        };
        assert_eq!(needed, 3);
        assert_eq!(outcome.written, vec![reps[0].clone(), reps[2].clone()]);
        assert_eq!(outcome.failed, vec![reps[1].clone()]);
        assert_eq!(outcome.hinted, vec![reps[1].clone()]);
        assert!(!coord.health().is_healthy(&reps[1]));
        // No rollback.
        assert!(client.stored(&reps[0], "k1").is_some());
    }

    #[tokio::test]
    async fn test_write_failure_still_reaches_quorum() {
        let (coord, client) = setup(QuorumConfig::default());
        let reps = replicas(&coord, "k1");
        client.fail(&reps[0]);

        let outcome = coord.put("k1", "v1", None, None).await.unwrap();
        assert_eq!(outcome.written, vec![reps[1].clone(), reps[2].clone()]);
        assert_eq!(outcome.failed, vec![reps[0].clone()]);
        assert_eq!(client.puts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_write_quorum_clamped() {
        let (coord, client) = setup(QuorumConfig::default());

        let outcome = coord.put("k1", "v1", None, Some(10)).await.unwrap();
        assert_eq!(outcome.w, 3);
        assert_eq!(outcome.written.len(), 3);

        let outcome = coord.put("k2", "v2", None, Some(0)).await.unwrap();
        assert_eq!(outcome.w, 1);
        assert_eq!(outcome.written.len(), 1);
        assert_eq!(client.puts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_write_uses_supplied_version() {
        let (coord, client) = setup(QuorumConfig::default());
        let reps = replicas(&coord, "k1");

        let outcome = coord.put("k1", "v1", Some(42), None).await.unwrap();
        assert_eq!(outcome.version, 42);
        assert_eq!(client.stored(&reps[0], "k1"), Some(VersionedValue::new("v1", 42)));

        let before = now_ms();
        let outcome = coord.put("k1", "v2", None, None).await.unwrap();
        assert!(outcome.version >= before);
    }

    #[tokio::test]
    async fn test_write_without_handoff_queues_nothing() {
        let (coord, _client) = setup(QuorumConfig {
            hinted_handoff: false,
            ..QuorumConfig::default()
        });
        let reps = replicas(&coord, "k1");
        coord.health().mark_down(&reps[0]);

        let outcome = coord.put("k1", "v1", None, None).await.unwrap();
        assert!(outcome.hinted.is_empty());
        assert_eq!(coord.hint_store().hint_count(), 0);
    }

    // -----------------------------------------------------------------------
    // Read path
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_write_then_read() {
        let (coord, _client) = setup(QuorumConfig::default());
        coord.put("user:1", "alice", None, None).await.unwrap();

        let read = coord.get("user:1", None, None).await.unwrap();
        assert_eq!(read.value, "alice");
        assert_eq!(read.r, 2);
        assert_eq!(read.responded.len(), 2);
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let (coord, _client) = setup(QuorumConfig::default());
        assert!(matches!(
            coord.get("missing", None, None).await,
            Err(KvError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_read_fails_fast_without_calls() {
        let (coord, client) = setup(QuorumConfig::default());
        let reps = replicas(&coord, "k1");
        coord.health().mark_down(&reps[1]);
        coord.health().mark_down(&reps[2]);

        let err = coord.get("k1", None, None).await.unwrap_err();
        assert!(matches!(
            err,
            KvError::InsufficientReplicas {
                op: "read",
                needed: 2,
                ..
            }
        ));
        assert_eq!(client.gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_read_skips_failed_replica_and_demotes() {
        let (coord, client) = setup(QuorumConfig::default());
        let reps = replicas(&coord, "k1");
        for node in &reps {
            client.seed(node, "k1", VersionedValue::new("v", 1));
        }
        client.fail(&reps[0]);

        let read = coord.get("k1", None, None).await.unwrap();
        assert_eq!(read.responded, vec![reps[1].clone(), reps[2].clone()]);
        assert!(!coord.health().is_healthy(&reps[0]));
    }

    #[tokio::test]
    async fn test_read_quorum_not_reached() {
        let (coord, client) = setup(QuorumConfig::default());
        let reps = replicas(&coord, "k1");
        client.fail(&reps[2]);

        let err = coord.get("k1", Some(3), None).await.unwrap_err();
        let KvError::ReadQuorumNotReached {
            needed,
            got,
            responded,
            failed,
        } = err
        else {
            panic!("expected ReadQuorumNotReached");
        };
        assert_eq!(needed, 3);
        assert_eq!(got, 2);
        assert_eq!(responded, reps[..2].to_vec());
        assert_eq!(failed, vec![reps[2].clone()]);
    }

    #[tokio::test]
    async fn test_read_repair_rewrites_stale_replicas() {
        let (coord, client) = setup(QuorumConfig::default());
        let reps = replicas(&coord, "k1");
        client.seed(&reps[0], "k1", VersionedValue::new("old", 5));
        client.seed(&reps[1], "k1", VersionedValue::new("new", 9));
        client.seed(&reps[2], "k1", VersionedValue::new("old", 5));

        let read = coord.get("k1", Some(3), None).await.unwrap();
        assert_eq!(read.value, "new");
        assert_eq!(read.version, 9);
        assert_eq!(read.source, reps[1]);
        assert_eq!(read.repaired, vec![reps[0].clone(), reps[2].clone()]);

        tokio::time::sleep(Duration::from_millis(50)).await;
        for node in &reps {
            assert_eq!(client.stored(node, "k1"), Some(VersionedValue::new("new", 9)));
        }
        assert!(!client.put_targets().contains(&reps[1]));
    }

    #[tokio::test]
    async fn test_read_without_repair_never_writes() {
        let (coord, client) = setup(QuorumConfig::default());
        let reps = replicas(&coord, "k1");
        client.seed(&reps[0], "k1", VersionedValue::new("old", 5));
        client.seed(&reps[1], "k1", VersionedValue::new("new", 9));
        client.seed(&reps[2], "k1", VersionedValue::new("old", 5));

        let read = coord.get("k1", Some(3), Some(false)).await.unwrap();
        assert_eq!(read.version, 9);
        assert!(read.repaired.is_empty());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(client.puts.load(Ordering::SeqCst), 0);
        assert_eq!(client.stored(&reps[0], "k1").unwrap().version, 5);
        assert_eq!(client.stored(&reps[2], "k1").unwrap().version, 5);
    }

    #[tokio::test]
    async fn test_read_repair_fills_absent_replica() {
        let (coord, client) = setup(QuorumConfig::default());
        let reps = replicas(&coord, "k1");
        client.seed(&reps[0], "k1", VersionedValue::new("v", 3));

        let read = coord.get("k1", None, None).await.unwrap();
        assert_eq!(read.repaired, vec![reps[1].clone()]);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(client.stored(&reps[1], "k1"), Some(VersionedValue::new("v", 3)));
    }

    #[tokio::test]
    async fn test_read_repair_config_off_by_default_override() {
        let (coord, client) = setup(QuorumConfig {
            read_repair: false,
            ..QuorumConfig::default()
        });
        let reps = replicas(&coord, "k1");
        client.seed(&reps[0], "k1", VersionedValue::new("v", 3));

        let read = coord.get("k1", None, None).await.unwrap();
        assert!(read.repaired.is_empty());

        let read = coord.get("k1", None, Some(true)).await.unwrap();
        assert_eq!(read.repaired, vec![reps[1].clone()]);
    }

    #[test]
    fn test_pick_latest_tie_goes_to_first() {
        let a = NodeAddr::new("http://a");
        let b = NodeAddr::new("http://b");
        let c = NodeAddr::new("http://c");
        let responses = vec![
            (a.clone(), None),
            (b.clone(), Some(VersionedValue::new("first", 7))),
            (c.clone(), Some(VersionedValue::new("second", 7))),
        ];
        let (source, value) = pick_latest(&responses).unwrap();
        assert_eq!(source, &b);
        assert_eq!(value.value, "first");

        assert_eq!(stale_replicas(&responses, 7), vec![a]);
    }

    #[test]
    fn test_pick_latest_all_absent() {
        let responses = vec![(NodeAddr::new("http://a"), None)];
        assert!(pick_latest(&responses).is_none());
    }

    // -----------------------------------------------------------------------
    // Handoff through the coordinator
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_flush_delivers_after_recovery() {
        let (coord, client) = setup(QuorumConfig::default());
        let reps = replicas(&coord, "k1");
        coord.health().mark_down(&reps[0]);

        coord.put("k1", "v1", Some(7), None).await.unwrap();
        assert_eq!(coord.pending_hints()[reps[0].as_str()], 1);

        let report = coord.flush_hints().await;
        assert_eq!(report.delivered, 0);
        assert_eq!(report.remaining, 1);

        coord.health().mark_up(&reps[0]);
        let report = coord.flush_hints().await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.remaining, 0);
        assert_eq!(client.stored(&reps[0], "k1"), Some(VersionedValue::new("v1", 7)));
    }

    #[tokio::test]
    async fn test_flush_leaves_still_failing_hints() {
        let (coord, client) = setup(QuorumConfig::default());
        let reps = replicas(&coord, "k1");
        client.fail(&reps[0]);
        coord.put("k1", "v1", None, None).await.unwrap();

        // Health says up again, but the node still refuses writes.
        coord.health().mark_up(&reps[0]);
        let report = coord.flush_hints().await;
        assert_eq!(report.delivered, 0);
        assert_eq!(report.remaining, 1);
        assert_eq!(coord.hint_store().pending_count(&reps[0]), 1);

        client.recover(&reps[0]);
        assert_eq!(coord.flush_hints().await.remaining, 0);
    }

    #[tokio::test]
    async fn test_cluster_views_cover_every_node() {
        let (coord, _client) = setup(QuorumConfig::default());
        let health = coord.cluster_health();
        let pending = coord.pending_hints();
        assert_eq!(health.len(), 3);
        assert_eq!(pending.len(), 3);
        assert!(health.values().all(|up| *up));
        assert!(pending.values().all(|count| *count == 0));
    }
}
