//! Background task for delivering hinted-handoff hints.
//!
//! Periodically drains the hint queues of healthy nodes via `replica_put`.
//! The same pass backs the on-demand flush exposed by the gateway.

use crate::health::HealthRegistry;
use crate::hint_store::HintStore;
use crate::replica_client::ReplicaClient;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Configuration for the hint delivery background task.
#[derive(Debug, Clone)]
pub struct HintDeliveryConfig {
    /// How often to check for undelivered hints.
    pub check_interval: Duration,
}

impl Default for HintDeliveryConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(2),
        }
    }
}

/// Accounting for one delivery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Hints delivered and dropped during this pass.
    pub delivered: usize,
    /// Hints still queued (for any node) when the pass ended.
    pub remaining: usize,
}

/// Spawn the background hint delivery task.
///
/// Returns a `JoinHandle` for the spawned task.
#[allow(clippy::needless_pass_by_value)] // config is moved into the spawned task
pub fn spawn_hint_delivery_task<R: ReplicaClient>(
    hint_store: Arc<HintStore>,
    health: Arc<HealthRegistry>,
    replica_client: Arc<R>,
    config: HintDeliveryConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(config.check_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            deliver_hints(&hint_store, &health, replica_client.as_ref()).await;
        }
    })
}

/// One delivery pass over every queue.
///
/// For each target currently marked healthy, at most the queue's length at
/// the start of its turn is attempted, oldest first: delivered hints are
/// dropped, failed ones go back to the tail. A stuck node therefore costs
/// one bounded pass and cannot starve the others. Unhealthy targets are left
/// alone. Concurrent callers are serialised, so a manual flush racing the
/// background cycle never delivers a hint twice.
pub async fn deliver_hints<R: ReplicaClient>(
    hint_store: &HintStore,
    health: &HealthRegistry,
    replica_client: &R,
) -> DeliveryReport {
    let _pass = hint_store.lock_delivery().await;
    let m = quorumkv_metrics::metrics();

    let mut delivered = 0usize;

    for target in hint_store.all_target_nodes() {
        if !health.is_healthy(&target) {
            tracing::debug!(
                "hint target {} is down, leaving {} hint(s) queued",
                target,
                hint_store.pending_count(&target)
            );
            continue;
        }

        let budget = hint_store.pending_count(&target);
        let mut failed = 0usize;

        for _ in 0..budget {
            let Some(hint) = hint_store.pop_front(&target) else {
                break;
            };

            match replica_client
                .replica_put(&target, &hint.key, &hint.versioned)
                .await
            {
                Ok(()) => {
                    delivered += 1;
                    m.hints_delivered.inc();
                    tracing::debug!("delivered hint for key '{}' to node {}", hint.key, target);
                }
                Err(e) => {
                    failed += 1;
                    m.hints_requeued.inc();
                    tracing::debug!(
                        "hint delivery of key '{}' to {} failed: {}, re-queued",
                        hint.key,
                        target,
                        e
                    );
                    hint_store.push_back(hint);
                }
            }
        }

        if failed > 0 {
            tracing::warn!("{} hint(s) for {} could not be delivered", failed, target);
        }
        hint_store.remove_if_empty(&target);
    }

    let remaining = hint_store.hint_count();
    m.hints_pending.set(remaining as i64);

    if delivered > 0 {
        tracing::info!(
            "hint delivery pass: delivered {} hint(s), {} remaining",
            delivered,
            remaining
        );
    }

    DeliveryReport {
        delivered,
        remaining,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
