//! quorumkv-gateway: entry point for the replication gateway.
//!
//! Loads config, builds the router, health registry and hint store over the
//! configured node list, starts the health monitor and hint delivery tasks,
//! then serves the gateway HTTP surface.

use anyhow::Context;
use quorumkv_config::GatewayConfig;
use quorumkv_kv::coordinator::{KvCoordinator, QuorumConfig};
use quorumkv_kv::health::{spawn_health_monitor, HealthMonitorConfig, HealthRegistry};
use quorumkv_kv::hint_delivery::{spawn_hint_delivery_task, HintDeliveryConfig};
use quorumkv_kv::hint_store::HintStore;
use quorumkv_kv::placement::ConsistentHashRouter;
use quorumkv_net::HttpReplicaClient;
use std::sync::Arc;
use tokio::net::TcpListener;

const DEFAULT_CONFIG: &str = "\
listen: \"127.0.0.1:8080\"
nodes:
  - \"http://127.0.0.1:8081\"
  - \"http://127.0.0.1:8082\"
  - \"http://127.0.0.1:8083\"
";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    quorumkv_metrics::init_tracing();

    // Load config: first CLI arg is the YAML config path
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "gateway.yaml".to_string());

    let config: GatewayConfig =
        match quorumkv_config::load_from_file(std::path::Path::new(&config_path)) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    "failed to load config from {}: {}, using defaults",
                    config_path,
                    e
                );
                quorumkv_config::load_from_str(DEFAULT_CONFIG)?
            }
        };

    let replica_client = Arc::new(
        HttpReplicaClient::new(config.rpc_timeout(), config.health.probe_timeout())
            .context("building HTTP client")?,
    );
    let health = Arc::new(HealthRegistry::new(config.nodes.clone()));
    let hint_store = Arc::new(HintStore::new());

    let quorum_config = QuorumConfig {
        n: config.effective_n(),
        default_w: config.kv.w,
        default_r: config.kv.r,
        read_repair: config.kv.read_repair,
        hinted_handoff: config.kv.hinted_handoff,
    };
    let kv = Arc::new(KvCoordinator::new(
        ConsistentHashRouter::new(config.nodes.clone()),
        health.clone(),
        hint_store.clone(),
        replica_client.clone(),
        quorum_config,
    ));

    spawn_health_monitor(
        health.clone(),
        replica_client.clone(),
        HealthMonitorConfig {
            probe_interval: config.health.probe_interval(),
            probe_timeout: config.health.probe_timeout(),
        },
    );

    if config.kv.hinted_handoff {
        spawn_hint_delivery_task(
            hint_store,
            health,
            replica_client,
            HintDeliveryConfig {
                check_interval: config.handoff_interval(),
            },
        );
    }

    // Spawn metrics HTTP server if configured
    if let Some(metrics_port) = config.metrics_port {
        let metrics_addr = std::net::SocketAddr::from(([0, 0, 0, 0], metrics_port));
        tokio::spawn(async move {
            if let Err(e) = quorumkv_metrics::serve_metrics(metrics_addr).await {
                tracing::warn!("metrics server failed: {}", e);
            }
        });
    }

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    tracing::info!(
        "gateway listening on {} over {} node(s), N={} R={} W={}",
        config.listen,
        config.nodes.len(),
        config.effective_n(),
        config.kv.r,
        config.kv.w
    );

    quorumkv_net::serve(listener, quorumkv_net::gateway_router(kv), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {}", e);
        }
        tracing::info!("received Ctrl+C, shutting down");
    })
    .await?;

    Ok(())
}
