//! quorumkv-node: entry point for a storage node.
//!
//! Loads config, opens an in-memory storage engine with its read cache and
//! serves the node HTTP surface on the configured listen address.

use anyhow::Context;
use quorumkv_config::StoreNodeConfig;
use quorumkv_storage::StorageEngine;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

const DEFAULT_CONFIG: &str = "listen: \"127.0.0.1:8081\"\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    quorumkv_metrics::init_tracing();

    // Load config: first CLI arg is the YAML config path
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "node.yaml".to_string());

    let config: StoreNodeConfig =
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

    let engine = Arc::new(Mutex::new(StorageEngine::new(config.cache_capacity)));
    let router = quorumkv_net::node_router(engine);

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    tracing::info!(
        "storage node listening on {} (cache capacity {})",
        config.listen,
        config.cache_capacity
    );

    quorumkv_net::serve(listener, router, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {}", e);
        }
        tracing::info!("received Ctrl+C, shutting down");
    })
    .await?;

    Ok(())
}
