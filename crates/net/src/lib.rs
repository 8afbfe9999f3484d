//! HTTP networking layer for quorumkv.
//!
//! Provides:
//! - `node_router`: the storage node's axum router over a `StorageEngine`
//! - `gateway_router`: the gateway's axum router over a `KvCoordinator`
//! - `HttpReplicaClient`: implements `ReplicaClient` over reqwest
//! - `serve`: runs a router on a bound listener until shutdown

pub mod gateway_server;
pub mod node_server;
pub mod replica_client;

pub use gateway_server::gateway_router;
pub use node_server::{node_router, SharedEngine};
pub use replica_client::HttpReplicaClient;

use std::future::Future;
use tokio::net::TcpListener;

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: axum::Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
