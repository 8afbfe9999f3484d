//! Abstraction over gateway-to-node calls.
//!
//! Concrete implementation lives in `quorumkv-net::replica_client`.

use quorumkv_common::{NodeAddr, VersionedValue};

#[derive(Debug, thiserror::Error)]
pub enum ReplicaError {
    #[error("RPC failed: {0}")]
    RpcFailed(String),
    #[error("unexpected status {status} from {node}")]
    BadStatus { node: NodeAddr, status: u16 },
    #[error("timeout")]
    Timeout,
}

/// Transport for the node store surface (`/health`, `/put`, `/get`).
///
/// A trait in the domain crate with an HTTP implementation in the `net`
/// crate; tests substitute in-memory fakes.
#[async_trait::async_trait]
pub trait ReplicaClient: Send + Sync + 'static {
    /// Liveness probe. `Ok` only for a 2xx answer.
    async fn probe(&self, target: &NodeAddr) -> Result<(), ReplicaError>;

    /// Store a versioned value on a node.
    async fn replica_put(
        &self,
        target: &NodeAddr,
        key: &str,
        versioned: &VersionedValue,
    ) -> Result<(), ReplicaError>;

    /// Fetch a key from a node. `Ok(None)` means the node answered and does
    /// not hold the key.
    async fn replica_get(
        &self,
        target: &NodeAddr,
        key: &str,
    ) -> Result<Option<VersionedValue>, ReplicaError>;
}
