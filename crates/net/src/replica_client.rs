//! HTTP client implementing `ReplicaClient`.
//!
//! `HttpReplicaClient` talks to the node surface served by
//! [`crate::node_server`] and translates HTTP outcomes into the domain
//! `VersionedValue` / `ReplicaError` types.

use quorumkv_common::{NodeAddr, VersionedValue};
use quorumkv_kv::replica_client::{ReplicaClient, ReplicaError};
use reqwest::StatusCode;
use std::time::Duration;

/// A reqwest-based replica transport.
///
/// One pooled `reqwest::Client` is shared by every call; each request is
/// bounded by the configured timeout.
#[derive(Debug, Clone)]
pub struct HttpReplicaClient {
    http: reqwest::Client,
    probe_timeout: Duration,
}

impl HttpReplicaClient {
    pub fn new(rpc_timeout: Duration, probe_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(rpc_timeout).build()?;
        Ok(Self {
            http,
            probe_timeout,
        })
    }
}

fn transport_error(e: reqwest::Error) -> ReplicaError {
    if e.is_timeout() {
        ReplicaError::Timeout
    } else {
        ReplicaError::RpcFailed(e.to_string())
    }
}

fn record<T>(rpc_type: &str, result: Result<T, ReplicaError>) -> Result<T, ReplicaError> {
    if result.is_err() {
        quorumkv_metrics::metrics()
            .rpc_failures_by_type
            .with_label_values(&[rpc_type])
            .inc();
    }
    result
}

#[async_trait::async_trait]
impl ReplicaClient for HttpReplicaClient {
    async fn probe(&self, target: &NodeAddr) -> Result<(), ReplicaError> {
        let _timer = quorumkv_metrics::start_rpc_timer("probe");
        let result = async {
            let resp = self
                .http
                .get(target.url("/health"))
                .timeout(self.probe_timeout)
                .send()
                .await
                .map_err(transport_error)?;
            if !resp.status().is_success() {
                return Err(ReplicaError::BadStatus {
                    node: target.clone(),
                    status: resp.status().as_u16(),
                });
            }
            Ok(())
        }
        .await;
        record("probe", result)
    }

    async fn replica_put(
        &self,
        target: &NodeAddr,
        key: &str,
        versioned: &VersionedValue,
    ) -> Result<(), ReplicaError> {
        let _timer = quorumkv_metrics::start_rpc_timer("replica_put");
        let result = async {
            let version = versioned.version.to_string();
            let resp = self
                .http
                .put(target.url("/put"))
                .query(&[
                    ("key", key),
                    ("value", versioned.value.as_str()),
                    ("version", version.as_str()),
                ])
                .send()
                .await
                .map_err(transport_error)?;
            if !resp.status().is_success() {
                return Err(ReplicaError::BadStatus {
                    node: target.clone(),
                    status: resp.status().as_u16(),
                });
            }
            Ok(())
        }
        .await;
        record("replica_put", result)
    }

    async fn replica_get(
        &self,
        target: &NodeAddr,
        key: &str,
    ) -> Result<Option<VersionedValue>, ReplicaError> {
        let _timer = quorumkv_metrics::start_rpc_timer("replica_get");
        let result = async {
            let resp = self
                .http
                .get(target.url("/get"))
                .query(&[("key", key)])
                .send()
                .await
                .map_err(transport_error)?;
            match resp.status() {
                StatusCode::NOT_FOUND => Ok(None),
                status if status.is_success() => resp
                    .json::<VersionedValue>()
                    .await
                    .map(Some)
                    .map_err(|e| ReplicaError::RpcFailed(format!("bad get body: {}", e))),
                status => Err(ReplicaError::BadStatus {
                    node: target.clone(),
                    status: status.as_u16(),
                }),
            }
        }
        .await;
        record("replica_get", result)
    }
}
