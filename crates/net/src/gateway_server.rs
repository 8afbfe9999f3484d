//! HTTP surface of the gateway.
//!
//! Thin adapters from query strings to [`KvCoordinator`] calls; every
//! coordinator error maps to a status code with a JSON body carrying the
//! per-node detail.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use quorumkv_kv::coordinator::{KvCoordinator, KvError, ReadOutcome, WriteOutcome};
use quorumkv_kv::hint_delivery::DeliveryReport;
use quorumkv_kv::replica_client::ReplicaClient;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct PutParams {
    pub key: String,
    pub value: String,
    pub w: Option<i64>,
    pub version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct GetParams {
    pub key: String,
    pub r: Option<i64>,
    pub repair: Option<bool>,
}

/// Build the gateway router around a shared coordinator.
pub fn gateway_router<R: ReplicaClient>(coordinator: Arc<KvCoordinator<R>>) -> Router {
    Router::new()
        .route("/put", put(put_value::<R>).post(put_value::<R>))
        .route("/get", get(get_value::<R>))
        .route("/cluster/health", get(cluster_health::<R>))
        .route("/handoff/pending", get(pending_hints::<R>))
        .route("/handoff/flush", post(flush_hints::<R>))
        .with_state(coordinator)
}

async fn put_value<R: ReplicaClient>(
    State(kv): State<Arc<KvCoordinator<R>>>,
    params: Result<Query<PutParams>, QueryRejection>,
) -> Result<Json<WriteOutcome>, ApiError> {
    let Query(params) = params?;
    check_key(&params.key)?;
    let outcome = kv
        .put(&params.key, params.value, params.version, quorum_param(params.w))
        .await?;
    Ok(Json(outcome))
}

async fn get_value<R: ReplicaClient>(
    State(kv): State<Arc<KvCoordinator<R>>>,
    params: Result<Query<GetParams>, QueryRejection>,
) -> Result<Json<ReadOutcome>, ApiError> {
    let Query(params) = params?;
    check_key(&params.key)?;
    let outcome = kv
        .get(&params.key, quorum_param(params.r), params.repair)
        .await?;
    Ok(Json(outcome))
}

async fn cluster_health<R: ReplicaClient>(
    State(kv): State<Arc<KvCoordinator<R>>>,
) -> Json<BTreeMap<String, bool>> {
    Json(kv.cluster_health())
}

async fn pending_hints<R: ReplicaClient>(
    State(kv): State<Arc<KvCoordinator<R>>>,
) -> Json<BTreeMap<String, usize>> {
    Json(kv.pending_hints())
}

async fn flush_hints<R: ReplicaClient>(
    State(kv): State<Arc<KvCoordinator<R>>>,
) -> Json<DeliveryReport> {
    Json(kv.flush_hints().await)
}

/// Quorum sizes below one are raised to one; the coordinator caps at N.
fn quorum_param(requested: Option<i64>) -> Option<usize> {
    requested.map(|q| usize::try_from(q.max(1)).unwrap_or(usize::MAX))
}

fn check_key(key: &str) -> Result<(), ApiError> {
    if key.is_empty() {
        return Err(ApiError::BadRequest("key must not be empty".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Kv(KvError),
}

impl From<KvError> for ApiError {
    fn from(e: KvError) -> Self {
        ApiError::Kv(e)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Kv(e) => {
                let error = e.to_string();
                match e {
                    KvError::InsufficientReplicas { needed, healthy, .. } => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        json!({ "error": error, "needed": needed, "healthy": healthy }),
                    ),
                    KvError::WriteQuorumNotReached { needed, outcome } => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({ "error": error, "needed": needed, "outcome": outcome }),
                    ),
                    KvError::ReadQuorumNotReached {
                        needed,
                        got,
                        responded,
                        failed,
                    } => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({
                            "error": error,
                            "needed": needed,
                            "got": got,
                            "responded": responded,
                            "failed": failed,
                        }),
                    ),
                    KvError::NotFound => (StatusCode::NOT_FOUND, json!({ "error": error })),
                }
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quorum_param_raises_non_positive() {
        assert_eq!(quorum_param(None), None);
        assert_eq!(quorum_param(Some(-1)), Some(1));
        assert_eq!(quorum_param(Some(0)), Some(1));
        assert_eq!(quorum_param(Some(3)), Some(3));
    }
}
