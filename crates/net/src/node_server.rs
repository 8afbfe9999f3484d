//! HTTP surface of a storage node.
//!
//! `GET /health`, `PUT /put?key=&value=&version=`, `GET /get?key=`,
//! `DELETE /delete?key=`, all backed by one shared [`StorageEngine`].

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use quorumkv_common::VersionedValue;
use quorumkv_storage::{PutOutcome, StorageEngine};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SharedEngine = Arc<Mutex<StorageEngine>>;

#[derive(Debug, Deserialize)]
pub struct PutParams {
    pub key: String,
    pub value: String,
    /// Defaults to the node's wall clock.
    pub version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct KeyParams {
    pub key: String,
}

/// Build the node's router over `engine`.
pub fn node_router(engine: SharedEngine) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/put", put(put_value).post(put_value))
        .route("/get", get(get_value))
        .route("/delete", delete(delete_value))
        .with_state(engine)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "UP" }))
}

async fn put_value(
    State(engine): State<SharedEngine>,
    Query(params): Query<PutParams>,
) -> Json<VersionedValue> {
    let outcome = engine
        .lock()
        .await
        .put(&params.key, params.value, params.version);
    if let PutOutcome::Superseded(current) = &outcome {
        tracing::debug!(
            "ignored put of '{}': stored v{} is newer",
            params.key,
            current.version
        );
    }
    Json(outcome.into_stored())
}

async fn get_value(
    State(engine): State<SharedEngine>,
    Query(params): Query<KeyParams>,
) -> Result<Json<VersionedValue>, (StatusCode, &'static str)> {
    engine
        .lock()
        .await
        .get(&params.key)
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Key not found"))
}

async fn delete_value(
    State(engine): State<SharedEngine>,
    Query(params): Query<KeyParams>,
) -> (StatusCode, &'static str) {
    if engine.lock().await.delete(&params.key) {
        (StatusCode::OK, "Deleted")
    } else {
        (StatusCode::NOT_FOUND, "Key not found")
    }
}
