//! Admin API for key management
//!
//! Runs on a separate listener port so key management is never reachable
//! from the public address.
//!
//! Endpoints:
//! - GET    /admin/keys        — list keys with status (tokens redacted)
//! - POST   /admin/keys        — add one key, or re-arm an existing one
//! - POST   /admin/keys/load   — import from the YOUTUBE_API_KEYS env var
//! - POST   /admin/keys/reset  — clear quota flags on active keys
//! - DELETE /admin/keys        — delete all keys

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use tracing::{info, warn};

use youtube_keys::{KeyStore, redact};
use youtube_pool::KeyPool;

/// Env var holding a comma-separated list of API keys.
pub const KEYS_ENV_VAR: &str = "YOUTUBE_API_KEYS";

/// Shared state for admin API handlers.
#[derive(Clone)]
pub struct AdminState {
    pool: KeyPool,
}

impl AdminState {
    pub fn new(pool: KeyPool) -> Self {
        Self { pool }
    }
}

/// Build the admin axum router with all key management endpoints.
pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/keys", get(list_keys).post(add_key).delete(flush_keys))
        .route("/admin/keys/load", post(load_keys))
        .route("/admin/keys/reset", post(reset_keys))
        .with_state(state)
}

/// Import keys from the comma-separated env list into the store.
///
/// Existing keys are re-armed (active, quota flag cleared), matching the
/// add endpoint. Called by the load endpoint and once at startup. Returns
/// how many entries were imported.
pub async fn import_env_keys(store: &KeyStore) -> youtube_keys::Result<usize> {
    let raw = std::env::var(KEYS_ENV_VAR).unwrap_or_default();
    let mut imported = 0usize;
    for token in raw.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        store.upsert(token.to_string()).await?;
        imported += 1;
    }
    Ok(imported)
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response {
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

/// GET /admin/keys — list all keys with their state.
///
/// Tokens appear redacted only; the full token never leaves the store.
async fn list_keys(State(state): State<AdminState>) -> Response {
    let records = state.pool.store().records().await;
    let available = records
        .iter()
        .filter(|(_, record)| record.eligible())
        .count();

    let keys: Vec<serde_json::Value> = records
        .iter()
        .map(|(token, record)| {
            serde_json::json!({
                "key": redact(token),
                "active": record.active,
                "quota_exceeded": record.quota_exceeded,
                "last_used": record.last_used,
            })
        })
        .collect();

    json_response(
        StatusCode::OK,
        serde_json::json!({
            "total": records.len(),
            "available": available,
            "keys": keys,
        }),
    )
}

/// Request body for the add endpoint.
#[derive(Deserialize)]
struct AddKeyRequest {
    key: String,
}

/// POST /admin/keys — add a single key, or re-arm an existing one.
async fn add_key(
    State(state): State<AdminState>,
    axum::Json(body): axum::Json<AddKeyRequest>,
) -> Response {
    let token = body.key.trim().to_string();
    if token.is_empty() {
        return json_response(
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": "key must not be empty" }),
        );
    }

    match state.pool.store().upsert(token.clone()).await {
        Ok(created) => {
            info!(key = %redact(&token), created, "api key stored via admin");
            json_response(
                StatusCode::OK,
                serde_json::json!({
                    "key": redact(&token),
                    "status": if created { "added" } else { "updated" },
                }),
            )
        }
        Err(e) => {
            warn!(error = %e, "failed to store api key");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": format!("failed to store key: {e}") }),
            )
        }
    }
}

/// POST /admin/keys/load — import keys from the env var.
async fn load_keys(State(state): State<AdminState>) -> Response {
    match import_env_keys(state.pool.store()).await {
        Ok(loaded) => {
            info!(loaded, "imported api keys from environment");
            json_response(StatusCode::OK, serde_json::json!({ "loaded": loaded }))
        }
        Err(e) => {
            warn!(error = %e, "env key import failed");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": format!("import failed: {e}") }),
            )
        }
    }
}

/// POST /admin/keys/reset — clear quota flags on active keys.
async fn reset_keys(State(state): State<AdminState>) -> Response {
    match state.pool.reset_quota().await {
        Ok(reset) => json_response(StatusCode::OK, serde_json::json!({ "reset": reset })),
        Err(e) => {
            warn!(error = %e, "quota reset failed");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": format!("reset failed: {e}") }),
            )
        }
    }
}

/// DELETE /admin/keys — remove every key.
async fn flush_keys(State(state): State<AdminState>) -> Response {
    match state.pool.store().remove_all().await {
        Ok(deleted) => {
            info!(deleted, "flushed all api keys");
            json_response(StatusCode::OK, serde_json::json!({ "deleted": deleted }))
        }
        Err(e) => {
            warn!(error = %e, "key flush failed");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": format!("flush failed: {e}") }),
            )
        }
    }
}
