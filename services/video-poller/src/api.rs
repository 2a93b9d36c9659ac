//! Read-only video API
//!
//! Public listener surface: list stored videos newest-first, fetch one by
//! id, health, and Prometheus metrics. Nothing on this listener mutates
//! state — key management lives on the separate admin port.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;

use youtube_pool::KeyPool;

use crate::store::VideoStore;

/// Default page size for the list endpoint.
const DEFAULT_LIST_LIMIT: usize = 50;
/// Upper bound a caller-provided limit is clamped to.
const MAX_LIST_LIMIT: usize = 500;

/// Shared application state accessible from all public handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: KeyPool,
    pub videos: Arc<VideoStore>,
    pub prometheus: PrometheusHandle,
}

/// Build the public axum router.
///
/// Applies a concurrency limit layer based on `max_connections`.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/videos", get(list_videos))
        .route("/videos/{id}", get(get_video))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[derive(Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

/// GET /videos — stored records ordered by publish time, newest first.
async fn list_videos(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);
    axum::Json(state.videos.list(limit).await)
}

/// GET /videos/{id} — a single record, or 404.
async fn get_video(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.videos.get(&id).await {
        Some(record) => axum::Json(record).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            serde_json::json!({ "error": "video not found" }).to_string(),
        )
            .into_response(),
    }
}

/// GET /health — pool health plus stored video count.
///
/// Returns 200 while at least one key is eligible, 503 once the pool can no
/// longer serve a fetch (no keys, or all parked).
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let pool = state.pool.health().await;
    let status_code = if state.pool.has_eligible().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = serde_json::json!({
        "status": pool["status"],
        "videos_stored": state.videos.len().await,
        "pool": pool,
    });

    (
        status_code,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint — returns metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}
