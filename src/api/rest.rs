// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// The dashboard polls `GET /api/index-data`; every call runs one refresh
// cycle and answers `{ data, alerts }`, or HTTP 500 `{ error }` when the
// cycle could not produce a universe at all.
//
// Auxiliary endpoints read published state only and never trigger a cycle.
//
// CORS is fully permissive: the dashboard is served from another origin.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::app_state::AppState;
use crate::binance::rate_limit::RateLimitSnapshot;

// =============================================================================
// Router construction
// =============================================================================

/// Build the REST router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Dashboard ───────────────────────────────────────────────
        .route("/api/index-data", get(index_data))
        .route("/api/index-data/latest", get(latest_index_data))
        // ── Operational ─────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        .route("/api/v1/errors", get(recent_errors))
        // ── Middleware & State ──────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Index data
// =============================================================================

async fn index_data(State(state): State<Arc<AppState>>) -> Response {
    match state.refresh().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => {
            warn!(error = %e, "index-data request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn latest_index_data(State(state): State<Arc<AppState>>) -> Response {
    match state.latest_snapshot() {
        Some(snapshot) => Json(snapshot).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no snapshot published yet" })),
        )
            .into_response(),
    }
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
    last_cycle_at: Option<String>,
    uptime_secs: u64,
    refresh_interval_secs: u64,
    tracked_symbols: usize,
    rate_limit: RateLimitSnapshot,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
        last_cycle_at: state.last_cycle_at().map(|t| t.to_rfc3339()),
        uptime_secs: state.start_time.elapsed().as_secs(),
        refresh_interval_secs: state.runtime_config.refresh_interval_secs,
        tracked_symbols: state.store.tracked_symbols(),
        rate_limit: state.rate_limit.snapshot(),
    };
    Json(resp)
}

async fn recent_errors(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.recent_errors())
}
