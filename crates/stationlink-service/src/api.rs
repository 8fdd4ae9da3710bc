//! REST API endpoints.
//!
//! - `GET /api/health` - service liveness and uptime
//! - `GET /api/status` - connection state snapshot
//! - `GET /api/readings/latest` - most recent validated reading
//! - `GET /api/readings?count=N` - recent cached readings, oldest first

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::state::AppState;

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/readings/latest", get(latest_reading))
        .route("/api/readings", get(recent_readings))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    started_at: OffsetDateTime,
    uptime_secs: u64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = OffsetDateTime::now_utc() - state.started_at;
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
        uptime_secs: uptime.whole_seconds().max(0) as u64,
    })
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.manager.status())
}

async fn latest_reading(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.manager.status();
    match status.last_reading {
        Some(reading) => Json(reading).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "no readings yet" })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
    count: Option<usize>,
}

async fn recent_readings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentQuery>,
) -> impl IntoResponse {
    let count = query.count.unwrap_or(20);
    Json(state.manager.recent_readings(count).await)
}
