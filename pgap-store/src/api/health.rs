//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::BuildInfo;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Result of the remote availability probe
    pub remote_available: bool,
    pub local_cache: bool,
}

/// GET /health
///
/// Always 200 while the process is up; a failed remote probe means degraded
/// (local-only) operation, not an outage.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let remote_available = state.store.remote_available().await;
    let build = BuildInfo::current();
    Json(HealthResponse {
        status: if remote_available { "ok" } else { "degraded" }.to_string(),
        module: build.module.to_string(),
        version: build.version.to_string(),
        uptime_seconds: state.startup_time.elapsed().as_secs(),
        remote_available,
        local_cache: state.store.local().is_available(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/buildinfo", get(super::get_build_info))
}
