//! pgap-store library
//!
//! Hybrid assessment store: remote SQLite tier plus local cache, the
//! assessment lifecycle, department diagnostics/repair and the HTTP API
//! used by the UI layer.

use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod adapters;
pub mod api;
pub mod db;
pub mod error;
pub mod services;

pub use error::{ApiError, ApiResult};
pub use services::HybridStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<HybridStore>,
    pub startup_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<HybridStore>) -> Self {
        Self {
            store,
            startup_time: Instant::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::assessment_routes())
        .merge(api::response_routes())
        .merge(api::analytics_routes())
        .merge(api::maintenance_routes())
        .merge(api::access_code_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
