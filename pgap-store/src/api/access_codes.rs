//! Access code resolution

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::error::{ApiError, ApiResult};
use crate::services::AccessGrant;
use crate::AppState;

/// GET /api/access-codes/:code
pub async fn resolve_access_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<AccessGrant>> {
    state
        .store
        .resolve_access_code(&code)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Access code {}", code)))
}

pub fn access_code_routes() -> Router<AppState> {
    Router::new().route("/api/access-codes/:code", get(resolve_access_code))
}
