//! Department diagnosis, repair, cleanup and migration endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::error::ApiResult;
use crate::services::{CleanupOutcome, DepartmentDiagnosis, MigrationReport, RepairOutcome};
use crate::AppState;

/// GET /api/assessments/:id/diagnosis
pub async fn get_diagnosis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DepartmentDiagnosis>> {
    Ok(Json(state.store.diagnose(&id).await?))
}

/// POST /api/assessments/:id/repair
pub async fn repair(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RepairOutcome>> {
    Ok(Json(state.store.repair(&id).await?))
}

/// POST /api/assessments/:id/cleanup
pub async fn cleanup(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CleanupOutcome>> {
    Ok(Json(state.store.cleanup(&id).await?))
}

/// POST /api/assessments/:id/migrate
pub async fn migrate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MigrationReport>> {
    Ok(Json(state.store.migrate(&id).await?))
}

pub fn maintenance_routes() -> Router<AppState> {
    Router::new()
        .route("/api/assessments/:id/diagnosis", get(get_diagnosis))
        .route("/api/assessments/:id/repair", post(repair))
        .route("/api/assessments/:id/cleanup", post(cleanup))
        .route("/api/assessments/:id/migrate", post(migrate))
}
