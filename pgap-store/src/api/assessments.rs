//! Assessment lifecycle endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use pgap_common::models::{Assessment, AssessmentStatus};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::services::{AssessmentWithResponses, NewAssessment};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: AssessmentStatus,
}

#[derive(Debug, Deserialize)]
pub struct DepartmentRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub id: String,
    pub deleted: bool,
}

/// GET /api/assessments
pub async fn list_assessments(State(state): State<AppState>) -> ApiResult<Json<Vec<Assessment>>> {
    Ok(Json(state.store.list_assessments().await?))
}

/// POST /api/assessments
pub async fn create_assessment(
    State(state): State<AppState>,
    Json(request): Json<NewAssessment>,
) -> ApiResult<(StatusCode, Json<Assessment>)> {
    let assessment = state.store.create_assessment(request).await?;
    Ok((StatusCode::CREATED, Json(assessment)))
}

/// GET /api/assessments/:id
///
/// The assessment together with all of its responses.
pub async fn get_assessment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AssessmentWithResponses>> {
    state
        .store
        .get_assessment_with_responses(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Assessment {}", id)))
}

/// DELETE /api/assessments/:id
pub async fn delete_assessment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    if !state.store.delete_assessment(&id).await? {
        return Err(ApiError::NotFound(format!("Assessment {}", id)));
    }
    Ok(Json(DeleteResponse { id, deleted: true }))
}

/// PUT /api/assessments/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> ApiResult<Json<Assessment>> {
    Ok(Json(
        state.store.update_assessment_status(&id, request.status).await?,
    ))
}

/// POST /api/assessments/:id/access-code
pub async fn regenerate_access_code(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Assessment>> {
    Ok(Json(state.store.regenerate_access_code(&id).await?))
}

/// POST /api/assessments/:id/departments
pub async fn add_department(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<DepartmentRequest>,
) -> ApiResult<(StatusCode, Json<Assessment>)> {
    let assessment = state
        .store
        .add_department_to_assessment(&id, &request.name)
        .await?;
    Ok((StatusCode::CREATED, Json(assessment)))
}

/// POST /api/assessments/:id/departments/:department_id/codes
pub async fn regenerate_department_codes(
    State(state): State<AppState>,
    Path((id, department_id)): Path<(String, String)>,
) -> ApiResult<Json<Assessment>> {
    Ok(Json(
        state
            .store
            .regenerate_department_codes(&id, &department_id)
            .await?,
    ))
}

pub fn assessment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/assessments", get(list_assessments).post(create_assessment))
        .route(
            "/api/assessments/:id",
            get(get_assessment).delete(delete_assessment),
        )
        .route("/api/assessments/:id/status", put(update_status))
        .route("/api/assessments/:id/access-code", post(regenerate_access_code))
        .route("/api/assessments/:id/departments", post(add_department))
        .route(
            "/api/assessments/:id/departments/:department_id/codes",
            post(regenerate_department_codes),
        )
}
