//! Aggregate endpoints

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use pgap_common::models::{AssessmentAnalytics, NarrativeContext, Role};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct NarrativeQuery {
    pub role: String,
    pub department: Option<String>,
}

/// GET /api/assessments/:id/analytics?refresh=true
pub async fn get_analytics(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<AssessmentAnalytics>> {
    Ok(Json(state.store.get_analytics(&id, query.refresh).await?))
}

/// GET /api/assessments/:id/narrative-context?role=&department=
///
/// Input for the external narrative generator.
pub async fn get_narrative_context(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<NarrativeQuery>,
) -> ApiResult<Json<NarrativeContext>> {
    let role = query
        .role
        .parse::<Role>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let department = query.department.as_deref().filter(|d| !d.is_empty());

    Ok(Json(
        state.store.narrative_context(&id, role, department).await?,
    ))
}

pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/api/assessments/:id/analytics", get(get_analytics))
        .route(
            "/api/assessments/:id/narrative-context",
            get(get_narrative_context),
        )
}
