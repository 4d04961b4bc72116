//! Participant response endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use pgap_common::models::{Answer, ParticipantResponse, Role};
use pgap_common::time::now;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ResponseQuery {
    pub role: Option<String>,
}

/// Body of POST /api/assessments/:id/responses
///
/// Omitting `participant_id` starts a new response; passing one updates it.
#[derive(Debug, Deserialize)]
pub struct RecordResponseRequest {
    pub participant_id: Option<String>,
    pub role: Role,
    pub department: Option<String>,
    #[serde(default)]
    pub survey_id: String,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub current_index: u32,
    #[serde(default)]
    pub completed: bool,
}

fn parse_role(raw: Option<&str>) -> ApiResult<Option<Role>> {
    raw.filter(|r| !r.trim().is_empty())
        .map(|r| r.parse::<Role>().map_err(|e| ApiError::BadRequest(e.to_string())))
        .transpose()
}

/// GET /api/assessments/:id/responses?role=
pub async fn list_responses(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ResponseQuery>,
) -> ApiResult<Json<Vec<ParticipantResponse>>> {
    let role = parse_role(query.role.as_deref())?;
    Ok(Json(state.store.list_responses(Some(&id), role).await?))
}

/// POST /api/assessments/:id/responses
pub async fn record_response(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RecordResponseRequest>,
) -> ApiResult<(StatusCode, Json<ParticipantResponse>)> {
    let existing = match request.participant_id.as_deref() {
        Some(participant_id) => state
            .store
            .list_responses(Some(&id), None)
            .await?
            .into_iter()
            .find(|r| r.participant_id == participant_id),
        None => None,
    };
    let created = existing.is_none();

    let mut response = existing.unwrap_or_else(|| {
        let mut fresh = ParticipantResponse::start(id.clone(), request.role, None);
        if let Some(participant_id) = &request.participant_id {
            fresh.participant_id = participant_id.clone();
        }
        fresh
    });
    response.role = request.role;
    response.department = request.department;
    response.survey_id = request.survey_id;
    response.answers = request.answers;
    response.current_index = request.current_index;
    if request.completed && response.completed_at.is_none() {
        response.completed_at = Some(now());
    }

    let recorded = state.store.record_response(response).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(recorded)))
}

pub fn response_routes() -> Router<AppState> {
    Router::new().route(
        "/api/assessments/:id/responses",
        get(list_responses).post(record_response),
    )
}
