//! Participant response rows
//!
//! The table's own `id` column is never read or written here; responses are
//! addressed by (`assessment_id`, `participant_id`).

use pgap_common::models::{ParticipantResponse, Role};
use pgap_common::time::{from_wire, to_wire};
use pgap_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::json_column;

fn response_from_row(row: &SqliteRow) -> Result<ParticipantResponse> {
    let participant_id: String = row.try_get("participant_id")?;

    let role: String = row.try_get("role")?;
    let role = role.parse::<Role>().map_err(|_| {
        Error::Internal(format!("Response {} has invalid role '{}'", participant_id, role))
    })?;

    let started_at: String = row.try_get("started_at")?;
    let started_at = from_wire(&started_at).ok_or_else(|| {
        Error::Internal(format!(
            "Response {} has invalid started_at '{}'",
            participant_id, started_at
        ))
    })?;
    let completed_at: Option<String> = row.try_get("completed_at")?;
    let current_index: i64 = row.try_get("current_index")?;

    Ok(ParticipantResponse {
        assessment_id: row.try_get("assessment_id")?,
        role,
        department: row.try_get("department")?,
        survey_id: row.try_get("survey_id")?,
        answers: json_column(row.try_get("responses")?, "participant_responses", "responses"),
        current_index: u32::try_from(current_index).unwrap_or(0),
        started_at,
        completed_at: completed_at.as_deref().and_then(from_wire),
        participant_id,
    })
}

/// List responses, optionally filtered by assessment and role
pub async fn list_responses(
    pool: &SqlitePool,
    assessment_id: Option<&str>,
    role: Option<Role>,
) -> Result<Vec<ParticipantResponse>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT assessment_id, participant_id, role, department, survey_id, responses, \
         current_index, started_at, completed_at FROM participant_responses WHERE 1 = 1",
    );

    if let Some(assessment_id) = assessment_id {
        query.push(" AND assessment_id = ").push_bind(assessment_id);
    }
    if let Some(role) = role {
        query.push(" AND role = ").push_bind(role.as_str());
    }
    query.push(" ORDER BY started_at ASC, id ASC");

    let rows = query.build().fetch_all(pool).await?;
    rows.iter().map(response_from_row).collect()
}

/// Insert or update a response by (assessment_id, participant_id)
pub async fn add_response(pool: &SqlitePool, response: &ParticipantResponse) -> Result<()> {
    let answers = serde_json::to_string(&response.answers)?;

    sqlx::query(
        r#"
        INSERT INTO participant_responses (
            assessment_id, participant_id, role, department, survey_id,
            responses, current_index, started_at, completed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(assessment_id, participant_id) DO UPDATE SET
            role = excluded.role,
            department = excluded.department,
            survey_id = excluded.survey_id,
            responses = excluded.responses,
            current_index = excluded.current_index,
            completed_at = excluded.completed_at
        "#,
    )
    .bind(&response.assessment_id)
    .bind(&response.participant_id)
    .bind(response.role.as_str())
    .bind(&response.department)
    .bind(&response.survey_id)
    .bind(answers)
    .bind(i64::from(response.current_index))
    .bind(to_wire(&response.started_at))
    .bind(response.completed_at.as_ref().map(to_wire))
    .execute(pool)
    .await?;

    Ok(())
}

/// Rewrite one response's department value
///
/// Returns false when no such response exists.
pub async fn update_response_department(
    pool: &SqlitePool,
    assessment_id: &str,
    participant_id: &str,
    department: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE participant_responses SET department = ? WHERE assessment_id = ? AND participant_id = ?",
    )
    .bind(department)
    .bind(assessment_id)
    .bind(participant_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete one response; returns false when it did not exist
pub async fn delete_response(
    pool: &SqlitePool,
    assessment_id: &str,
    participant_id: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "DELETE FROM participant_responses WHERE assessment_id = ? AND participant_id = ?",
    )
    .bind(assessment_id)
    .bind(participant_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
