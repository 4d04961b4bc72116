//! Assessment rows
//!
//! Column names are snake_case, timestamps are RFC 3339 text and the
//! embedded collections are JSON text columns.

use pgap_common::models::{Assessment, AssessmentStatus};
use pgap_common::time::{from_wire, to_wire};
use pgap_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::json_column;

const SELECT_COLUMNS: &str = r#"
    SELECT id, organization_name, consultant_id, status, created_at, locked_at,
           access_code, code_regenerated_at, departments, questions,
           response_counts, management_aggregate, employee_aggregate,
           department_aggregates
    FROM assessments
"#;

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn assessment_from_row(row: &SqliteRow) -> Result<Assessment> {
    let id: String = row.try_get("id")?;

    let status: String = row.try_get("status")?;
    let status = status
        .parse::<AssessmentStatus>()
        .map_err(|_| Error::Internal(format!("Assessment {} has invalid status '{}'", id, status)))?;

    let created_at: String = row.try_get("created_at")?;
    let created_at = from_wire(&created_at).ok_or_else(|| {
        Error::Internal(format!("Assessment {} has invalid created_at '{}'", id, created_at))
    })?;

    let locked_at: Option<String> = row.try_get("locked_at")?;
    let code_regenerated_at: Option<String> = row.try_get("code_regenerated_at")?;

    Ok(Assessment {
        organization_name: row.try_get("organization_name")?,
        consultant_id: row.try_get("consultant_id")?,
        status,
        created_at,
        locked_at: locked_at.as_deref().and_then(from_wire),
        access_code: row.try_get("access_code")?,
        code_regenerated_at: code_regenerated_at.as_deref().and_then(from_wire),
        departments: json_column(row.try_get("departments")?, "assessments", "departments"),
        questions: json_column(row.try_get("questions")?, "assessments", "questions"),
        response_counts: json_column(row.try_get("response_counts")?, "assessments", "response_counts"),
        management_aggregate: json_column(
            row.try_get("management_aggregate")?,
            "assessments",
            "management_aggregate",
        ),
        employee_aggregate: json_column(
            row.try_get("employee_aggregate")?,
            "assessments",
            "employee_aggregate",
        ),
        department_aggregates: json_column(
            row.try_get("department_aggregates")?,
            "assessments",
            "department_aggregates",
        ),
        id,
    })
}

/// All assessments, newest first
pub async fn list_assessments(pool: &SqlitePool) -> Result<Vec<Assessment>> {
    let rows = sqlx::query(&format!("{} ORDER BY created_at DESC", SELECT_COLUMNS))
        .fetch_all(pool)
        .await?;

    rows.iter().map(assessment_from_row).collect()
}

/// Load one assessment
pub async fn load_assessment(pool: &SqlitePool, id: &str) -> Result<Option<Assessment>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(assessment_from_row).transpose()
}

/// Insert or update an assessment by id
pub async fn save_assessment(pool: &SqlitePool, assessment: &Assessment) -> Result<()> {
    // Prepare all data before touching the pool
    let departments = to_json(&assessment.departments)?;
    let questions = to_json(&assessment.questions)?;
    let response_counts = to_json(&assessment.response_counts)?;
    let management_aggregate = to_json(&assessment.management_aggregate)?;
    let employee_aggregate = to_json(&assessment.employee_aggregate)?;
    let department_aggregates = assessment
        .department_aggregates
        .as_ref()
        .map(to_json)
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO assessments (
            id, organization_name, consultant_id, status, created_at, locked_at,
            access_code, code_regenerated_at, departments, questions,
            response_counts, management_aggregate, employee_aggregate,
            department_aggregates
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            organization_name = excluded.organization_name,
            consultant_id = excluded.consultant_id,
            status = excluded.status,
            locked_at = excluded.locked_at,
            access_code = excluded.access_code,
            code_regenerated_at = excluded.code_regenerated_at,
            departments = excluded.departments,
            questions = excluded.questions,
            response_counts = excluded.response_counts,
            management_aggregate = excluded.management_aggregate,
            employee_aggregate = excluded.employee_aggregate,
            department_aggregates = excluded.department_aggregates,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&assessment.id)
    .bind(&assessment.organization_name)
    .bind(&assessment.consultant_id)
    .bind(assessment.status.as_str())
    .bind(to_wire(&assessment.created_at))
    .bind(assessment.locked_at.as_ref().map(to_wire))
    .bind(&assessment.access_code)
    .bind(assessment.code_regenerated_at.as_ref().map(to_wire))
    .bind(departments)
    .bind(questions)
    .bind(response_counts)
    .bind(management_aggregate)
    .bind(employee_aggregate)
    .bind(department_aggregates)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete an assessment and its responses
///
/// Responses go first: `participant_responses.assessment_id` references
/// `assessments(id)`. Both deletes share one transaction.
pub async fn delete_assessment(pool: &SqlitePool, id: &str) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let responses = sqlx::query("DELETE FROM participant_responses WHERE assessment_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let assessments = sqlx::query("DELETE FROM assessments WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::debug!(
        assessment_id = id,
        responses = responses.rows_affected(),
        "Deleted assessment from remote store"
    );

    Ok(assessments.rows_affected() > 0)
}
