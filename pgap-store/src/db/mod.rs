//! Remote store database access
//!
//! The authoritative tier is a relational store with two tables,
//! `assessments` and `participant_responses`. This module owns the schema
//! and the row <-> entity transformation; [`crate::adapters::remote`] wraps
//! it behind the store traits.

pub mod assessments;
pub mod responses;

use pgap_common::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Open (or create) the remote store database and ensure its tables exist
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema
///
/// A single connection is used because every SQLite `:memory:` connection
/// is its own database.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create the remote schema (idempotent)
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assessments (
            id TEXT PRIMARY KEY,
            organization_name TEXT NOT NULL,
            consultant_id TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'collecting' CHECK (status IN ('collecting', 'ready', 'locked')),
            created_at TEXT NOT NULL,
            locked_at TEXT,
            access_code TEXT NOT NULL,
            code_regenerated_at TEXT,
            departments TEXT,
            questions TEXT,
            response_counts TEXT,
            management_aggregate TEXT,
            employee_aggregate TEXT,
            department_aggregates TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // `id` is the store's own key; the application identity is
    // (assessment_id, participant_id)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS participant_responses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            assessment_id TEXT NOT NULL REFERENCES assessments(id),
            participant_id TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('management', 'employee')),
            department TEXT,
            survey_id TEXT NOT NULL DEFAULT '',
            responses TEXT,
            current_index INTEGER NOT NULL DEFAULT 0,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            UNIQUE (assessment_id, participant_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_participant_responses_assessment ON participant_responses(assessment_id)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (assessments, participant_responses)");

    Ok(())
}

/// Decode a JSON text column, defaulting NULL or malformed content
pub(crate) fn json_column<T>(raw: Option<String>, table: &str, column: &str) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    match raw {
        None => T::default(),
        Some(text) if text.trim().is_empty() => T::default(),
        Some(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
            tracing::warn!(table, column, error = %e, "Malformed JSON column, using empty value");
            T::default()
        }),
    }
}
