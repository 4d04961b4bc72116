//! Remote tier backed by a SQLite pool

use async_trait::async_trait;
use pgap_common::models::{Assessment, ParticipantResponse, Role};
use pgap_common::Result;
use sqlx::SqlitePool;
use std::time::Duration;

use super::{AssessmentStore, RemoteStore, StoreTier};
use crate::db;

/// Authoritative store over the `assessments` and `participant_responses` tables
#[derive(Clone)]
pub struct SqliteRemoteStore {
    pool: SqlitePool,
    probe_timeout: Duration,
}

impl SqliteRemoteStore {
    pub fn new(pool: SqlitePool, probe_timeout: Duration) -> Self {
        Self { pool, probe_timeout }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl AssessmentStore for SqliteRemoteStore {
    fn tier(&self) -> StoreTier {
        StoreTier::Remote
    }

    async fn list_assessments(&self) -> Result<Vec<Assessment>> {
        db::assessments::list_assessments(&self.pool).await
    }

    async fn get_assessment(&self, id: &str) -> Result<Option<Assessment>> {
        db::assessments::load_assessment(&self.pool, id).await
    }

    async fn save_assessment(&self, assessment: &Assessment) -> Result<()> {
        db::assessments::save_assessment(&self.pool, assessment).await
    }

    async fn delete_assessment(&self, id: &str) -> Result<bool> {
        db::assessments::delete_assessment(&self.pool, id).await
    }

    async fn list_responses(
        &self,
        assessment_id: Option<&str>,
        role: Option<Role>,
    ) -> Result<Vec<ParticipantResponse>> {
        db::responses::list_responses(&self.pool, assessment_id, role).await
    }

    async fn add_response(&self, response: &ParticipantResponse) -> Result<()> {
        db::responses::add_response(&self.pool, response).await
    }

    async fn update_response_department(
        &self,
        assessment_id: &str,
        participant_id: &str,
        department: &str,
    ) -> Result<bool> {
        db::responses::update_response_department(&self.pool, assessment_id, participant_id, department)
            .await
    }

    async fn delete_response(&self, assessment_id: &str, participant_id: &str) -> Result<bool> {
        db::responses::delete_response(&self.pool, assessment_id, participant_id).await
    }
}

#[async_trait]
impl RemoteStore for SqliteRemoteStore {
    async fn is_available(&self) -> bool {
        if self.pool.is_closed() {
            return false;
        }

        let probe = sqlx::query("SELECT 1 FROM assessments LIMIT 1").fetch_optional(&self.pool);
        match tokio::time::timeout(self.probe_timeout, probe).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Remote availability probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(
                    timeout_ms = self.probe_timeout.as_millis() as u64,
                    "Remote availability probe timed out"
                );
                false
            }
        }
    }
}
