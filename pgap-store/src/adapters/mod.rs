//! Storage tiers
//!
//! Both tiers expose the same operation set through [`AssessmentStore`]:
//! - **Remote:** authoritative relational store ([`remote::SqliteRemoteStore`])
//! - **Local:** per-client key/value cache ([`local::LocalCache`])
//!
//! [`crate::services::hybrid::HybridStore`] composes one of each.

pub mod local;
pub mod remote;

use async_trait::async_trait;
use pgap_common::models::{Assessment, ParticipantResponse, Role};
use pgap_common::Result;
use serde::Serialize;

/// Which tier an operation ran against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreTier {
    Remote,
    Local,
}

impl StoreTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreTier::Remote => "remote",
            StoreTier::Local => "local",
        }
    }
}

/// Entity-level storage operations shared by both tiers
///
/// Saves are upserts keyed by assessment id or by
/// (assessment_id, participant_id).
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    fn tier(&self) -> StoreTier;

    async fn list_assessments(&self) -> Result<Vec<Assessment>>;

    async fn get_assessment(&self, id: &str) -> Result<Option<Assessment>>;

    async fn save_assessment(&self, assessment: &Assessment) -> Result<()>;

    /// Delete an assessment and all of its responses; false when absent
    async fn delete_assessment(&self, id: &str) -> Result<bool>;

    async fn list_responses(
        &self,
        assessment_id: Option<&str>,
        role: Option<Role>,
    ) -> Result<Vec<ParticipantResponse>>;

    async fn add_response(&self, response: &ParticipantResponse) -> Result<()>;

    /// Rewrite the department of one response; false when absent
    async fn update_response_department(
        &self,
        assessment_id: &str,
        participant_id: &str,
        department: &str,
    ) -> Result<bool>;

    async fn delete_response(&self, assessment_id: &str, participant_id: &str) -> Result<bool>;
}

/// The authoritative tier, which may be unreachable
#[async_trait]
pub trait RemoteStore: AssessmentStore {
    /// Cheap bounded probe; never errors
    async fn is_available(&self) -> bool;
}
