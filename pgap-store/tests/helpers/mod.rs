//! Shared fixtures for pgap-store integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use pgap_common::config::StoreSettings;
use pgap_common::models::{Answer, Assessment, ParticipantResponse, Role};
use pgap_common::{Error, Result};
use pgap_store::adapters::local::LocalCache;
use pgap_store::adapters::{AssessmentStore, RemoteStore, StoreTier};
use pgap_store::services::{HybridStore, NewAssessment};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-process remote tier with switchable availability and write failures
pub struct MemoryRemote {
    data: LocalCache,
    available: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            data: LocalCache::in_memory(),
            available: AtomicBool::new(true),
            fail_writes: AtomicBool::new(false),
        })
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Direct view of remote contents, bypassing the availability switch
    pub fn data(&self) -> &LocalCache {
        &self.data
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::RemoteUnavailable("simulated write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AssessmentStore for MemoryRemote {
    fn tier(&self) -> StoreTier {
        StoreTier::Remote
    }

    async fn list_assessments(&self) -> Result<Vec<Assessment>> {
        Ok(self.data.assessments())
    }

    async fn get_assessment(&self, id: &str) -> Result<Option<Assessment>> {
        Ok(self.data.find_assessment(id))
    }

    async fn save_assessment(&self, assessment: &Assessment) -> Result<()> {
        self.check_write()?;
        self.data.upsert_assessment(assessment)
    }

    async fn delete_assessment(&self, id: &str) -> Result<bool> {
        self.check_write()?;
        self.data.remove_assessment(id)
    }

    async fn list_responses(
        &self,
        assessment_id: Option<&str>,
        role: Option<Role>,
    ) -> Result<Vec<ParticipantResponse>> {
        Ok(self.data.responses(assessment_id, role))
    }

    async fn add_response(&self, response: &ParticipantResponse) -> Result<()> {
        self.check_write()?;
        self.data.upsert_response(response)
    }

    async fn update_response_department(
        &self,
        assessment_id: &str,
        participant_id: &str,
        department: &str,
    ) -> Result<bool> {
        self.check_write()?;
        self.data
            .set_response_department(assessment_id, participant_id, department)
    }

    async fn delete_response(&self, assessment_id: &str, participant_id: &str) -> Result<bool> {
        self.check_write()?;
        self.data.remove_response(assessment_id, participant_id)
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

pub struct Fixture {
    pub remote: Arc<MemoryRemote>,
    pub store: HybridStore,
}

pub fn fixture_with(local: LocalCache, settings: StoreSettings) -> Fixture {
    let remote = MemoryRemote::new();
    let store = HybridStore::new(remote.clone(), local, settings);
    Fixture { remote, store }
}

pub fn fixture() -> Fixture {
    fixture_with(LocalCache::in_memory(), StoreSettings::default())
}

pub fn new_assessment(org: &str, departments: &[&str]) -> NewAssessment {
    NewAssessment {
        organization_name: org.to_string(),
        consultant_id: "consultant-1".to_string(),
        departments: departments.iter().map(|d| d.to_string()).collect(),
        questions: vec![
            pgap_common::models::Question::new("q1", "Direction is clear", "Leadership"),
            pgap_common::models::Question::new("q2", "Feedback is heard", "Communication"),
        ],
    }
}

/// Response with one score per question
pub fn scored_response(
    assessment_id: &str,
    role: Role,
    department: Option<&str>,
    scores: &[(&str, &str, Option<f64>)],
) -> ParticipantResponse {
    let mut response =
        ParticipantResponse::start(assessment_id, role, department.map(str::to_string));
    response.answers = scores
        .iter()
        .map(|(question_id, category, score)| Answer {
            question_id: question_id.to_string(),
            score: *score,
            category: category.to_string(),
        })
        .collect();
    response
}
