//! Hybrid access manager
//!
//! Composes the remote tier and the local cache behind one API.
//!
//! **Reads:** probe the remote tier; read it when reachable; fall back to the
//! local cache when the remote read fails or comes back empty. Collection
//! reads merge both tiers (remote first, then local-only entries).
//!
//! **Writes:** local cache first, then a best-effort remote write. Remote
//! failures are logged and never rolled back; a write fails only when both
//! tiers fail.

use pgap_common::aggregation;
use pgap_common::config::StoreSettings;
use pgap_common::identifiers;
use pgap_common::models::{
    Assessment, AssessmentAnalytics, AssessmentStatus, NarrativeContext, ParticipantResponse,
    Question, Role,
};
use pgap_common::time::now;
use pgap_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use super::diagnostics::{self, DepartmentDiagnosis};
use super::migration::{self, MigrationReport};
use super::repair::{self, CleanupOutcome, RepairOutcome};
use crate::adapters::local::{LocalCache, DEMO_DELETED_KEY};
use crate::adapters::RemoteStore;

/// Attempts at drawing an access code that collides with nothing
const ACCESS_CODE_ATTEMPTS: usize = 16;

/// Input for [`HybridStore::create_assessment`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAssessment {
    pub organization_name: String,
    #[serde(default)]
    pub consultant_id: String,
    /// Department display names
    #[serde(default)]
    pub departments: Vec<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentWithResponses {
    pub assessment: Assessment,
    pub responses: Vec<ParticipantResponse>,
}

/// What a participant access code grants
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessGrant {
    pub assessment_id: String,
    pub organization_name: String,
    /// `None` for the assessment-wide code, which carries no fixed role
    pub role: Option<Role>,
    pub department_id: Option<String>,
}

/// Merge two collections keyed by `key`
///
/// All of `primary` first (in order), then entries of `secondary` whose key
/// is absent from `primary`. `primary` wins on conflict.
pub fn merge_by_key<T, K, F>(primary: Vec<T>, secondary: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let seen: HashSet<K> = primary.iter().map(&key).collect();
    let mut merged = primary;
    merged.extend(secondary.into_iter().filter(|item| !seen.contains(&key(item))));
    merged
}

fn response_key(r: &ParticipantResponse) -> (String, String) {
    (r.assessment_id.clone(), r.participant_id.clone())
}

/// Hybrid store over an injected remote tier and a local cache
pub struct HybridStore {
    remote: Arc<dyn RemoteStore>,
    local: LocalCache,
    settings: StoreSettings,
}

impl HybridStore {
    pub fn new(remote: Arc<dyn RemoteStore>, local: LocalCache, settings: StoreSettings) -> Self {
        tracing::debug!(
            probe_timeout_ms = settings.probe_timeout_ms,
            local_cache = local.is_available(),
            "Hybrid store created"
        );
        Self {
            remote,
            local,
            settings,
        }
    }

    pub fn remote(&self) -> &dyn RemoteStore {
        self.remote.as_ref()
    }

    pub fn local(&self) -> &LocalCache {
        &self.local
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub async fn remote_available(&self) -> bool {
        self.remote.is_available().await
    }

    // ========================================================================
    // Read path
    // ========================================================================

    pub async fn list_assessments(&self) -> Result<Vec<Assessment>> {
        let local = self.local.assessments();
        if !self.remote_available().await {
            tracing::debug!("Remote store unavailable, listing assessments from local cache");
            return Ok(local);
        }

        match self.remote.list_assessments().await {
            Ok(remote) if !remote.is_empty() => {
                Ok(merge_by_key(remote, local, |a: &Assessment| a.id.clone()))
            }
            Ok(_) => Ok(local),
            Err(e) => {
                tracing::warn!(error = %e, "Remote assessment list failed, using local cache");
                Ok(local)
            }
        }
    }

    pub async fn get_assessment(&self, id: &str) -> Result<Option<Assessment>> {
        if self.remote_available().await {
            match self.remote.get_assessment(id).await {
                Ok(Some(assessment)) => return Ok(Some(assessment)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(assessment_id = id, error = %e, "Remote read failed, using local cache");
                }
            }
        }
        Ok(self.local.find_assessment(id))
    }

    pub async fn list_responses(
        &self,
        assessment_id: Option<&str>,
        role: Option<Role>,
    ) -> Result<Vec<ParticipantResponse>> {
        let local = self.local.responses(assessment_id, role);
        if !self.remote_available().await {
            return Ok(local);
        }

        match self.remote.list_responses(assessment_id, role).await {
            Ok(remote) if !remote.is_empty() => Ok(merge_by_key(remote, local, response_key)),
            Ok(_) => Ok(local),
            Err(e) => {
                tracing::warn!(error = %e, "Remote response list failed, using local cache");
                Ok(local)
            }
        }
    }

    pub async fn get_assessment_with_responses(
        &self,
        id: &str,
    ) -> Result<Option<AssessmentWithResponses>> {
        let Some(assessment) = self.get_assessment(id).await? else {
            return Ok(None);
        };
        let responses = self.list_responses(Some(id), None).await?;
        Ok(Some(AssessmentWithResponses {
            assessment,
            responses,
        }))
    }

    async fn require_assessment(&self, id: &str) -> Result<Assessment> {
        self.get_assessment(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Assessment {}", id)))
    }

    // ========================================================================
    // Write path
    // ========================================================================

    /// Run a write against both tiers; `local` has already been attempted
    ///
    /// Returns the successful results (local first). Fails only when no tier
    /// accepted the write.
    async fn write_through<T, Fut>(
        &self,
        operation: &'static str,
        local: Result<T>,
        remote: Fut,
    ) -> Result<Vec<T>>
    where
        Fut: Future<Output = Result<T>> + Send,
    {
        let mut written = Vec::with_capacity(2);
        let local_error = match local {
            Ok(value) => {
                written.push(value);
                None
            }
            Err(Error::CacheUnavailable) => {
                tracing::debug!(operation, "No local cache, writing remote only");
                Some(Error::CacheUnavailable)
            }
            Err(e) => {
                tracing::warn!(operation, error = %e, "Local cache write failed");
                Some(e)
            }
        };

        if self.remote_available().await {
            match remote.await {
                Ok(value) => written.push(value),
                Err(e) => {
                    tracing::warn!(operation, error = %e, "Remote write failed, kept in local cache");
                    if written.is_empty() {
                        return Err(e);
                    }
                }
            }
        } else {
            tracing::warn!(operation, "Remote store unavailable, kept in local cache");
        }

        match local_error {
            Some(e) if written.is_empty() => Err(e),
            _ => Ok(written),
        }
    }

    pub async fn save_assessment(&self, assessment: &Assessment) -> Result<()> {
        let local = self.local.upsert_assessment(assessment);
        self.write_through("save_assessment", local, self.remote.save_assessment(assessment))
            .await?;
        Ok(())
    }

    pub async fn save_response(&self, response: &ParticipantResponse) -> Result<()> {
        let local = self.local.upsert_response(response);
        self.write_through("add_response", local, self.remote.add_response(response))
            .await?;
        Ok(())
    }

    async fn delete_response(&self, assessment_id: &str, participant_id: &str) -> Result<bool> {
        let local = self.local.remove_response(assessment_id, participant_id);
        let written = self
            .write_through(
                "delete_response",
                local,
                self.remote.delete_response(assessment_id, participant_id),
            )
            .await?;
        Ok(written.into_iter().any(|found| found))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Create a new assessment in status `collecting`
    pub async fn create_assessment(&self, new: NewAssessment) -> Result<Assessment> {
        let assessment = self
            .build_assessment(identifiers::assessment_id(), new)
            .await?;
        self.save_assessment(&assessment).await?;

        tracing::info!(
            assessment_id = %assessment.id,
            organization = %assessment.organization_name,
            departments = assessment.departments.len(),
            "Created assessment"
        );
        Ok(assessment)
    }

    async fn build_assessment(&self, id: String, new: NewAssessment) -> Result<Assessment> {
        let organization_name = new.organization_name.trim().to_string();
        if organization_name.is_empty() {
            return Err(Error::Validation("Organization name is required".to_string()));
        }

        let created_at = now();
        let mut assessment = Assessment {
            id,
            access_code: self.unique_access_code(&organization_name, None).await?,
            organization_name,
            consultant_id: new.consultant_id,
            status: AssessmentStatus::Collecting,
            created_at,
            locked_at: None,
            code_regenerated_at: None,
            departments: Vec::new(),
            questions: new.questions,
            response_counts: Default::default(),
            management_aggregate: Default::default(),
            employee_aggregate: Default::default(),
            department_aggregates: None,
        };

        for name in new.departments.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            if assessment.department_by_name(name).is_some() {
                return Err(Error::AlreadyExists(format!("Department '{}'", name)));
            }
            let department = identifiers::new_department(
                &assessment.organization_name,
                name,
                &assessment.departments,
                created_at,
            );
            assessment.departments.push(department);
        }

        Ok(assessment)
    }

    /// Draw an assessment code unused by other assessments and different
    /// from `previous`
    async fn unique_access_code(&self, organization_name: &str, previous: Option<&str>) -> Result<String> {
        let taken: HashSet<String> = self
            .list_assessments()
            .await?
            .into_iter()
            .map(|a| a.access_code)
            .collect();

        for _ in 0..ACCESS_CODE_ATTEMPTS {
            let code = identifiers::assessment_access_code(organization_name);
            if Some(code.as_str()) != previous && !taken.contains(&code) {
                return Ok(code);
            }
        }
        Err(Error::Internal(format!(
            "Could not allocate a unique access code for '{}'",
            organization_name
        )))
    }

    pub async fn update_assessment_status(
        &self,
        id: &str,
        status: AssessmentStatus,
    ) -> Result<Assessment> {
        let mut assessment = self.require_assessment(id).await?;
        if assessment.status == status {
            return Ok(assessment);
        }

        let previous = assessment.status;
        assessment.transition_to(status, now())?;
        self.save_assessment(&assessment).await?;

        tracing::info!(assessment_id = id, from = %previous, to = %status, "Assessment status changed");
        Ok(assessment)
    }

    pub async fn regenerate_access_code(&self, id: &str) -> Result<Assessment> {
        let mut assessment = self.require_assessment(id).await?;
        assessment.ensure_unlocked("regenerate access code")?;

        assessment.access_code = self
            .unique_access_code(&assessment.organization_name, Some(&assessment.access_code))
            .await?;
        assessment.code_regenerated_at = Some(now());
        self.save_assessment(&assessment).await?;

        tracing::info!(assessment_id = id, "Regenerated assessment access code");
        Ok(assessment)
    }

    pub async fn add_department_to_assessment(&self, id: &str, name: &str) -> Result<Assessment> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Department name is required".to_string()));
        }

        let mut assessment = self.require_assessment(id).await?;
        assessment.ensure_unlocked("add department")?;
        if assessment.department_by_name(name).is_some() {
            return Err(Error::AlreadyExists(format!("Department '{}'", name)));
        }

        let department = identifiers::new_department(
            &assessment.organization_name,
            name,
            &assessment.departments,
            now(),
        );
        let department_id = department.id.clone();
        assessment.departments.push(department);
        assessment.department_aggregates = None;
        self.save_assessment(&assessment).await?;

        tracing::info!(assessment_id = id, department_id = %department_id, "Added department");
        Ok(assessment)
    }

    pub async fn regenerate_department_codes(
        &self,
        id: &str,
        department_id: &str,
    ) -> Result<Assessment> {
        let mut assessment = self.require_assessment(id).await?;
        assessment.ensure_unlocked("regenerate department codes")?;

        let organization_name = assessment.organization_name.clone();
        let department = assessment
            .departments
            .iter_mut()
            .find(|d| d.id == department_id)
            .ok_or_else(|| Error::NotFound(format!("Department {}", department_id)))?;

        let mut at = now();
        let mut management_code =
            identifiers::department_access_code(&organization_name, Role::Management, &department.name, at);
        if management_code == department.management_code {
            // Same millisecond suffix as the previous codes
            at += chrono::Duration::milliseconds(1);
            management_code =
                identifiers::department_access_code(&organization_name, Role::Management, &department.name, at);
        }
        department.management_code = management_code;
        department.employee_code =
            identifiers::department_access_code(&organization_name, Role::Employee, &department.name, at);

        self.save_assessment(&assessment).await?;

        tracing::info!(assessment_id = id, department_id, "Regenerated department access codes");
        Ok(assessment)
    }

    /// Delete an assessment and its responses from both tiers
    ///
    /// Deleting the configured demo assessment also suppresses re-seeding.
    pub async fn delete_assessment(&self, id: &str) -> Result<bool> {
        let local = self.local.remove_assessment(id);
        let written = self
            .write_through("delete_assessment", local, self.remote.delete_assessment(id))
            .await?;
        let found = written.into_iter().any(|found| found);

        if self.settings.demo_assessment_id.as_deref() == Some(id) {
            if let Err(e) = self.local.set_flag(DEMO_DELETED_KEY, true) {
                tracing::warn!(error = %e, "Failed to persist demo deletion flag");
            }
        }

        tracing::info!(assessment_id = id, found, "Deleted assessment");
        Ok(found)
    }

    /// Record (or update) a participant response
    ///
    /// Department names are normalized to the configured id. Response counts
    /// are refreshed and cached department aggregates invalidated.
    pub async fn record_response(&self, mut response: ParticipantResponse) -> Result<ParticipantResponse> {
        let mut assessment = self.require_assessment(&response.assessment_id).await?;
        assessment.ensure_unlocked("record response")?;

        let normalized = response
            .department
            .as_deref()
            .filter(|raw| assessment.department(raw).is_none())
            .and_then(|raw| assessment.department_by_name(raw))
            .map(|d| d.id.clone());
        if normalized.is_some() {
            response.department = normalized;
        }

        self.save_response(&response).await?;
        tracing::debug!(
            assessment_id = %response.assessment_id,
            participant_id = %response.participant_id,
            role = %response.role,
            "Recorded response"
        );

        let responses = self.list_responses(Some(&assessment.id), None).await?;
        assessment.response_counts = aggregation::response_counts(&responses);
        if assessment.department_aggregates.is_some() {
            assessment.department_aggregates = None;
        }
        if let Err(e) = self.save_assessment(&assessment).await {
            tracing::warn!(assessment_id = %assessment.id, error = %e, "Failed to update response counts");
        }

        Ok(response)
    }

    /// Find the assessment (and role/department) an access code belongs to
    pub async fn resolve_access_code(&self, code: &str) -> Result<Option<AccessGrant>> {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Ok(None);
        }

        for assessment in self.list_assessments().await? {
            if assessment.access_code.eq_ignore_ascii_case(&code) {
                return Ok(Some(AccessGrant {
                    assessment_id: assessment.id,
                    organization_name: assessment.organization_name,
                    role: None,
                    department_id: None,
                }));
            }

            let department_grant = assessment.departments.iter().find_map(|d| {
                if d.management_code.eq_ignore_ascii_case(&code) {
                    Some((Role::Management, d.id.clone()))
                } else if d.employee_code.eq_ignore_ascii_case(&code) {
                    Some((Role::Employee, d.id.clone()))
                } else {
                    None
                }
            });
            if let Some((role, department_id)) = department_grant {
                return Ok(Some(AccessGrant {
                    assessment_id: assessment.id,
                    organization_name: assessment.organization_name,
                    role: Some(role),
                    department_id: Some(department_id),
                }));
            }
        }

        Ok(None)
    }

    // ========================================================================
    // Aggregates
    // ========================================================================

    /// Recompute and store response counts and aggregates
    pub async fn refresh_aggregates(&self, id: &str) -> Result<AssessmentAnalytics> {
        let mut assessment = self.require_assessment(id).await?;
        let responses = self.list_responses(Some(id), None).await?;
        let analytics = aggregation::compute_analytics(&assessment, &responses);

        aggregation::apply_analytics(
            &mut assessment,
            &analytics,
            aggregation::response_counts(&responses),
        );
        self.save_assessment(&assessment).await?;

        tracing::info!(
            assessment_id = id,
            responses = responses.len(),
            excluded = analytics.excluded_responses,
            alignment = analytics.alignment_score,
            "Refreshed aggregates"
        );
        Ok(analytics)
    }

    /// Current analytics, persisted when stale or when `refresh` is set
    pub async fn get_analytics(&self, id: &str, refresh: bool) -> Result<AssessmentAnalytics> {
        let mut assessment = self.require_assessment(id).await?;
        let responses = self.list_responses(Some(id), None).await?;
        let analytics = aggregation::compute_analytics(&assessment, &responses);
        let counts = aggregation::response_counts(&responses);

        let stale = aggregation::needs_recompute(&assessment) || assessment.response_counts != counts;
        if refresh || stale {
            tracing::debug!(assessment_id = id, refresh, stale, "Persisting recomputed aggregates");
            aggregation::apply_analytics(&mut assessment, &analytics, counts);
            self.save_assessment(&assessment).await?;
        }

        Ok(analytics)
    }

    pub async fn narrative_context(
        &self,
        id: &str,
        role: Role,
        department_id: Option<&str>,
    ) -> Result<NarrativeContext> {
        let analytics = self.get_analytics(id, false).await?;
        aggregation::narrative_context(&analytics, role, department_id).ok_or_else(|| {
            Error::NotFound(format!("Department {}", department_id.unwrap_or_default()))
        })
    }

    // ========================================================================
    // Demo assessment
    // ========================================================================

    pub fn is_demo_suppressed(&self) -> bool {
        self.local.flag(DEMO_DELETED_KEY)
    }

    /// Create the configured demo assessment unless it exists or was deleted
    pub async fn seed_demo_assessment(&self) -> Result<Option<Assessment>> {
        let Some(demo_id) = self.settings.demo_assessment_id.clone() else {
            return Ok(None);
        };
        if self.is_demo_suppressed() {
            tracing::debug!(assessment_id = %demo_id, "Demo assessment was deleted, not seeding");
            return Ok(None);
        }
        if self.get_assessment(&demo_id).await?.is_some() {
            return Ok(None);
        }

        let assessment = self.build_assessment(demo_id, demo_definition()).await?;
        self.save_assessment(&assessment).await?;

        tracing::info!(assessment_id = %assessment.id, "Seeded demo assessment");
        Ok(Some(assessment))
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    pub async fn diagnose(&self, id: &str) -> Result<DepartmentDiagnosis> {
        let assessment = self.require_assessment(id).await?;
        let responses = self.list_responses(Some(id), None).await?;
        Ok(diagnostics::diagnose(&assessment, &responses))
    }

    /// Repair corrupted department values
    ///
    /// Repairs the remote tier when reachable and mirrors the mapping into the
    /// local cache; otherwise repairs the local cache only. Responses that
    /// exist only in the cache are counted alongside the remote fixes.
    pub async fn repair(&self, id: &str) -> Result<RepairOutcome> {
        let remote_up = self.remote_available().await;
        if !remote_up && !self.local.is_available() {
            tracing::warn!(assessment_id = id, "No store reachable for department repair");
            return Ok(RepairOutcome::failed(Error::CacheUnavailable.to_string()));
        }

        let assessment = self.require_assessment(id).await?;

        if !remote_up {
            tracing::warn!(assessment_id = id, "Remote store unavailable, repairing local cache only");
            return Ok(repair::repair_local_cache(&self.local, &assessment));
        }

        let remote_responses = match self.remote.list_responses(Some(id), None).await {
            Ok(responses) => responses,
            Err(e) => {
                tracing::warn!(assessment_id = id, error = %e, "Remote response list failed, repairing local cache only");
                return Ok(repair::repair_local_cache(&self.local, &assessment));
            }
        };

        let plan = repair::plan_repairs(&assessment, &remote_responses);
        let mut outcome = repair::apply_plan(self.remote.as_ref(), &plan).await;

        if self.local.is_available() {
            let on_remote: BTreeSet<String> = remote_responses
                .iter()
                .map(|r| r.participant_id.clone())
                .collect();
            let mirrored = repair::repair_local_cache_except(&self.local, &assessment, &on_remote);
            tracing::debug!(
                assessment_id = id,
                local_only_fixed = mirrored.fixed,
                errors = mirrored.errors.len(),
                "Mirrored repair into local cache"
            );
            outcome.absorb(mirrored);
        }

        tracing::info!(
            assessment_id = id,
            planned = plan.actions.len(),
            fixed = outcome.fixed,
            errors = outcome.errors.len(),
            "Department repair finished"
        );
        Ok(outcome)
    }

    /// Deal with responses still carrying role-name or truncated departments
    ///
    /// On an assessment split by department they are removed from both
    /// tiers. Without departments every response feeds the single group, so
    /// the bad value is cleared and the response kept.
    pub async fn cleanup(&self, id: &str) -> Result<CleanupOutcome> {
        let assessment = self.require_assessment(id).await?;
        let responses = self.list_responses(Some(id), None).await?;
        let keep = !assessment.has_departments();

        let mut outcome = CleanupOutcome::default();
        for response in repair::corrupted(&assessment, &responses) {
            if keep {
                let mut cleared = response.clone();
                cleared.department = None;
                match self.save_response(&cleared).await {
                    Ok(()) => outcome.cleared += 1,
                    Err(e) => outcome.errors.push(format!(
                        "Failed to clear department of response {}: {}",
                        response.participant_id, e
                    )),
                }
                continue;
            }

            match self
                .delete_response(&response.assessment_id, &response.participant_id)
                .await
            {
                Ok(true) => outcome.removed += 1,
                Ok(false) => {}
                Err(e) => outcome.errors.push(format!(
                    "Failed to delete response {}: {}",
                    response.participant_id, e
                )),
            }
        }

        tracing::info!(
            assessment_id = id,
            removed = outcome.removed,
            cleared = outcome.cleared,
            errors = outcome.errors.len(),
            "Corrupted response cleanup finished"
        );
        Ok(outcome)
    }

    pub async fn migrate(&self, id: &str) -> Result<MigrationReport> {
        migration::run(self, id).await
    }
}

/// Demo organization: three departments, six questions over three categories
fn demo_definition() -> NewAssessment {
    NewAssessment {
        organization_name: "Demo Organization".to_string(),
        consultant_id: "demo".to_string(),
        departments: vec![
            "Sales".to_string(),
            "Engineering".to_string(),
            "Marketing".to_string(),
        ],
        questions: vec![
            Question::new("q1", "Leadership communicates a clear direction", "Leadership"),
            Question::new("q2", "Decisions are explained to the people they affect", "Leadership"),
            Question::new("q3", "Information reaches me when I need it", "Communication"),
            Question::new("q4", "I can raise concerns without hesitation", "Communication"),
            Question::new("q5", "Good work is recognized", "Culture"),
            Question::new("q6", "Teams cooperate across departments", "Culture"),
        ],
    }
}
