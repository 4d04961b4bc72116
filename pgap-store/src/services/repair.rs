//! Department repair and cleanup
//!
//! Corrupted department values are mapped back to configured ids
//! (legacy abbreviation table when its target is configured, else a unique
//! prefix match). Role-name values cannot be mapped and are left for
//! cleanup.

use std::collections::BTreeSet;

use pgap_common::models::{Assessment, DepartmentRef, ParticipantResponse};
use pgap_common::Error;
use serde::Serialize;

use crate::adapters::local::LocalCache;
use crate::adapters::AssessmentStore;

/// One planned department rewrite
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepairAction {
    pub assessment_id: String,
    pub participant_id: String,
    pub from: String,
    /// `None` when no configured department can be inferred
    pub to: Option<String>,
}

impl RepairAction {
    fn unresolved_error(&self) -> String {
        format!(
            "Failed to update response {}: cannot determine correct department for '{}'",
            self.participant_id, self.from
        )
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairPlan {
    pub actions: Vec<RepairAction>,
}

impl RepairPlan {
    pub fn resolved(&self) -> impl Iterator<Item = (&RepairAction, &str)> {
        self.actions
            .iter()
            .filter_map(|a| a.to.as_deref().map(|to| (a, to)))
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &RepairAction> {
        self.actions.iter().filter(|a| a.to.is_none())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepairOutcome {
    /// At least one fix applied and the store stayed reachable
    pub repaired: bool,
    pub fixed: u32,
    pub errors: Vec<String>,
    /// A store stopped answering part way through
    pub connectivity_failure: bool,
}

impl RepairOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
            ..Self::default()
        }
    }

    /// Fold in the outcome of repairing another tier
    pub fn absorb(&mut self, other: RepairOutcome) {
        self.fixed += other.fixed;
        self.errors.extend(other.errors);
        self.connectivity_failure |= other.connectivity_failure;
        self.repaired = self.fixed > 0 && !self.connectivity_failure;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanupOutcome {
    pub removed: u32,
    /// Responses kept with their department cleared (departmentless assessments)
    pub cleared: u32,
    pub errors: Vec<String>,
}

/// Plan rewrites for every corrupted (role-name or truncated) response
pub fn plan_repairs(assessment: &Assessment, responses: &[ParticipantResponse]) -> RepairPlan {
    let actions = responses
        .iter()
        .filter(|r| r.assessment_id == assessment.id)
        .filter_map(|r| {
            let classified = DepartmentRef::classify(assessment, r.department.as_deref());
            if !classified.is_corrupted() {
                return None;
            }
            Some(RepairAction {
                assessment_id: r.assessment_id.clone(),
                participant_id: r.participant_id.clone(),
                from: r.department.clone().unwrap_or_default(),
                to: classified.repair_target().map(str::to_string),
            })
        })
        .collect();

    RepairPlan { actions }
}

/// Apply a plan with one targeted update per response
///
/// Continues past individual failures; a connectivity failure marks the
/// whole outcome as not repaired.
pub async fn apply_plan<S>(store: &S, plan: &RepairPlan) -> RepairOutcome
where
    S: AssessmentStore + ?Sized,
{
    let mut outcome = RepairOutcome::default();

    for (action, target) in plan.resolved() {
        match store
            .update_response_department(&action.assessment_id, &action.participant_id, target)
            .await
        {
            Ok(true) => {
                outcome.fixed += 1;
                tracing::debug!(
                    tier = store.tier().as_str(),
                    participant_id = %action.participant_id,
                    from = %action.from,
                    to = target,
                    "Repaired department value"
                );
            }
            Ok(false) => outcome.errors.push(format!(
                "Failed to update response {}: response not found",
                action.participant_id
            )),
            Err(e) => {
                outcome.connectivity_failure |= e.is_connectivity();
                outcome
                    .errors
                    .push(format!("Failed to update response {}: {}", action.participant_id, e));
            }
        }
    }

    outcome
        .errors
        .extend(plan.unresolved().map(RepairAction::unresolved_error));
    outcome.repaired = outcome.fixed > 0 && !outcome.connectivity_failure;
    outcome
}

/// Repair the local cache's serialized response collection in place
///
/// Works on raw JSON records so fields this build does not know about
/// survive the rewrite.
pub fn repair_local_cache(cache: &LocalCache, assessment: &Assessment) -> RepairOutcome {
    repair_local_cache_except(cache, assessment, &BTreeSet::new())
}

/// Like [`repair_local_cache`], but responses in `reported` are rewritten
/// without being counted or reported again
pub fn repair_local_cache_except(
    cache: &LocalCache,
    assessment: &Assessment,
    reported: &BTreeSet<String>,
) -> RepairOutcome {
    let mut records = match cache.raw_responses() {
        Ok(records) => records,
        Err(e @ Error::CacheUnavailable) => return RepairOutcome::failed(e.to_string()),
        Err(e) => return RepairOutcome::failed(format!("Failed to read local cache: {}", e)),
    };

    let mut outcome = RepairOutcome::default();
    let mut rewritten = 0u32;
    for record in records.iter_mut() {
        if record.get("assessment_id").and_then(|v| v.as_str()) != Some(assessment.id.as_str()) {
            continue;
        }
        let raw = record
            .get("department")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let classified = DepartmentRef::classify(assessment, raw.as_deref());
        if !classified.is_corrupted() {
            continue;
        }

        let participant_id = record
            .get("participant_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let counted = !reported.contains(&participant_id);

        match (classified.repair_target(), record.as_object_mut()) {
            (Some(target), Some(fields)) => {
                fields.insert("department".to_string(), serde_json::Value::from(target));
                rewritten += 1;
                if counted {
                    outcome.fixed += 1;
                }
            }
            _ if !counted => {}
            _ => outcome.errors.push(format!(
                "Failed to update response {}: cannot determine correct department for '{}'",
                participant_id,
                raw.unwrap_or_default()
            )),
        }
    }

    if rewritten > 0 {
        if let Err(e) = cache.write_raw_responses(&records) {
            return RepairOutcome::failed(format!("Failed to write local cache: {}", e));
        }
    }

    outcome.repaired = outcome.fixed > 0;
    outcome
}

/// Responses of `assessment` whose department is role-name or truncation corrupted
pub fn corrupted<'a>(
    assessment: &'a Assessment,
    responses: &'a [ParticipantResponse],
) -> impl Iterator<Item = &'a ParticipantResponse> + 'a {
    responses.iter().filter(move |r| {
        r.assessment_id == assessment.id
            && DepartmentRef::classify(assessment, r.department.as_deref()).is_corrupted()
    })
}
