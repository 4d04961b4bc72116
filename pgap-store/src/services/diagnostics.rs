//! Department corruption diagnostics
//!
//! Read-only classification of every response's department value against
//! the owning assessment's configured departments.

use pgap_common::models::{
    Assessment, CorruptionCause, DepartmentRef, ParticipantResponse,
};
use serde::Serialize;
use std::collections::BTreeSet;

/// Classification of one response's department value
#[derive(Debug, Clone, Serialize)]
pub struct ResponseClassification {
    pub participant_id: String,
    pub raw: Option<String>,
    pub department: DepartmentRef,
}

/// Department health of one assessment
#[derive(Debug, Clone, Serialize)]
pub struct DepartmentDiagnosis {
    pub assessment_id: String,
    pub total_responses: u32,
    /// Role-name plus truncation corruption
    pub corrupted_count: u32,
    pub role_corrupted_count: u32,
    pub truncation_corrupted_count: u32,
    pub unrecognized_count: u32,
    /// Distinct unrecognized raw values, sorted
    pub unrecognized_values: Vec<String>,
    pub unassigned_count: u32,
    pub valid_departments: Vec<String>,
    /// Distinct raw values seen on responses, sorted
    pub observed_values: Vec<String>,
    pub classifications: Vec<ResponseClassification>,
    pub suggestions: Vec<String>,
}

impl DepartmentDiagnosis {
    /// No role-name or truncation corruption
    pub fn is_clean(&self) -> bool {
        self.corrupted_count == 0
    }
}

/// Diagnose department values of `responses` that belong to `assessment`
///
/// **Algorithm:**
/// 1. Classify each value once via [`DepartmentRef::classify`]
/// 2. A missing value on an assessment without departments is the implicit
///    single group and counts as valid
/// 3. Tally causes and derive suggestions
pub fn diagnose(assessment: &Assessment, responses: &[ParticipantResponse]) -> DepartmentDiagnosis {
    let mut diagnosis = DepartmentDiagnosis {
        assessment_id: assessment.id.clone(),
        total_responses: 0,
        corrupted_count: 0,
        role_corrupted_count: 0,
        truncation_corrupted_count: 0,
        unrecognized_count: 0,
        unrecognized_values: Vec::new(),
        unassigned_count: 0,
        valid_departments: assessment.departments.iter().map(|d| d.id.clone()).collect(),
        observed_values: Vec::new(),
        classifications: Vec::new(),
        suggestions: Vec::new(),
    };

    let mut observed = BTreeSet::new();
    let mut unrecognized = BTreeSet::new();

    for response in responses.iter().filter(|r| r.assessment_id == assessment.id) {
        diagnosis.total_responses += 1;
        let raw = response.department.clone();
        if let Some(value) = raw.as_deref().filter(|v| !v.trim().is_empty()) {
            observed.insert(value.to_string());
        }

        let department = DepartmentRef::classify(assessment, raw.as_deref());
        match &department {
            DepartmentRef::Valid { .. } => {}
            DepartmentRef::Unassigned => {
                if assessment.has_departments() {
                    diagnosis.unassigned_count += 1;
                }
            }
            DepartmentRef::Corrupted { raw, cause } => match cause {
                CorruptionCause::RoleName => diagnosis.role_corrupted_count += 1,
                CorruptionCause::Truncated { .. } => diagnosis.truncation_corrupted_count += 1,
                CorruptionCause::Unrecognized => {
                    diagnosis.unrecognized_count += 1;
                    unrecognized.insert(raw.clone());
                }
            },
        }

        diagnosis.classifications.push(ResponseClassification {
            participant_id: response.participant_id.clone(),
            raw,
            department,
        });
    }

    diagnosis.corrupted_count = diagnosis.role_corrupted_count + diagnosis.truncation_corrupted_count;
    diagnosis.observed_values = observed.into_iter().collect();
    diagnosis.unrecognized_values = unrecognized.into_iter().collect();
    diagnosis.suggestions = suggestions(assessment, &diagnosis);

    tracing::debug!(
        assessment_id = %assessment.id,
        total = diagnosis.total_responses,
        corrupted = diagnosis.corrupted_count,
        unrecognized = diagnosis.unrecognized_count,
        unassigned = diagnosis.unassigned_count,
        "Department diagnosis complete"
    );

    diagnosis
}

fn suggestions(assessment: &Assessment, diagnosis: &DepartmentDiagnosis) -> Vec<String> {
    let mut out = Vec::new();

    if !assessment.has_departments() {
        out.push("Assessment has no department configuration".to_string());
    }
    if diagnosis.role_corrupted_count > 0 {
        out.push(format!(
            "Found {} corrupted responses with role-based department values",
            diagnosis.role_corrupted_count
        ));
    }
    if diagnosis.truncation_corrupted_count > 0 {
        out.push(format!(
            "Found {} responses with truncated department values",
            diagnosis.truncation_corrupted_count
        ));
    }
    if diagnosis.unrecognized_count > 0 {
        out.push(format!(
            "Found {} responses with unrecognized department values: {}",
            diagnosis.unrecognized_count,
            diagnosis.unrecognized_values.join(", ")
        ));
    }
    if diagnosis.unassigned_count > 0 {
        out.push(format!(
            "Found {} responses with no department assigned",
            diagnosis.unassigned_count
        ));
    }
    if diagnosis.corrupted_count == 0
        && diagnosis.unrecognized_count == 0
        && diagnosis.unassigned_count == 0
    {
        out.push("All department values are valid".to_string());
    }

    out
}
