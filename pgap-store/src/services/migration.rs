//! Comprehensive department migration
//!
//! Ordered pipeline over one assessment:
//! 1. `initial_diagnosis`
//! 2. `repair` (skipped when nothing is corrupted)
//! 3. `verification`
//! 4. `cleanup` + `final_verification` when repair failed or corruption remains
//!    (departmentless assessments keep their responses with the value cleared)
//! 5. `refresh_aggregates`
//!
//! The run succeeds when the last diagnosis reports zero corrupted responses.

use pgap_common::Result;
use serde::Serialize;

use super::diagnostics::DepartmentDiagnosis;
use super::hybrid::HybridStore;

/// Result of one pipeline step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    pub name: String,
    pub success: bool,
    pub message: String,
}

impl OperationResult {
    fn new(name: &str, success: bool, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            success,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub assessment_id: String,
    pub success: bool,
    pub operations: Vec<OperationResult>,
    pub summary: String,
    pub final_diagnosis: DepartmentDiagnosis,
}

fn diagnosis_message(diagnosis: &DepartmentDiagnosis) -> String {
    format!(
        "{} responses, {} corrupted ({} role-based, {} truncated)",
        diagnosis.total_responses,
        diagnosis.corrupted_count,
        diagnosis.role_corrupted_count,
        diagnosis.truncation_corrupted_count
    )
}

/// Run the migration pipeline for one assessment
pub async fn run(store: &HybridStore, assessment_id: &str) -> Result<MigrationReport> {
    tracing::info!(assessment_id, "Starting department migration");
    let mut operations = Vec::new();

    let initial = store.diagnose(assessment_id).await?;
    operations.push(OperationResult::new("initial_diagnosis", true, diagnosis_message(&initial)));

    let mut fixed = 0;
    let mut repair_failed = false;
    let mut diagnosis = initial;

    if diagnosis.is_clean() {
        operations.push(OperationResult::new(
            "repair",
            true,
            "Skipped: no corrupted department values",
        ));
    } else {
        let outcome = store.repair(assessment_id).await?;
        fixed = outcome.fixed;
        repair_failed = !outcome.repaired;
        let message = if outcome.errors.is_empty() {
            format!("Repaired {} responses", outcome.fixed)
        } else {
            format!(
                "Repaired {} responses; {}",
                outcome.fixed,
                outcome.errors.join("; ")
            )
        };
        operations.push(OperationResult::new("repair", outcome.repaired, message));

        diagnosis = store.diagnose(assessment_id).await?;
        operations.push(OperationResult::new(
            "verification",
            diagnosis.is_clean(),
            diagnosis_message(&diagnosis),
        ));
    }

    let mut removed = 0;
    let mut cleared = 0;
    if repair_failed || !diagnosis.is_clean() {
        let cleanup = store.cleanup(assessment_id).await?;
        removed = cleanup.removed;
        cleared = cleanup.cleared;
        let mut message = format!(
            "Removed {} corrupted responses, cleared {} department values",
            cleanup.removed, cleanup.cleared
        );
        if !cleanup.errors.is_empty() {
            message = format!("{}; {}", message, cleanup.errors.join("; "));
        }
        operations.push(OperationResult::new("cleanup", cleanup.errors.is_empty(), message));

        diagnosis = store.diagnose(assessment_id).await?;
        operations.push(OperationResult::new(
            "final_verification",
            diagnosis.is_clean(),
            diagnosis_message(&diagnosis),
        ));
    }

    match store.refresh_aggregates(assessment_id).await {
        Ok(analytics) => operations.push(OperationResult::new(
            "refresh_aggregates",
            true,
            format!(
                "Aggregates recomputed ({} responses excluded)",
                analytics.excluded_responses
            ),
        )),
        Err(e) => {
            tracing::warn!(assessment_id, error = %e, "Aggregate refresh after migration failed");
            operations.push(OperationResult::new("refresh_aggregates", false, e.to_string()));
        }
    }

    let success = diagnosis.is_clean();
    let summary = if success {
        format!(
            "Migration completed successfully: {} repaired, {} removed, {} cleared",
            fixed, removed, cleared
        )
    } else {
        format!(
            "Migration finished with {} corrupted responses remaining",
            diagnosis.corrupted_count
        )
    };

    tracing::info!(
        assessment_id,
        success,
        fixed,
        removed,
        cleared,
        "Department migration finished"
    );

    Ok(MigrationReport {
        assessment_id: assessment_id.to_string(),
        success,
        operations,
        summary,
        final_diagnosis: diagnosis,
    })
}
