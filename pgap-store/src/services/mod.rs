//! Store services
//!
//! - `hybrid`: two-tier access manager and assessment lifecycle
//! - `diagnostics`: read-only department corruption report
//! - `repair`: department value repair and cleanup
//! - `migration`: diagnose, repair, verify, clean up

pub mod diagnostics;
pub mod hybrid;
pub mod migration;
pub mod repair;

pub use diagnostics::{diagnose, DepartmentDiagnosis};
pub use hybrid::{merge_by_key, AccessGrant, AssessmentWithResponses, HybridStore, NewAssessment};
pub use migration::{MigrationReport, OperationResult};
pub use repair::{CleanupOutcome, RepairOutcome, RepairPlan};
