//! Assessment entity and its lifecycle state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::aggregate::{DepartmentAggregate, RoleAggregate};
use super::department::Department;
use super::response::Role;
use crate::{Error, Result};

/// Assessment lifecycle status
///
/// `Collecting` and `Ready` may move either way; `Locked` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentStatus {
    /// Participants are still submitting responses
    Collecting,
    /// Collection finished, results can be reviewed
    Ready,
    /// Read-only; only deletion is allowed
    Locked,
}

impl AssessmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentStatus::Collecting => "collecting",
            AssessmentStatus::Ready => "ready",
            AssessmentStatus::Locked => "locked",
        }
    }

    /// Whether a transition from `self` to `next` is permitted
    pub fn can_transition_to(&self, next: AssessmentStatus) -> bool {
        match (self, next) {
            (AssessmentStatus::Locked, AssessmentStatus::Locked) => true,
            (AssessmentStatus::Locked, _) => false,
            _ => true,
        }
    }
}

impl fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssessmentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "collecting" => Ok(AssessmentStatus::Collecting),
            "ready" => Ok(AssessmentStatus::Ready),
            "locked" => Ok(AssessmentStatus::Locked),
            other => Err(Error::Validation(format!(
                "Unknown assessment status '{}'",
                other
            ))),
        }
    }
}

/// Survey question, tagged with the category it feeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub category: String,
}

impl Question {
    pub fn new(id: impl Into<String>, text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            category: category.into(),
        }
    }
}

/// Number of responses received per role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseCounts {
    pub management: u32,
    pub employee: u32,
}

impl ResponseCounts {
    pub fn total(&self) -> u32 {
        self.management + self.employee
    }

    pub fn for_role(&self, role: Role) -> u32 {
        match role {
            Role::Management => self.management,
            Role::Employee => self.employee,
        }
    }
}

/// One organization's survey campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: String,
    pub organization_name: String,
    pub consultant_id: String,
    pub status: AssessmentStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub locked_at: Option<DateTime<Utc>>,
    pub access_code: String,
    #[serde(default)]
    pub code_regenerated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub departments: Vec<Department>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub response_counts: ResponseCounts,
    #[serde(default)]
    pub management_aggregate: RoleAggregate,
    #[serde(default)]
    pub employee_aggregate: RoleAggregate,
    #[serde(default)]
    pub department_aggregates: Option<Vec<DepartmentAggregate>>,
}

impl Assessment {
    pub fn is_locked(&self) -> bool {
        self.status == AssessmentStatus::Locked
    }

    /// Fail with a validation error naming `action` when the assessment is locked
    pub fn ensure_unlocked(&self, action: &str) -> Result<()> {
        if self.is_locked() {
            return Err(Error::Validation(format!(
                "Cannot {} on locked assessment {}",
                action, self.id
            )));
        }
        Ok(())
    }

    /// Apply a status transition, stamping `locked_at` when locking
    pub fn transition_to(&mut self, next: AssessmentStatus, at: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::Validation(format!(
                "Assessment {} is locked and cannot move to '{}'",
                self.id, next
            )));
        }
        if next == AssessmentStatus::Locked && self.status != AssessmentStatus::Locked {
            self.locked_at = Some(at);
        }
        self.status = next;
        Ok(())
    }

    pub fn department_ids(&self) -> Vec<&str> {
        self.departments.iter().map(|d| d.id.as_str()).collect()
    }

    pub fn department(&self, id: &str) -> Option<&Department> {
        self.departments.iter().find(|d| d.id == id)
    }

    pub fn has_departments(&self) -> bool {
        !self.departments.is_empty()
    }

    /// Case-insensitive lookup by display name
    pub fn department_by_name(&self, name: &str) -> Option<&Department> {
        let wanted = name.trim().to_lowercase();
        self.departments
            .iter()
            .find(|d| d.name.trim().to_lowercase() == wanted)
    }

    /// Category for a question id, if the question exists
    pub fn category_of(&self, question_id: &str) -> Option<&str> {
        self.questions
            .iter()
            .find(|q| q.id == question_id)
            .map(|q| q.category.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> Assessment {
        Assessment {
            id: "a1".to_string(),
            organization_name: "Acme".to_string(),
            consultant_id: "c1".to_string(),
            status: AssessmentStatus::Collecting,
            created_at: Utc::now(),
            locked_at: None,
            access_code: "ACME-XYZ123".to_string(),
            code_regenerated_at: None,
            departments: Vec::new(),
            questions: Vec::new(),
            response_counts: ResponseCounts::default(),
            management_aggregate: RoleAggregate::default(),
            employee_aggregate: RoleAggregate::default(),
            department_aggregates: None,
        }
    }

    #[test]
    fn test_collecting_and_ready_move_both_ways() {
        let mut a = sample();
        a.transition_to(AssessmentStatus::Ready, Utc::now()).unwrap();
        a.transition_to(AssessmentStatus::Collecting, Utc::now()).unwrap();
        assert_eq!(a.status, AssessmentStatus::Collecting);
        assert!(a.locked_at.is_none());
    }

    #[test]
    fn test_locking_stamps_locked_at() {
        let mut a = sample();
        a.transition_to(AssessmentStatus::Ready, Utc::now()).unwrap();
        a.transition_to(AssessmentStatus::Locked, Utc::now()).unwrap();
        assert!(a.is_locked());
        assert!(a.locked_at.is_some());
    }

    #[test]
    fn test_locked_never_regresses() {
        for next in [AssessmentStatus::Collecting, AssessmentStatus::Ready] {
            let mut a = sample();
            a.transition_to(AssessmentStatus::Locked, Utc::now()).unwrap();
            let locked_at = a.locked_at;

            assert!(a.transition_to(next, Utc::now()).is_err());
            assert_eq!(a.status, AssessmentStatus::Locked);
            assert_eq!(a.locked_at, locked_at);
        }
    }

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!("Ready".parse::<AssessmentStatus>().unwrap(), AssessmentStatus::Ready);
        assert_eq!(AssessmentStatus::Locked.to_string(), "locked");
        assert!("archived".parse::<AssessmentStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&AssessmentStatus::Collecting).unwrap();
        assert_eq!(json, "\"collecting\"");
    }

    #[test]
    fn test_missing_collections_default_on_deserialize() {
        let json = r#"{
            "id": "a2",
            "organization_name": "Beta",
            "consultant_id": "c9",
            "status": "ready",
            "created_at": "2024-01-01T00:00:00Z",
            "access_code": "BETA-ABC123"
        }"#;
        let a: Assessment = serde_json::from_str(json).unwrap();
        assert!(a.departments.is_empty());
        assert!(a.questions.is_empty());
        assert_eq!(a.response_counts.total(), 0);
        assert!(a.department_aggregates.is_none());
    }
}
