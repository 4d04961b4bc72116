//! Department entity and department-reference classification
//!
//! Department values on responses were historically written as truncated
//! slugs or role names. Every raw value is classified once into a
//! [`DepartmentRef`] so that aggregation never inspects raw strings.

use serde::{Deserialize, Serialize};

use super::assessment::Assessment;

/// Legacy abbreviations seen in old response records, mapped to full ids
///
/// Compatibility list only; new departments rely on prefix matching.
pub const LEGACY_ABBREVIATIONS: &[(&str, &str)] = &[
    ("SAL", "sales"),
    ("ENG", "engineering"),
    ("MAR", "marketing"),
    ("HR", "hr"),
    ("FIN", "finance"),
];

/// Role tokens that have been found in department fields
const ROLE_TOKENS: &[&str] = &["management", "employee", "mgmt", "emp"];

/// Named organizational unit with role-scoped access codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    /// Full slug; stored references must always carry all of it
    pub id: String,
    pub name: String,
    pub management_code: String,
    pub employee_code: String,
}

/// Why a department value is considered corrupt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorruptionCause {
    /// Value is a role name; department attribution is lost
    RoleName,
    /// Value is a shortened department token
    Truncated {
        /// Configured department the value most likely meant
        candidate: Option<String>,
    },
    /// Value matches nothing known
    Unrecognized,
}

/// Classified department reference of a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DepartmentRef {
    /// Exactly matches a configured department id
    Valid { id: String },
    /// No department value recorded
    Unassigned,
    /// Anything else
    Corrupted { raw: String, cause: CorruptionCause },
}

impl DepartmentRef {
    /// Classify a raw department value against an assessment's departments
    pub fn classify(assessment: &Assessment, raw: Option<&str>) -> Self {
        let raw = match raw.map(str::trim) {
            Some(value) if !value.is_empty() => value,
            _ => return DepartmentRef::Unassigned,
        };

        if assessment.departments.iter().any(|d| d.id == raw) {
            return DepartmentRef::Valid { id: raw.to_string() };
        }

        let lower = raw.to_lowercase();
        if ROLE_TOKENS.contains(&lower.as_str()) {
            return DepartmentRef::Corrupted {
                raw: raw.to_string(),
                cause: CorruptionCause::RoleName,
            };
        }

        let prefix_candidate = unique_prefix_match(assessment, &lower);

        if let Some(target) = legacy_abbreviation(raw) {
            let candidate = if assessment.department(target).is_some() {
                Some(target.to_string())
            } else {
                prefix_candidate
            };
            return DepartmentRef::Corrupted {
                raw: raw.to_string(),
                cause: CorruptionCause::Truncated { candidate },
            };
        }

        if let Some(id) = prefix_candidate {
            return DepartmentRef::Corrupted {
                raw: raw.to_string(),
                cause: CorruptionCause::Truncated { candidate: Some(id) },
            };
        }

        DepartmentRef::Corrupted {
            raw: raw.to_string(),
            cause: CorruptionCause::Unrecognized,
        }
    }

    /// Role-name and truncation corruption; unrecognized values don't count
    pub fn is_corrupted(&self) -> bool {
        matches!(
            self,
            DepartmentRef::Corrupted {
                cause: CorruptionCause::RoleName | CorruptionCause::Truncated { .. },
                ..
            }
        )
    }

    /// Department id a corrupted value should be rewritten to, if known
    pub fn repair_target(&self) -> Option<&str> {
        match self {
            DepartmentRef::Corrupted {
                cause: CorruptionCause::Truncated { candidate: Some(id) },
                ..
            } => Some(id),
            _ => None,
        }
    }
}

/// Look up a value in the legacy abbreviation table (case-insensitive)
pub fn legacy_abbreviation(raw: &str) -> Option<&'static str> {
    let upper = raw.trim().to_uppercase();
    LEGACY_ABBREVIATIONS
        .iter()
        .find(|(abbr, _)| *abbr == upper)
        .map(|(_, target)| *target)
}

/// The single configured department id that starts with `lower`, if exactly one does
fn unique_prefix_match(assessment: &Assessment, lower: &str) -> Option<String> {
    let mut matches = assessment
        .departments
        .iter()
        .filter(|d| d.id.to_lowercase().starts_with(lower));
    match (matches.next(), matches.next()) {
        (Some(dept), None) => Some(dept.id.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssessmentStatus, ResponseCounts, RoleAggregate};
    use chrono::Utc;

    fn dept(id: &str, name: &str) -> Department {
        Department {
            id: id.to_string(),
            name: name.to_string(),
            management_code: format!("ACME-MGMT-{}0001", id.to_uppercase()),
            employee_code: format!("ACME-EMP-{}0001", id.to_uppercase()),
        }
    }

    fn assessment_with(departments: Vec<Department>) -> Assessment {
        Assessment {
            id: "a1".to_string(),
            organization_name: "Acme".to_string(),
            consultant_id: "c1".to_string(),
            status: AssessmentStatus::Collecting,
            created_at: Utc::now(),
            locked_at: None,
            access_code: "ACME-AAAAAA".to_string(),
            code_regenerated_at: None,
            departments,
            questions: Vec::new(),
            response_counts: ResponseCounts::default(),
            management_aggregate: RoleAggregate::default(),
            employee_aggregate: RoleAggregate::default(),
            department_aggregates: None,
        }
    }

    #[test]
    fn test_exact_id_is_valid() {
        let a = assessment_with(vec![dept("sales", "Sales")]);
        assert_eq!(
            DepartmentRef::classify(&a, Some("sales")),
            DepartmentRef::Valid { id: "sales".to_string() }
        );
    }

    #[test]
    fn test_role_name_is_role_corrupted_regardless_of_configuration() {
        for departments in [vec![], vec![dept("sales", "Sales")]] {
            let a = assessment_with(departments);
            let r = DepartmentRef::classify(&a, Some("Management"));
            assert!(matches!(
                r,
                DepartmentRef::Corrupted { cause: CorruptionCause::RoleName, .. }
            ));
            assert!(r.is_corrupted());
            assert_eq!(r.repair_target(), None);
        }
    }

    #[test]
    fn test_legacy_abbreviation_maps_to_configured_department() {
        let a = assessment_with(vec![dept("sales", "Sales"), dept("engineer", "Engineering")]);
        let r = DepartmentRef::classify(&a, Some("SAL"));
        assert!(r.is_corrupted());
        assert_eq!(r.repair_target(), Some("sales"));
    }

    #[test]
    fn test_legacy_abbreviation_without_target_falls_back_to_prefix() {
        // "engineering" is not configured, but the 8-char slug is
        let a = assessment_with(vec![dept("engineer", "Engineering")]);
        let r = DepartmentRef::classify(&a, Some("ENG"));
        assert_eq!(r.repair_target(), Some("engineer"));
    }

    #[test]
    fn test_legacy_abbreviation_with_no_candidate_still_counts() {
        let a = assessment_with(vec![]);
        let r = DepartmentRef::classify(&a, Some("fin"));
        assert!(r.is_corrupted());
        assert_eq!(r.repair_target(), None);
    }

    #[test]
    fn test_unique_prefix_is_truncation() {
        let a = assessment_with(vec![dept("operatio", "Operations"), dept("sales", "Sales")]);
        let r = DepartmentRef::classify(&a, Some("OP"));
        assert_eq!(r.repair_target(), Some("operatio"));
    }

    #[test]
    fn test_ambiguous_prefix_is_unrecognized() {
        let a = assessment_with(vec![dept("sales", "Sales"), dept("sales1", "Sales West")]);
        let r = DepartmentRef::classify(&a, Some("sa"));
        assert!(matches!(
            r,
            DepartmentRef::Corrupted { cause: CorruptionCause::Unrecognized, .. }
        ));
        assert!(!r.is_corrupted());
    }

    #[test]
    fn test_missing_value_is_unassigned() {
        let a = assessment_with(vec![dept("sales", "Sales")]);
        assert_eq!(DepartmentRef::classify(&a, None), DepartmentRef::Unassigned);
        assert_eq!(DepartmentRef::classify(&a, Some("  ")), DepartmentRef::Unassigned);
    }
}
