//! Derived aggregate records
//!
//! These are caches recomputed from responses; they are never a source of
//! truth.

use serde::{Deserialize, Serialize};

use super::response::Role;

/// Mean score for one category (1-10 scale)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAverage {
    pub category: String,
    pub average: f64,
    /// Number of scores feeding the mean
    pub response_count: u32,
}

/// Category-level and overall averages for one role within some scope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleAggregate {
    #[serde(default)]
    pub categories: Vec<CategoryAverage>,
    #[serde(default)]
    pub overall_average: f64,
    /// Number of participants
    #[serde(default)]
    pub response_count: u32,
}

impl RoleAggregate {
    pub fn category(&self, name: &str) -> Option<&CategoryAverage> {
        self.categories.iter().find(|c| c.category == name)
    }

    pub fn is_empty(&self) -> bool {
        self.response_count == 0
    }
}

/// Gap significance tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Significance {
    Low,
    Medium,
    High,
}

impl Significance {
    /// `high` above 2.5, `medium` above 1.5, otherwise `low` (strict bounds)
    pub fn from_gap(gap: f64) -> Self {
        let magnitude = gap.abs();
        if magnitude > 2.5 {
            Significance::High
        } else if magnitude > 1.5 {
            Significance::Medium
        } else {
            Significance::Low
        }
    }
}

/// Which side scored a category higher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapDirection {
    ManagementHigher,
    EmployeeHigher,
    Aligned,
}

/// Signed management-minus-employee difference for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionGap {
    pub category: String,
    pub management_score: f64,
    pub employee_score: f64,
    pub gap: f64,
    pub direction: GapDirection,
    pub significance: Significance,
}

impl PerceptionGap {
    pub fn new(category: impl Into<String>, management_score: f64, employee_score: f64) -> Self {
        let gap = management_score - employee_score;
        let direction = if gap > 0.0 {
            GapDirection::ManagementHigher
        } else if gap < 0.0 {
            GapDirection::EmployeeHigher
        } else {
            GapDirection::Aligned
        };
        Self {
            category: category.into(),
            management_score,
            employee_score,
            gap,
            direction,
            significance: Significance::from_gap(gap),
        }
    }
}

/// Per-department comparison of both roles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentAggregate {
    pub department_id: String,
    pub department_name: String,
    pub management: RoleAggregate,
    pub employee: RoleAggregate,
    #[serde(default)]
    pub gaps: Vec<PerceptionGap>,
    pub management_count: u32,
    pub employee_count: u32,
}

impl DepartmentAggregate {
    pub fn for_role(&self, role: Role) -> &RoleAggregate {
        match role {
            Role::Management => &self.management,
            Role::Employee => &self.employee,
        }
    }
}

/// Full analytics result for one assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentAnalytics {
    pub assessment_id: String,
    pub management: RoleAggregate,
    pub employee: RoleAggregate,
    pub gaps: Vec<PerceptionGap>,
    /// 0-100; 100 means both roles scored every category identically
    pub alignment_score: f64,
    pub departments: Vec<DepartmentAggregate>,
    /// Responses left out because of corrupt or orphaned departments
    pub excluded_responses: u32,
}

/// Context object handed to the external narrative generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeContext {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub category_averages: Vec<CategoryAverage>,
    pub overall_average: f64,
    pub response_count: u32,
}
