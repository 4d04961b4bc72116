//! Aggregation engine
//!
//! Pure folds from an assessment and its raw responses to role, department
//! and organization-wide statistics. No I/O happens here.
//!
//! **Rules:**
//! - Null scores are excluded from both numerator and denominator
//! - Overall average = mean of all raw scores, not the mean of category means
//! - Organization rollup across departments weights by response count
//! - Responses with corrupt or orphaned departments are excluded when the
//!   assessment is split by department
//! - Responses with no department still count toward the role aggregates
//!   but belong to no department aggregate

use std::collections::BTreeMap;

use crate::models::{
    Assessment, AssessmentAnalytics, CategoryAverage, DepartmentAggregate, DepartmentRef,
    NarrativeContext, ParticipantResponse, PerceptionGap, ResponseCounts, Role, RoleAggregate,
};

const UNCATEGORIZED: &str = "Uncategorized";

/// Maximum possible distance between two scores on the 1-10 scale
const SCALE_SPAN: f64 = 9.0;

#[derive(Default)]
struct Accumulator {
    sum: f64,
    count: u32,
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn push_weighted(&mut self, average: f64, count: u32) {
        self.sum += average * count as f64;
        self.count += count;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

fn category_for<'a>(assessment: &'a Assessment, question_id: &str, category: &'a str) -> &'a str {
    if !category.trim().is_empty() {
        return category;
    }
    assessment
        .category_of(question_id)
        .unwrap_or(UNCATEGORIZED)
}

/// Fold one role's responses into category and overall averages
pub fn role_aggregate<'a, I>(assessment: &Assessment, responses: I) -> RoleAggregate
where
    I: IntoIterator<Item = &'a ParticipantResponse>,
{
    let mut categories: BTreeMap<String, Accumulator> = BTreeMap::new();
    let mut overall = Accumulator::default();
    let mut participants = 0u32;

    for response in responses {
        participants += 1;
        for answer in &response.answers {
            let Some(score) = answer.score else { continue };
            let category = category_for(assessment, &answer.question_id, &answer.category);
            categories.entry(category.to_string()).or_default().push(score);
            overall.push(score);
        }
    }

    RoleAggregate {
        categories: categories
            .into_iter()
            .map(|(category, acc)| CategoryAverage {
                category,
                average: acc.mean(),
                response_count: acc.count,
            })
            .collect(),
        overall_average: overall.mean(),
        response_count: participants,
    }
}

/// Count-weighted rollup of several role aggregates
///
/// Each category becomes `Σ(average × count) / Σ(count)`; the rolled-up
/// overall uses the same weighting across every category entry.
pub fn rollup<'a, I>(aggregates: I) -> RoleAggregate
where
    I: IntoIterator<Item = &'a RoleAggregate>,
{
    let mut categories: BTreeMap<String, Accumulator> = BTreeMap::new();
    let mut overall = Accumulator::default();
    let mut participants = 0u32;

    for aggregate in aggregates {
        participants += aggregate.response_count;
        for entry in &aggregate.categories {
            categories
                .entry(entry.category.clone())
                .or_default()
                .push_weighted(entry.average, entry.response_count);
            overall.push_weighted(entry.average, entry.response_count);
        }
    }

    RoleAggregate {
        categories: categories
            .into_iter()
            .map(|(category, acc)| CategoryAverage {
                category,
                average: acc.mean(),
                response_count: acc.count,
            })
            .collect(),
        overall_average: overall.mean(),
        response_count: participants,
    }
}

/// Gaps for every category both roles have scores for
pub fn perception_gaps(management: &RoleAggregate, employee: &RoleAggregate) -> Vec<PerceptionGap> {
    management
        .categories
        .iter()
        .filter(|m| m.response_count > 0)
        .filter_map(|m| {
            employee
                .category(&m.category)
                .filter(|e| e.response_count > 0)
                .map(|e| PerceptionGap::new(m.category.clone(), m.average, e.average))
        })
        .collect()
}

/// 0-100 agreement between roles; 0 when nothing can be compared
pub fn alignment_score(gaps: &[PerceptionGap]) -> f64 {
    if gaps.is_empty() {
        return 0.0;
    }
    let mean_abs = gaps.iter().map(|g| g.gap.abs()).sum::<f64>() / gaps.len() as f64;
    (100.0 * (1.0 - mean_abs / SCALE_SPAN)).clamp(0.0, 100.0)
}

/// Responses per role for the given assessment
pub fn response_counts(responses: &[ParticipantResponse]) -> ResponseCounts {
    responses.iter().fold(ResponseCounts::default(), |mut counts, r| {
        match r.role {
            Role::Management => counts.management += 1,
            Role::Employee => counts.employee += 1,
        }
        counts
    })
}

fn department_aggregate(
    assessment: &Assessment,
    id: &str,
    name: &str,
    responses: &[&ParticipantResponse],
) -> DepartmentAggregate {
    let management = role_aggregate(
        assessment,
        responses.iter().copied().filter(|r| r.role == Role::Management),
    );
    let employee = role_aggregate(
        assessment,
        responses.iter().copied().filter(|r| r.role == Role::Employee),
    );
    DepartmentAggregate {
        department_id: id.to_string(),
        department_name: name.to_string(),
        gaps: perception_gaps(&management, &employee),
        management_count: management.response_count,
        employee_count: employee.response_count,
        management,
        employee,
    }
}

/// Recompute all analytics for an assessment from its responses
///
/// Responses belonging to other assessments are ignored.
pub fn compute_analytics(
    assessment: &Assessment,
    responses: &[ParticipantResponse],
) -> AssessmentAnalytics {
    let own: Vec<&ParticipantResponse> = responses
        .iter()
        .filter(|r| r.assessment_id == assessment.id)
        .collect();

    if !assessment.has_departments() {
        let management = role_aggregate(
            assessment,
            own.iter().copied().filter(|r| r.role == Role::Management),
        );
        let employee = role_aggregate(
            assessment,
            own.iter().copied().filter(|r| r.role == Role::Employee),
        );
        let gaps = perception_gaps(&management, &employee);
        return AssessmentAnalytics {
            assessment_id: assessment.id.clone(),
            alignment_score: alignment_score(&gaps),
            management,
            employee,
            gaps,
            departments: Vec::new(),
            excluded_responses: 0,
        };
    }

    let mut grouped: BTreeMap<String, Vec<&ParticipantResponse>> = BTreeMap::new();
    let mut unassigned: Vec<&ParticipantResponse> = Vec::new();
    let mut excluded = 0u32;
    for response in own {
        match DepartmentRef::classify(assessment, response.department.as_deref()) {
            DepartmentRef::Valid { id } => grouped.entry(id).or_default().push(response),
            DepartmentRef::Unassigned => unassigned.push(response),
            DepartmentRef::Corrupted { .. } => excluded += 1,
        }
    }

    let departments: Vec<DepartmentAggregate> = assessment
        .departments
        .iter()
        .map(|dept| {
            let members = grouped.get(&dept.id).map(Vec::as_slice).unwrap_or(&[]);
            department_aggregate(assessment, &dept.id, &dept.name, members)
        })
        .collect();

    let unassigned_management = role_aggregate(
        assessment,
        unassigned.iter().copied().filter(|r| r.role == Role::Management),
    );
    let unassigned_employee = role_aggregate(
        assessment,
        unassigned.iter().copied().filter(|r| r.role == Role::Employee),
    );

    let management = rollup(
        departments
            .iter()
            .map(|d| &d.management)
            .chain(std::iter::once(&unassigned_management)),
    );
    let employee = rollup(
        departments
            .iter()
            .map(|d| &d.employee)
            .chain(std::iter::once(&unassigned_employee)),
    );
    let gaps = perception_gaps(&management, &employee);

    AssessmentAnalytics {
        assessment_id: assessment.id.clone(),
        alignment_score: alignment_score(&gaps),
        management,
        employee,
        gaps,
        departments,
        excluded_responses: excluded,
    }
}

/// True when responses exist but the department aggregate cache is empty
pub fn needs_recompute(assessment: &Assessment) -> bool {
    assessment.response_counts.total() > 0
        && assessment.has_departments()
        && assessment
            .department_aggregates
            .as_ref()
            .map_or(true, |aggregates| aggregates.is_empty())
}

/// Store freshly computed analytics on the assessment's cache fields
pub fn apply_analytics(
    assessment: &mut Assessment,
    analytics: &AssessmentAnalytics,
    counts: ResponseCounts,
) {
    assessment.response_counts = counts;
    assessment.management_aggregate = analytics.management.clone();
    assessment.employee_aggregate = analytics.employee.clone();
    assessment.department_aggregates = if assessment.has_departments() {
        Some(analytics.departments.clone())
    } else {
        None
    };
}

/// Build the context handed to the narrative generator
///
/// Returns `None` for an unknown department id.
pub fn narrative_context(
    analytics: &AssessmentAnalytics,
    role: Role,
    department_id: Option<&str>,
) -> Option<NarrativeContext> {
    let (aggregate, department) = match department_id {
        Some(id) => {
            let dept = analytics.departments.iter().find(|d| d.department_id == id)?;
            (dept.for_role(role), Some(dept.department_name.clone()))
        }
        None => match role {
            Role::Management => (&analytics.management, None),
            Role::Employee => (&analytics.employee, None),
        },
    };

    Some(NarrativeContext {
        role,
        department,
        category_averages: aggregate.categories.clone(),
        overall_average: aggregate.overall_average,
        response_count: aggregate.response_count,
    })
}
