//! Identifier and access-code generation
//!
//! Department slugs are short and lossy by construction. That shortness is
//! where truncated department values on old responses came from, so any
//! stored reference must carry the full slug.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

use crate::models::{Department, Role};

/// Maximum length of a department slug before the collision counter
pub const SLUG_MAX_LEN: usize = 8;

/// Maximum length of the organization prefix in access codes
pub const ORG_PREFIX_MAX_LEN: usize = 8;

/// Maximum length of the department prefix in access codes
pub const DEPT_PREFIX_MAX_LEN: usize = 3;

const FALLBACK_SLUG: &str = "dept";
const FALLBACK_ORG_PREFIX: &str = "ORG";

/// Generate a new assessment id
pub fn assessment_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a new participant token (never a database key)
pub fn participant_id() -> String {
    format!("p-{}", Uuid::new_v4().simple())
}

fn alphanumeric(value: &str) -> impl Iterator<Item = char> + '_ {
    value.chars().filter(|c| c.is_ascii_alphanumeric())
}

/// Slug for a department name, disambiguated against `existing_ids`
///
/// Lowercase, alphanumerics only, truncated to [`SLUG_MAX_LEN`]; on collision
/// a counter starting at 1 is appended.
pub fn department_slug<'a, I>(name: &str, existing_ids: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut base: String = alphanumeric(name)
        .map(|c| c.to_ascii_lowercase())
        .take(SLUG_MAX_LEN)
        .collect();
    if base.is_empty() {
        base = FALLBACK_SLUG.to_string();
    }

    let existing: Vec<&str> = existing_ids.into_iter().collect();
    if !existing.contains(&base.as_str()) {
        return base;
    }

    let mut counter = 1u32;
    loop {
        let candidate = format!("{}{}", base, counter);
        if !existing.contains(&candidate.as_str()) {
            return candidate;
        }
        counter += 1;
    }
}

/// Uppercase alphanumeric organization prefix (at most 8 chars)
pub fn org_prefix(organization_name: &str) -> String {
    let prefix: String = alphanumeric(organization_name)
        .map(|c| c.to_ascii_uppercase())
        .take(ORG_PREFIX_MAX_LEN)
        .collect();
    if prefix.is_empty() {
        FALLBACK_ORG_PREFIX.to_string()
    } else {
        prefix
    }
}

/// Uppercase alphanumeric department prefix (at most 3 chars)
pub fn dept_prefix(department_name: &str) -> String {
    alphanumeric(department_name)
        .map(|c| c.to_ascii_uppercase())
        .take(DEPT_PREFIX_MAX_LEN)
        .collect()
}

/// `{ORG}-{MGMT|EMP}-{DEPT}{4 digits}`
pub fn department_access_code(
    organization_name: &str,
    role: Role,
    department_name: &str,
    at: DateTime<Utc>,
) -> String {
    format!(
        "{}-{}-{}{}",
        org_prefix(organization_name),
        role.code_token(),
        dept_prefix(department_name),
        crate::time::four_digit_suffix(at)
    )
}

/// `{ORG}-{6 random uppercase alphanumerics}`
pub fn assessment_access_code(organization_name: &str) -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(|b| (b as char).to_ascii_uppercase())
        .take(6)
        .collect();
    format!("{}-{}", org_prefix(organization_name), token)
}

/// Build a department for `name`, choosing a slug unique within `existing`
pub fn new_department(
    organization_name: &str,
    name: &str,
    existing: &[Department],
    at: DateTime<Utc>,
) -> Department {
    let id = department_slug(name, existing.iter().map(|d| d.id.as_str()));
    Department {
        id,
        name: name.trim().to_string(),
        management_code: department_access_code(organization_name, Role::Management, name, at),
        employee_code: department_access_code(organization_name, Role::Employee, name, at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_slug_is_lowercase_alphanumeric_and_bounded() {
        assert_eq!(department_slug("Sales", []), "sales");
        assert_eq!(department_slug("Research & Development", []), "research");
        assert_eq!(department_slug("H.R.", []), "hr");
    }

    #[test]
    fn test_slug_collision_appends_counter_from_one() {
        assert_eq!(department_slug("Sales", ["sales"]), "sales1");
        assert_eq!(department_slug("SALES!", ["sales", "sales1"]), "sales2");
        assert_eq!(
            department_slug("Engineering West", ["engineer"]),
            "engineer1"
        );
    }

    #[test]
    fn test_slug_fallback_for_symbols_only() {
        assert_eq!(department_slug("---", []), "dept");
    }

    #[test]
    fn test_department_access_code_layout() {
        let at = Utc.timestamp_millis_opt(1_700_000_001_234).unwrap();
        assert_eq!(
            department_access_code("Acme Widgets Inc", Role::Management, "Sales", at),
            "ACMEWIDG-MGMT-SAL1234"
        );
        assert_eq!(
            department_access_code("Acme", Role::Employee, "HR", at),
            "ACME-EMP-HR1234"
        );
    }

    #[test]
    fn test_assessment_access_code_shape() {
        let code = assessment_access_code("Northwind Traders");
        let (prefix, token) = code.split_once('-').unwrap();
        assert_eq!(prefix, "NORTHWIN");
        assert_eq!(token.len(), 6);
        assert!(token.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_new_department_uses_existing_ids() {
        let at = Utc::now();
        let first = new_department("Acme", "Sales", &[], at);
        let second = new_department("Acme", "Sales West", &[first.clone()], at);
        assert_eq!(first.id, "sales");
        assert_eq!(second.id, "saleswes");
        assert!(second.management_code.starts_with("ACME-MGMT-SAL"));
    }

    #[test]
    fn test_participant_ids_are_unique_tokens() {
        assert_ne!(participant_id(), participant_id());
        assert!(participant_id().starts_with("p-"));
    }
}
