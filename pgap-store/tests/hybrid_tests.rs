//! Hybrid store integration tests: read fallback, write-through and the
//! assessment lifecycle

mod helpers;

use helpers::{fixture, fixture_with, new_assessment, scored_response};
use pgap_common::config::StoreSettings;
use pgap_common::models::{AssessmentStatus, Role};
use pgap_common::Error;
use pgap_store::adapters::local::{LocalCache, DEMO_DELETED_KEY};

// =============================================================================
// Read / write tiers
// =============================================================================

#[tokio::test]
async fn test_response_written_while_remote_down_is_readable() {
    let f = fixture();
    let assessment = f
        .store
        .create_assessment(new_assessment("Acme", &["Sales"]))
        .await
        .unwrap();

    f.remote.set_available(false);
    let response = scored_response(
        &assessment.id,
        Role::Employee,
        Some("sales"),
        &[("q1", "Leadership", Some(6.0))],
    );
    f.store.record_response(response.clone()).await.unwrap();

    let loaded = f
        .store
        .get_assessment_with_responses(&assessment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.responses.len(), 1);
    assert_eq!(loaded.responses[0].participant_id, response.participant_id);

    // Remote never saw it
    assert!(f.remote.data().responses(Some(&assessment.id), None).is_empty());
}

#[tokio::test]
async fn test_local_only_entries_merge_after_remote_recovers() {
    let f = fixture();
    let remote_side = f
        .store
        .create_assessment(new_assessment("Acme", &[]))
        .await
        .unwrap();

    f.remote.set_available(false);
    let local_side = f
        .store
        .create_assessment(new_assessment("Beta", &[]))
        .await
        .unwrap();
    f.remote.set_available(true);

    let all = f.store.list_assessments().await.unwrap();
    let ids: Vec<_> = all.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![remote_side.id.as_str(), local_side.id.as_str()]);
}

#[tokio::test]
async fn test_remote_version_wins_on_conflict() {
    let f = fixture();
    let mut assessment = f
        .store
        .create_assessment(new_assessment("Acme", &[]))
        .await
        .unwrap();

    assessment.organization_name = "Acme Remote".to_string();
    f.remote.data().upsert_assessment(&assessment).unwrap();

    let all = f.store.list_assessments().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].organization_name, "Acme Remote");
}

#[tokio::test]
async fn test_remote_write_failure_is_not_raised() {
    let f = fixture();
    f.remote.set_fail_writes(true);

    let assessment = f
        .store
        .create_assessment(new_assessment("Acme", &[]))
        .await
        .unwrap();

    assert!(f.store.local().find_assessment(&assessment.id).is_some());
    assert!(f.remote.data().find_assessment(&assessment.id).is_none());
}

#[tokio::test]
async fn test_write_fails_when_both_tiers_fail() {
    let f = fixture_with(LocalCache::detached(), StoreSettings::default());
    f.remote.set_fail_writes(true);

    let result = f.store.create_assessment(new_assessment("Acme", &[])).await;
    assert!(matches!(result, Err(Error::RemoteUnavailable(_))));
}

#[tokio::test]
async fn test_detached_cache_writes_remote_only() {
    let f = fixture_with(LocalCache::detached(), StoreSettings::default());
    let assessment = f
        .store
        .create_assessment(new_assessment("Acme", &[]))
        .await
        .unwrap();
    assert!(f.remote.data().find_assessment(&assessment.id).is_some());
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_create_assessment_allocates_codes_and_slugs() {
    let f = fixture();
    let assessment = f
        .store
        .create_assessment(new_assessment("Acme Corp", &["Sales", "Engineering"]))
        .await
        .unwrap();

    assert_eq!(assessment.status, AssessmentStatus::Collecting);
    assert!(assessment.access_code.starts_with("ACMECORP-"));
    assert_eq!(assessment.department_ids(), vec!["sales", "engineer"]);
    assert!(assessment.departments[0].management_code.starts_with("ACMECORP-MGMT-SAL"));
    assert!(assessment.departments[1].employee_code.starts_with("ACMECORP-EMP-ENG"));
}

#[tokio::test]
async fn test_create_assessment_requires_organization() {
    let f = fixture();
    let result = f.store.create_assessment(new_assessment("  ", &[])).await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_duplicate_department_is_rejected_case_insensitively() {
    let f = fixture();
    let assessment = f
        .store
        .create_assessment(new_assessment("Acme", &["Sales"]))
        .await
        .unwrap();

    let err = f
        .store
        .add_department_to_assessment(&assessment.id, "sales")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)));
    assert!(err.to_string().contains("already exists"));

    let reloaded = f.store.get_assessment(&assessment.id).await.unwrap().unwrap();
    assert_eq!(reloaded.departments.len(), 1);
}

#[tokio::test]
async fn test_add_department_to_missing_assessment() {
    let f = fixture();
    let err = f
        .store
        .add_department_to_assessment("missing", "Sales")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_locked_assessment_rejects_changes() {
    let f = fixture();
    let assessment = f
        .store
        .create_assessment(new_assessment("Acme", &["Sales"]))
        .await
        .unwrap();

    let locked = f
        .store
        .update_assessment_status(&assessment.id, AssessmentStatus::Locked)
        .await
        .unwrap();
    assert!(locked.locked_at.is_some());

    let regress = f
        .store
        .update_assessment_status(&assessment.id, AssessmentStatus::Collecting)
        .await;
    assert!(matches!(regress, Err(Error::Validation(_))));

    assert!(matches!(
        f.store.regenerate_access_code(&assessment.id).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        f.store.add_department_to_assessment(&assessment.id, "Finance").await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        f.store.regenerate_department_codes(&assessment.id, "sales").await,
        Err(Error::Validation(_))
    ));

    let response = scored_response(&assessment.id, Role::Employee, Some("sales"), &[]);
    assert!(matches!(
        f.store.record_response(response).await,
        Err(Error::Validation(_))
    ));

    let reloaded = f.store.get_assessment(&assessment.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, AssessmentStatus::Locked);
}

#[tokio::test]
async fn test_status_moves_between_collecting_and_ready() {
    let f = fixture();
    let assessment = f
        .store
        .create_assessment(new_assessment("Acme", &[]))
        .await
        .unwrap();

    let ready = f
        .store
        .update_assessment_status(&assessment.id, AssessmentStatus::Ready)
        .await
        .unwrap();
    assert_eq!(ready.status, AssessmentStatus::Ready);

    let back = f
        .store
        .update_assessment_status(&assessment.id, AssessmentStatus::Collecting)
        .await
        .unwrap();
    assert_eq!(back.status, AssessmentStatus::Collecting);
    assert!(back.locked_at.is_none());
}

#[tokio::test]
async fn test_regenerate_access_code_changes_code() {
    let f = fixture();
    let assessment = f
        .store
        .create_assessment(new_assessment("Acme", &[]))
        .await
        .unwrap();

    let regenerated = f.store.regenerate_access_code(&assessment.id).await.unwrap();
    assert_ne!(regenerated.access_code, assessment.access_code);
    assert!(regenerated.code_regenerated_at.is_some());
}

#[tokio::test]
async fn test_regenerate_department_codes() {
    let f = fixture();
    let assessment = f
        .store
        .create_assessment(new_assessment("Acme", &["Sales"]))
        .await
        .unwrap();

    let updated = f
        .store
        .regenerate_department_codes(&assessment.id, "sales")
        .await
        .unwrap();
    assert_ne!(
        updated.departments[0].management_code,
        assessment.departments[0].management_code
    );

    let missing = f
        .store
        .regenerate_department_codes(&assessment.id, "nope")
        .await;
    assert!(matches!(missing, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_resolve_access_codes() {
    let f = fixture();
    let assessment = f
        .store
        .create_assessment(new_assessment("Acme", &["Sales"]))
        .await
        .unwrap();

    let grant = f
        .store
        .resolve_access_code(&assessment.access_code.to_lowercase())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(grant.assessment_id, assessment.id);
    assert_eq!(grant.role, None);

    let grant = f
        .store
        .resolve_access_code(&assessment.departments[0].employee_code)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(grant.role, Some(Role::Employee));
    assert_eq!(grant.department_id.as_deref(), Some("sales"));

    assert!(f.store.resolve_access_code("NOPE-000000").await.unwrap().is_none());
}

#[tokio::test]
async fn test_record_response_normalizes_department_name() {
    let f = fixture();
    let assessment = f
        .store
        .create_assessment(new_assessment("Acme", &["Engineering"]))
        .await
        .unwrap();

    let recorded = f
        .store
        .record_response(scored_response(&assessment.id, Role::Employee, Some("Engineering"), &[]))
        .await
        .unwrap();
    assert_eq!(recorded.department.as_deref(), Some("engineer"));

    let reloaded = f.store.get_assessment(&assessment.id).await.unwrap().unwrap();
    assert_eq!(reloaded.response_counts.employee, 1);
}

#[tokio::test]
async fn test_record_response_for_missing_assessment() {
    let f = fixture();
    let result = f
        .store
        .record_response(scored_response("missing", Role::Employee, None, &[]))
        .await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_delete_assessment_removes_from_both_tiers() {
    let f = fixture();
    let assessment = f
        .store
        .create_assessment(new_assessment("Acme", &[]))
        .await
        .unwrap();
    f.store
        .record_response(scored_response(&assessment.id, Role::Employee, None, &[]))
        .await
        .unwrap();

    assert!(f.store.delete_assessment(&assessment.id).await.unwrap());
    assert!(f.store.get_assessment(&assessment.id).await.unwrap().is_none());
    assert!(f.store.local().all_responses().is_empty());
    assert!(f.remote.data().all_responses().is_empty());
    assert!(!f.store.delete_assessment(&assessment.id).await.unwrap());
}

// =============================================================================
// Aggregates
// =============================================================================

#[tokio::test]
async fn test_analytics_persist_department_aggregates() {
    let f = fixture();
    let assessment = f
        .store
        .create_assessment(new_assessment("Acme", &["Sales", "Finance"]))
        .await
        .unwrap();

    for (role, dept, score) in [
        (Role::Management, "sales", 8.0),
        (Role::Employee, "sales", 4.0),
        (Role::Employee, "finance", 6.0),
    ] {
        f.store
            .record_response(scored_response(
                &assessment.id,
                role,
                Some(dept),
                &[("q1", "Leadership", Some(score)), ("q2", "Communication", None)],
            ))
            .await
            .unwrap();
    }

    let stored = f.store.get_assessment(&assessment.id).await.unwrap().unwrap();
    assert!(pgap_common::aggregation::needs_recompute(&stored));

    let analytics = f.store.get_analytics(&assessment.id, false).await.unwrap();
    assert_eq!(analytics.departments.len(), 2);
    assert_eq!(analytics.management.overall_average, 8.0);
    assert_eq!(analytics.employee.overall_average, 5.0);
    assert!(analytics.employee.category("Communication").is_none());

    let stored = f.store.get_assessment(&assessment.id).await.unwrap().unwrap();
    assert!(!pgap_common::aggregation::needs_recompute(&stored));
    assert_eq!(stored.department_aggregates.as_ref().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_unassigned_response_counts_toward_role_aggregate() {
    let f = fixture();
    let assessment = f
        .store
        .create_assessment(new_assessment("Acme", &["Sales"]))
        .await
        .unwrap();

    for (role, dept, score) in [
        (Role::Management, None, 6.0),
        (Role::Management, Some("sales"), 8.0),
        (Role::Employee, Some("sales"), 5.0),
    ] {
        f.store
            .record_response(scored_response(
                &assessment.id,
                role,
                dept,
                &[("q1", "Leadership", Some(score))],
            ))
            .await
            .unwrap();
    }

    let analytics = f.store.get_analytics(&assessment.id, true).await.unwrap();
    assert_eq!(analytics.excluded_responses, 0);
    assert_eq!(analytics.management.response_count, 2);
    assert_eq!(analytics.management.overall_average, 7.0);
    assert_eq!(analytics.departments[0].management_count, 1);
    assert_eq!(analytics.gaps.len(), 1);
    assert_eq!(analytics.gaps[0].gap, 2.0);
}

#[tokio::test]
async fn test_narrative_context_for_department() {
    let f = fixture();
    let assessment = f
        .store
        .create_assessment(new_assessment("Acme", &["Sales"]))
        .await
        .unwrap();
    f.store
        .record_response(scored_response(
            &assessment.id,
            Role::Management,
            Some("sales"),
            &[("q1", "Leadership", Some(7.0))],
        ))
        .await
        .unwrap();

    let context = f
        .store
        .narrative_context(&assessment.id, Role::Management, Some("sales"))
        .await
        .unwrap();
    assert_eq!(context.department.as_deref(), Some("Sales"));
    assert_eq!(context.response_count, 1);
    assert_eq!(context.overall_average, 7.0);

    let unknown = f
        .store
        .narrative_context(&assessment.id, Role::Management, Some("nope"))
        .await;
    assert!(matches!(unknown, Err(Error::NotFound(_))));
}

// =============================================================================
// Demo assessment
// =============================================================================

fn demo_settings() -> StoreSettings {
    StoreSettings {
        demo_assessment_id: Some("demo-assessment".to_string()),
        ..StoreSettings::default()
    }
}

#[tokio::test]
async fn test_demo_seeded_once() {
    let f = fixture_with(LocalCache::in_memory(), demo_settings());

    let demo = f.store.seed_demo_assessment().await.unwrap().unwrap();
    assert_eq!(demo.id, "demo-assessment");
    assert_eq!(demo.departments.len(), 3);
    assert_eq!(demo.questions.len(), 6);

    assert!(f.store.seed_demo_assessment().await.unwrap().is_none());
}

#[tokio::test]
async fn test_deleting_demo_suppresses_reseeding() {
    let f = fixture_with(LocalCache::in_memory(), demo_settings());
    f.store.seed_demo_assessment().await.unwrap();

    assert!(f.store.delete_assessment("demo-assessment").await.unwrap());
    assert!(f.store.is_demo_suppressed());
    assert!(f.store.local().flag(DEMO_DELETED_KEY));
    assert!(f.store.seed_demo_assessment().await.unwrap().is_none());
}

#[tokio::test]
async fn test_no_demo_without_configuration() {
    let f = fixture();
    assert!(f.store.seed_demo_assessment().await.unwrap().is_none());
}
