//! Integration tests for the report moderation workflow

mod common;

use atlas::error::AtlasError;
use atlas::orm::reports::{self as report_rows, ReportState};
use atlas::reports::{self, allowed_transitions, can_transition_to, request_transition};
use common::{database::*, fixtures::*};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, Iterable, QueryFilter};
use uuid::Uuid;

/// Put a report straight into `state`, bypassing the workflow.
async fn force_state(db: &DatabaseConnection, id: Uuid, state: ReportState) {
    report_rows::Entity::update_many()
        .col_expr(report_rows::Column::CurrentState, Expr::value(state))
        .filter(report_rows::Column::Id.eq(id))
        .exec(db)
        .await
        .expect("Failed to force report state");
}

#[actix_rt::test]
async fn test_new_report_starts_submitted() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let report = create_test_report(&db, None).await.expect("Failed to create report");

    assert_eq!(report.current_state, ReportState::Submitted);
    assert_eq!(report.rejection_reason, None);
    assert_eq!(report.last_activity_at, report.created_at);
}

#[actix_rt::test]
async fn test_every_invalid_pair_leaves_report_untouched() {
    let db = setup_test_database().await.expect("Failed to set up database");

    for from in ReportState::iter() {
        for to in ReportState::iter() {
            if can_transition_to(from, to) {
                continue;
            }
            let report = create_test_report(&db, None).await.expect("Failed to create report");
            force_state(&db, report.id, from).await;
            let before = reports::get_report(&db, report.id).await.unwrap();

            match request_transition(&db, report.id, to, None).await {
                Err(AtlasError::InvalidTransition {
                    current,
                    requested,
                    allowed,
                }) => {
                    assert_eq!(current, from);
                    assert_eq!(requested, to);
                    assert_eq!(allowed, allowed_transitions(from).to_vec());
                }
                other => panic!("{} -> {} should be refused, got {:?}", from, to, other),
            }

            let after = reports::get_report(&db, report.id).await.unwrap();
            assert_eq!(after.current_state, from);
            assert_eq!(after.last_activity_at, before.last_activity_at);
            assert_eq!(after.rejection_reason, None);
        }
    }
}

#[actix_rt::test]
async fn test_valid_transition_applies_once() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let report = create_test_report(&db, None).await.expect("Failed to create report");

    let moved = request_transition(&db, report.id, ReportState::UnderReview, None)
        .await
        .expect("submitted -> under_review should succeed");
    assert_eq!(moved.current_state, ReportState::UnderReview);
    assert!(moved.last_activity_at >= report.last_activity_at);
    assert_eq!(moved.updated_at, report.updated_at);

    let again = request_transition(&db, report.id, ReportState::UnderReview, None).await;
    assert!(matches!(
        again,
        Err(AtlasError::InvalidTransition {
            current: ReportState::UnderReview,
            ..
        })
    ));
}

#[actix_rt::test]
async fn test_happy_path_to_resolved() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let report = create_test_report(&db, None).await.expect("Failed to create report");

    for target in [
        ReportState::UnderReview,
        ReportState::Verified,
        ReportState::Resolved,
    ] {
        let moved = request_transition(&db, report.id, target, None)
            .await
            .expect("Transition should succeed");
        assert_eq!(moved.current_state, target);
    }

    let resolved = reports::get_report(&db, report.id).await.unwrap();
    assert!(allowed_transitions(resolved.current_state).is_empty());
    let reopen = request_transition(&db, report.id, ReportState::UnderReview, None).await;
    assert!(matches!(reopen, Err(AtlasError::InvalidTransition { .. })));
}

#[actix_rt::test]
async fn test_rejection_records_reason() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let report = create_test_report(&db, None).await.expect("Failed to create report");

    request_transition(&db, report.id, ReportState::UnderReview, None)
        .await
        .unwrap();
    let rejected = request_transition(
        &db,
        report.id,
        ReportState::Rejected,
        Some("  Duplicate of an earlier report  "),
    )
    .await
    .expect("under_review -> rejected should succeed");

    assert_eq!(rejected.current_state, ReportState::Rejected);
    assert_eq!(
        rejected.rejection_reason.as_deref(),
        Some("Duplicate of an earlier report")
    );

    let verify = request_transition(&db, report.id, ReportState::Verified, None).await;
    match verify {
        Err(AtlasError::InvalidTransition { allowed, .. }) => assert!(allowed.is_empty()),
        other => panic!("Rejected reports are terminal, got {:?}", other),
    }
}

#[actix_rt::test]
async fn test_reason_is_ignored_outside_rejection() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let report = create_test_report(&db, None).await.expect("Failed to create report");

    let moved = request_transition(&db, report.id, ReportState::UnderReview, Some("looks odd"))
        .await
        .unwrap();
    assert_eq!(moved.rejection_reason, None);
}

#[actix_rt::test]
async fn test_skipping_review_is_refused() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let report = create_test_report(&db, None).await.expect("Failed to create report");

    let err = request_transition(&db, report.id, ReportState::Verified, None)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid state transition from submitted to verified. Valid transitions: [under_review]"
    );
}

#[actix_rt::test]
async fn test_unknown_report_is_not_found() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let err = request_transition(&db, Uuid::new_v4(), ReportState::UnderReview, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AtlasError::NotFound { entity: "report", .. }));
}

#[actix_rt::test]
async fn test_concurrent_transitions_only_one_wins() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let report = create_test_report(&db, None).await.expect("Failed to create report");
    request_transition(&db, report.id, ReportState::UnderReview, None)
        .await
        .unwrap();

    let (verify, reject) = futures::future::join(
        request_transition(&db, report.id, ReportState::Verified, None),
        request_transition(&db, report.id, ReportState::Rejected, Some("spam")),
    )
    .await;

    let successes = [verify.is_ok(), reject.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(successes, 1, "exactly one concurrent transition may win");

    let stored = reports::get_report(&db, report.id).await.unwrap();
    match (verify, reject) {
        (Ok(model), Err(err)) => {
            assert_eq!(stored.current_state, ReportState::Verified);
            assert_eq!(model.current_state, ReportState::Verified);
            assert!(matches!(err, AtlasError::InvalidTransition { .. }));
            assert_eq!(stored.rejection_reason, None);
        }
        (Err(err), Ok(model)) => {
            assert_eq!(stored.current_state, ReportState::Rejected);
            assert_eq!(model.current_state, ReportState::Rejected);
            assert!(matches!(err, AtlasError::InvalidTransition { .. }));
        }
        _ => unreachable!(),
    }
}
