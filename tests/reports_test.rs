//! Integration tests for report intake, listing and removal

mod common;

use atlas::app_config::LimitsConfig;
use atlas::error::AtlasError;
use atlas::evidence::{self, EvidenceFile, EvidencePayload, NewEvidence};
use atlas::orm::evidence::EvidenceType;
use atlas::orm::infrastructure_assets::AssetType;
use atlas::orm::reports::{ReportState, ReportedStatus};
use atlas::orm::verifications::VerificationMethod;
use atlas::pagination::PageParams;
use atlas::provenance::Provenance;
use atlas::reports::{self, ReportChanges, ReportFilter, REPORT_ORDERING};
use atlas::search::Sort;
use atlas::verification::{self, NewVerification};
use common::{database::*, fixtures::*};

#[actix_rt::test]
async fn test_anonymous_report_drops_reporter() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let mut input = new_report(None);
    input.is_anonymous = true;
    let report = reports::create_report(&db, input).await.unwrap();
    assert_eq!(report.reporter, None);

    let named = create_test_report(&db, None).await.unwrap();
    assert_eq!(named.reporter.as_deref(), Some("amina"));

    let hidden = reports::update_report(
        &db,
        named.id,
        ReportChanges {
            is_anonymous: Some(true),
            ..ReportChanges::default()
        },
    )
    .await
    .unwrap();
    assert!(hidden.is_anonymous);
    assert_eq!(hidden.reporter, None);
}

#[actix_rt::test]
async fn test_negative_accuracy_is_refused() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let mut input = new_report(None);
    input.location_accuracy_meters = Some(-5);
    match reports::create_report(&db, input).await {
        Err(AtlasError::Validation(fields)) => {
            assert!(fields.contains("location_accuracy_meters"))
        }
        other => panic!("expected a validation error, got {:?}", other),
    }
}

#[actix_rt::test]
async fn test_update_keeps_state_and_bumps_activity() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let report = create_test_report(&db, None).await.unwrap();

    let updated = reports::update_report(
        &db,
        report.id,
        ReportChanges {
            reported_status: Some(ReportedStatus::PartiallyWorking),
            description: Some("Handle was patched but leaks".to_string()),
            ..ReportChanges::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.reported_status, ReportedStatus::PartiallyWorking);
    assert_eq!(updated.current_state, ReportState::Submitted);
    assert!(updated.last_activity_at >= report.last_activity_at);
}

#[actix_rt::test]
async fn test_delete_removes_evidence_and_verifications() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let (_dir, storage) = test_storage();
    let report = create_test_report(&db, None).await.unwrap();
    let keep = create_test_report(&db, None).await.unwrap();

    let attached = evidence::attach_evidence(
        &db,
        &storage,
        NewEvidence {
            report_id: report.id,
            evidence_type: EvidenceType::Photo,
            captured_at: None,
            source_device: None,
            description: String::new(),
            provenance: Provenance::default(),
        },
        EvidencePayload::File(EvidenceFile::from_bytes(None, None, b"pixels".to_vec())),
    )
    .await
    .unwrap();
    let checked = verification::record_verification(
        &db,
        Some("reviewer"),
        NewVerification {
            report_id: report.id,
            verification_method: VerificationMethod::SiteVisit,
            is_confirmed: true,
            verification_notes: String::new(),
            provenance: Provenance::default(),
        },
    )
    .await
    .unwrap();

    reports::delete_report(&db, report.id).await.unwrap();

    assert!(matches!(
        reports::get_report(&db, report.id).await,
        Err(AtlasError::NotFound { .. })
    ));
    assert!(matches!(
        evidence::get_evidence(&db, attached.id).await,
        Err(AtlasError::NotFound { .. })
    ));
    assert!(matches!(
        verification::get_verification(&db, checked.id).await,
        Err(AtlasError::NotFound { .. })
    ));
    reports::get_report(&db, keep.id).await.expect("other reports stay");
}

#[actix_rt::test]
async fn test_filters_pending_and_stats() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let (lga, _, _) = create_test_hierarchy(&db).await.unwrap();
    let asset = create_test_asset(&db, lga.id, AssetType::WaterPoint, "Market tap")
        .await
        .unwrap();

    let first = create_test_report(&db, Some(asset.id)).await.unwrap();
    let second = create_test_report(&db, None).await.unwrap();
    let mut school = new_report(None);
    school.infrastructure_type = AssetType::School;
    school.reported_status = ReportedStatus::Working;
    let third = reports::create_report(&db, school).await.unwrap();

    for target in [ReportState::UnderReview, ReportState::Verified] {
        reports::request_transition(&db, second.id, target, None)
            .await
            .unwrap();
    }

    let limits = LimitsConfig::default();
    let pending = reports::pending_review(&db, &PageParams::default(), &limits)
        .await
        .unwrap();
    let pending_ids: Vec<_> = pending.results.iter().map(|r| r.id).collect();
    assert_eq!(pending_ids, vec![first.id, third.id]);

    let in_area = ReportFilter {
        geographic_area_id: Some(lga.id),
        ..ReportFilter::default()
    };
    let page = reports::list_reports(&db, &in_area, &PageParams::default(), &limits)
        .await
        .unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].id, first.id);

    let in_country = ReportFilter {
        country_code: Some("NG".to_string()),
        ..ReportFilter::default()
    };
    let stats = reports::report_stats(&db, &in_country).await.unwrap();
    assert_eq!(stats.total, 1);

    let stats = reports::report_stats(&db, &ReportFilter::default())
        .await
        .unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.verified, 1);
    assert_eq!(stats.by_state.get("submitted"), Some(&2));
    assert_eq!(stats.by_state.get("verified"), Some(&1));
    assert_eq!(stats.by_status.get("broken"), Some(&2));
    assert_eq!(stats.by_type.get("school"), Some(&1));

    let broken = ReportFilter {
        reported_status: Some(ReportedStatus::Broken),
        current_state: Some(ReportState::Submitted),
        ..ReportFilter::default()
    };
    let page = reports::list_reports(&db, &broken, &PageParams::default(), &limits)
        .await
        .unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].id, first.id);

    let collection = reports::reports_geojson(&db, &ReportFilter::default())
        .await
        .unwrap();
    assert_eq!(collection.features.len(), 3);
}

#[actix_rt::test]
async fn test_detail_lists_allowed_transitions() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let report = create_test_report(&db, None).await.unwrap();

    let view = reports::report_detail(&db, report.id).await.unwrap();
    assert_eq!(view.allowed_transitions, vec![ReportState::UnderReview]);
    assert_eq!(view.reported_at, report.created_at);
    assert!(view.evidence.is_empty());
    assert!(view.verifications.is_empty());

    let value = serde_json::to_value(&view).unwrap();
    assert_eq!(value["current_state"], "submitted");
    assert_eq!(value["data_source"], "community");
    assert_eq!(value["location"]["type"], "Point");
}

#[actix_rt::test]
async fn test_search_and_ordering() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let (lga, _, _) = create_test_hierarchy(&db).await.unwrap();
    let asset = create_test_asset(&db, lga.id, AssetType::WaterPoint, "Ikeja pump")
        .await
        .unwrap();

    let pump = create_test_report(&db, Some(asset.id)).await.unwrap();
    let mut roof = new_report(None);
    roof.infrastructure_type = AssetType::School;
    roof.description = "School ROOF leaking into classrooms".to_string();
    let roof = reports::create_report(&db, roof).await.unwrap();
    reports::request_transition(&db, pump.id, ReportState::UnderReview, None)
        .await
        .unwrap();

    let limits = LimitsConfig::default();
    let by_text = ReportFilter {
        search: Some("roof".to_string()),
        ..ReportFilter::default()
    };
    let page = reports::list_reports(&db, &by_text, &PageParams::default(), &limits)
        .await
        .unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].id, roof.id);

    // The asset join brings in a second description column.
    let in_country = ReportFilter {
        search: Some("PUMP".to_string()),
        country_code: Some("NG".to_string()),
        ..ReportFilter::default()
    };
    let page = reports::list_reports(&db, &in_country, &PageParams::default(), &limits)
        .await
        .unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].id, pump.id);

    let by_state = ReportFilter {
        ordering: Sort::parse("current_state", REPORT_ORDERING),
        ..ReportFilter::default()
    };
    let page = reports::list_reports(&db, &by_state, &PageParams::default(), &limits)
        .await
        .unwrap();
    let ids: Vec<_> = page.results.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![roof.id, pump.id]);

    let by_state_desc = ReportFilter {
        ordering: Sort::parse("-current_state", REPORT_ORDERING),
        ..ReportFilter::default()
    };
    let page = reports::list_reports(&db, &by_state_desc, &PageParams::default(), &limits)
        .await
        .unwrap();
    let ids: Vec<_> = page.results.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![pump.id, roof.id]);
}
