//! Reports: creation, lookup, filtering, statistics and deletion.
//!
//! State changes go exclusively through [`workflow::request_transition`];
//! nothing in this module writes `current_state` or `rejection_reason` after
//! creation.

pub mod workflow;

use crate::app_config::LimitsConfig;
use crate::assets;
use crate::error::{AtlasError, FieldErrors};
use crate::evidence::{self, EvidenceView};
use crate::geo::GeoPoint;
use crate::geojson::{Feature, FeatureCollection};
use crate::orm::infrastructure_assets::{self, AssetType};
use crate::orm::reports::{self, ReportState, ReportedStatus, ReporterType};
use crate::orm::{evidence as evidence_orm, geographic_areas, verifications as verification_orm};
use crate::pagination::{fetch_page, Page, PageParams};
use crate::provenance::{Provenance, ProvenanceChanges};
use crate::search::{icontains, search_term, Sort};
use crate::stats::count_by;
use crate::verification::{self, VerificationView};
use chrono::{NaiveDateTime, Utc};
use sea_orm::entity::*;
use sea_orm::{
    ActiveEnum, ConnectionTrait, DatabaseConnection, JoinType, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Select, TransactionTrait,
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

pub use workflow::{allowed_transitions, can_transition_to, is_terminal, request_transition};

#[derive(Clone, Debug)]
pub struct NewReport {
    pub infrastructure_asset_id: Option<Uuid>,
    pub infrastructure_type: AssetType,
    pub reported_status: ReportedStatus,
    pub description: String,
    pub location: GeoPoint,
    pub location_accuracy_meters: Option<i32>,
    pub reporter_type: ReporterType,
    pub is_anonymous: bool,
    /// Acting user; dropped when the report is anonymous.
    pub reporter: Option<String>,
    pub provenance: Provenance,
}

/// Descriptive fields a report owner may change after submission.
#[derive(Clone, Debug, Default)]
pub struct ReportChanges {
    pub infrastructure_asset_id: Option<Option<Uuid>>,
    pub infrastructure_type: Option<AssetType>,
    pub reported_status: Option<ReportedStatus>,
    pub description: Option<String>,
    pub location: Option<GeoPoint>,
    pub location_accuracy_meters: Option<Option<i32>>,
    pub reporter_type: Option<ReporterType>,
    pub is_anonymous: Option<bool>,
    pub provenance: ProvenanceChanges,
}

#[derive(Clone, Debug, Default)]
pub struct ReportFilter {
    pub infrastructure_type: Option<AssetType>,
    pub reported_status: Option<ReportedStatus>,
    pub current_state: Option<ReportState>,
    pub reporter_type: Option<ReporterType>,
    pub is_anonymous: Option<bool>,
    pub infrastructure_asset_id: Option<Uuid>,
    /// Area of the linked asset
    pub geographic_area_id: Option<Uuid>,
    /// Country of the linked asset's area
    pub country_code: Option<String>,
    pub since: Option<NaiveDateTime>,
    pub until: Option<NaiveDateTime>,
    /// Case-insensitive substring of the description
    pub search: Option<String>,
    /// Replaces the default newest-first ordering.
    pub ordering: Option<Sort<reports::Column>>,
}

/// Fields a client may order the report list by. A report's creation time is
/// the moment it was reported.
pub const REPORT_ORDERING: &[(&str, reports::Column)] = &[
    ("reported_at", reports::Column::CreatedAt),
    ("created_at", reports::Column::CreatedAt),
    ("last_activity_at", reports::Column::LastActivityAt),
    ("current_state", reports::Column::CurrentState),
];

fn check_accuracy(errors: &mut FieldErrors, accuracy: Option<i32>) {
    if matches!(accuracy, Some(a) if a < 0) {
        errors.add(
            "location_accuracy_meters",
            "Ensure this value is greater than or equal to 0.",
        );
    }
}

async fn check_asset_link<C: ConnectionTrait>(db: &C, asset_id: Uuid) -> Result<(), AtlasError> {
    if assets::exists_and_active(db, asset_id).await? {
        Ok(())
    } else {
        Err(AtlasError::validation(
            "infrastructure_asset_id",
            format!(
                "Infrastructure asset {} does not exist or is not active.",
                asset_id
            ),
        ))
    }
}

pub async fn get_report<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<reports::Model, AtlasError> {
    reports::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AtlasError::not_found("report", id))
}

pub async fn create_report<C: ConnectionTrait>(
    db: &C,
    input: NewReport,
) -> Result<reports::Model, AtlasError> {
    let mut errors = FieldErrors::new();
    check_accuracy(&mut errors, input.location_accuracy_meters);
    if let Err(e) = input.provenance.validate() {
        errors.extend(e.into());
    }
    errors.into_result()?;

    if let Some(asset_id) = input.infrastructure_asset_id {
        check_asset_link(db, asset_id).await?;
    }

    let reporter = if input.is_anonymous {
        None
    } else {
        input.reporter
    };

    let now = Utc::now().naive_utc();
    let report = reports::ActiveModel {
        id: Set(Uuid::new_v4()),
        infrastructure_asset_id: Set(input.infrastructure_asset_id),
        infrastructure_type: Set(input.infrastructure_type),
        reported_status: Set(input.reported_status),
        description: Set(input.description),
        longitude: Set(input.location.longitude),
        latitude: Set(input.location.latitude),
        location_accuracy_meters: Set(input.location_accuracy_meters),
        reporter_type: Set(input.reporter_type),
        reporter: Set(reporter),
        is_anonymous: Set(input.is_anonymous),
        current_state: Set(ReportState::Submitted),
        rejection_reason: Set(None),
        last_activity_at: Set(now),
        data_source: Set(input.provenance.data_source),
        source_url: Set(input.provenance.source_url),
        source_notes: Set(input.provenance.source_notes),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    log::info!(
        "Report {} submitted ({} / {})",
        report.id,
        report.infrastructure_type.to_value(),
        report.reported_status.to_value()
    );
    Ok(report)
}

pub async fn update_report<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    changes: ReportChanges,
) -> Result<reports::Model, AtlasError> {
    let existing = get_report(db, id).await?;

    let mut errors = FieldErrors::new();
    if let Some(accuracy) = changes.location_accuracy_meters {
        check_accuracy(&mut errors, accuracy);
    }
    if let Err(e) = changes.provenance.validate() {
        errors.extend(e.into());
    }
    errors.into_result()?;

    if let Some(Some(asset_id)) = changes.infrastructure_asset_id {
        if Some(asset_id) != existing.infrastructure_asset_id {
            check_asset_link(db, asset_id).await?;
        }
    }

    let mut report: reports::ActiveModel = existing.into();
    if let Some(asset_id) = changes.infrastructure_asset_id {
        report.infrastructure_asset_id = Set(asset_id);
    }
    if let Some(infrastructure_type) = changes.infrastructure_type {
        report.infrastructure_type = Set(infrastructure_type);
    }
    if let Some(status) = changes.reported_status {
        report.reported_status = Set(status);
    }
    if let Some(description) = changes.description {
        report.description = Set(description);
    }
    if let Some(location) = changes.location {
        report.longitude = Set(location.longitude);
        report.latitude = Set(location.latitude);
    }
    if let Some(accuracy) = changes.location_accuracy_meters {
        report.location_accuracy_meters = Set(accuracy);
    }
    if let Some(reporter_type) = changes.reporter_type {
        report.reporter_type = Set(reporter_type);
    }
    if let Some(is_anonymous) = changes.is_anonymous {
        report.is_anonymous = Set(is_anonymous);
        if is_anonymous {
            report.reporter = Set(None);
        }
    }
    let provenance = changes.provenance;
    if let Some(source) = provenance.data_source {
        report.data_source = Set(source);
    }
    if provenance.source_url.is_some() || provenance.clear_source_url {
        report.source_url = Set(provenance.source_url);
    }
    if let Some(notes) = provenance.source_notes {
        report.source_notes = Set(notes);
    }
    let now = Utc::now().naive_utc();
    report.last_activity_at = Set(now);
    report.updated_at = Set(now);

    Ok(report.update(db).await?)
}

/// Delete a report together with its evidence and verifications.
pub async fn delete_report(db: &DatabaseConnection, id: Uuid) -> Result<(), AtlasError> {
    let txn = db.begin().await?;

    get_report(&txn, id).await?;

    let evidence = evidence_orm::Entity::delete_many()
        .filter(evidence_orm::Column::ReportId.eq(id))
        .exec(&txn)
        .await?;
    let verifications = verification_orm::Entity::delete_many()
        .filter(verification_orm::Column::ReportId.eq(id))
        .exec(&txn)
        .await?;
    reports::Entity::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;
    log::info!(
        "Deleted report {} with {} evidence and {} verification records",
        id,
        evidence.rows_affected,
        verifications.rows_affected
    );
    Ok(())
}

/// Reports matching `filter`, unordered.
fn filtered(filter: &ReportFilter) -> Select<reports::Entity> {
    let mut query = reports::Entity::find();

    if let Some(infrastructure_type) = filter.infrastructure_type {
        query = query.filter(reports::Column::InfrastructureType.eq(infrastructure_type));
    }
    if let Some(status) = filter.reported_status {
        query = query.filter(reports::Column::ReportedStatus.eq(status));
    }
    if let Some(state) = filter.current_state {
        query = query.filter(reports::Column::CurrentState.eq(state));
    }
    if let Some(reporter_type) = filter.reporter_type {
        query = query.filter(reports::Column::ReporterType.eq(reporter_type));
    }
    if let Some(is_anonymous) = filter.is_anonymous {
        query = query.filter(reports::Column::IsAnonymous.eq(is_anonymous));
    }
    if let Some(asset_id) = filter.infrastructure_asset_id {
        query = query.filter(reports::Column::InfrastructureAssetId.eq(asset_id));
    }
    if let Some(since) = filter.since {
        query = query.filter(reports::Column::CreatedAt.gte(since));
    }
    if let Some(until) = filter.until {
        query = query.filter(reports::Column::CreatedAt.lte(until));
    }
    if let Some(term) = search_term(filter.search.as_deref()) {
        query = query.filter(icontains(reports::Column::Description, term));
    }

    if filter.geographic_area_id.is_some() || filter.country_code.is_some() {
        query = query.join(
            JoinType::InnerJoin,
            reports::Relation::InfrastructureAsset.def(),
        );
        if let Some(area_id) = filter.geographic_area_id {
            query = query.filter(infrastructure_assets::Column::GeographicAreaId.eq(area_id));
        }
        if let Some(code) = &filter.country_code {
            query = query
                .join(
                    JoinType::InnerJoin,
                    infrastructure_assets::Relation::GeographicArea.def(),
                )
                .filter(
                    geographic_areas::Column::CountryCode.eq(code.trim().to_ascii_uppercase()),
                );
        }
    }
    query
}

pub async fn list_reports<C: ConnectionTrait>(
    db: &C,
    filter: &ReportFilter,
    params: &PageParams,
    limits: &LimitsConfig,
) -> Result<Page<reports::Model>, AtlasError> {
    let query = match filter.ordering {
        Some(sort) => sort.apply(filtered(filter)),
        None => filtered(filter),
    };
    let query = query.order_by_desc(reports::Column::CreatedAt);
    fetch_page(db, query, params, limits).await
}

/// Reports still waiting for a reviewer, oldest first.
pub async fn pending_review<C: ConnectionTrait>(
    db: &C,
    params: &PageParams,
    limits: &LimitsConfig,
) -> Result<Page<reports::Model>, AtlasError> {
    let query = reports::Entity::find()
        .filter(reports::Column::CurrentState.eq(ReportState::Submitted))
        .order_by_asc(reports::Column::CreatedAt);
    fetch_page(db, query, params, limits).await
}

pub async fn reports_geojson<C: ConnectionTrait>(
    db: &C,
    filter: &ReportFilter,
) -> Result<FeatureCollection, AtlasError> {
    let reports = filtered(filter)
        .order_by_desc(reports::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(FeatureCollection::from_optional(reports.into_iter().map(
        |report| {
            let point = GeoPoint::from_columns(Some(report.longitude), Some(report.latitude))?;
            Some(Feature::new(
                report.id,
                point.to_geojson(),
                json!({
                    "id": report.id,
                    "infrastructure_type": report.infrastructure_type,
                    "infrastructure_type_display": report.infrastructure_type.label(),
                    "reported_status": report.reported_status,
                    "reported_status_display": report.reported_status.label(),
                    "current_state": report.current_state,
                    "current_state_display": report.current_state.label(),
                    "reported_at": report.created_at,
                }),
            ))
        },
    )))
}

#[derive(Debug, Serialize)]
pub struct ReportStats {
    pub total: u64,
    /// Reports that passed verification (`verified` or `resolved`)
    pub verified: u64,
    pub by_state: BTreeMap<String, i64>,
    pub by_status: BTreeMap<String, i64>,
    pub by_type: BTreeMap<String, i64>,
}

pub async fn report_stats<C: ConnectionTrait>(
    db: &C,
    filter: &ReportFilter,
) -> Result<ReportStats, AtlasError> {
    let total = filtered(filter).count(db).await?;
    let verified = filtered(filter)
        .filter(
            reports::Column::CurrentState.is_in([ReportState::Verified, ReportState::Resolved]),
        )
        .count(db)
        .await?;

    Ok(ReportStats {
        total,
        verified,
        by_state: count_by(db, filtered(filter), reports::Column::CurrentState).await?,
        by_status: count_by(db, filtered(filter), reports::Column::ReportedStatus).await?,
        by_type: count_by(db, filtered(filter), reports::Column::InfrastructureType).await?,
    })
}

/// Compact report entry for lists.
#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub id: Uuid,
    pub infrastructure_asset_id: Option<Uuid>,
    pub infrastructure_type: AssetType,
    pub infrastructure_type_display: &'static str,
    pub reported_status: ReportedStatus,
    pub reported_status_display: &'static str,
    pub location: GeoPoint,
    pub current_state: ReportState,
    pub current_state_display: &'static str,
    pub reported_at: NaiveDateTime,
    pub last_activity_at: NaiveDateTime,
}

impl From<reports::Model> for ReportSummary {
    fn from(report: reports::Model) -> Self {
        Self {
            id: report.id,
            infrastructure_asset_id: report.infrastructure_asset_id,
            infrastructure_type: report.infrastructure_type,
            infrastructure_type_display: report.infrastructure_type.label(),
            reported_status: report.reported_status,
            reported_status_display: report.reported_status.label(),
            location: GeoPoint {
                longitude: report.longitude,
                latitude: report.latitude,
            },
            current_state: report.current_state,
            current_state_display: report.current_state.label(),
            reported_at: report.created_at,
            last_activity_at: report.last_activity_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportView {
    pub id: Uuid,
    pub infrastructure_asset_id: Option<Uuid>,
    pub infrastructure_type: AssetType,
    pub infrastructure_type_display: &'static str,
    pub reported_status: ReportedStatus,
    pub reported_status_display: &'static str,
    pub description: String,
    pub location: GeoPoint,
    pub location_accuracy_meters: Option<i32>,
    pub reporter_type: ReporterType,
    pub reporter_type_display: &'static str,
    pub reporter: Option<String>,
    pub is_anonymous: bool,
    pub current_state: ReportState,
    pub current_state_display: &'static str,
    pub allowed_transitions: Vec<ReportState>,
    pub rejection_reason: Option<String>,
    pub reported_at: NaiveDateTime,
    pub last_activity_at: NaiveDateTime,
    #[serde(flatten)]
    pub provenance: Provenance,
    pub evidence: Vec<EvidenceView>,
    pub verifications: Vec<VerificationView>,
}

impl ReportView {
    pub fn new(
        report: reports::Model,
        evidence: Vec<EvidenceView>,
        verifications: Vec<VerificationView>,
    ) -> Self {
        Self {
            id: report.id,
            infrastructure_asset_id: report.infrastructure_asset_id,
            infrastructure_type: report.infrastructure_type,
            infrastructure_type_display: report.infrastructure_type.label(),
            reported_status: report.reported_status,
            reported_status_display: report.reported_status.label(),
            description: report.description,
            location: GeoPoint {
                longitude: report.longitude,
                latitude: report.latitude,
            },
            location_accuracy_meters: report.location_accuracy_meters,
            reporter_type: report.reporter_type,
            reporter_type_display: report.reporter_type.label(),
            reporter: report.reporter,
            is_anonymous: report.is_anonymous,
            current_state: report.current_state,
            current_state_display: report.current_state.label(),
            allowed_transitions: allowed_transitions(report.current_state).to_vec(),
            rejection_reason: report.rejection_reason,
            reported_at: report.created_at,
            last_activity_at: report.last_activity_at,
            provenance: Provenance {
                data_source: report.data_source,
                source_url: report.source_url,
                source_notes: report.source_notes,
            },
            evidence,
            verifications,
        }
    }
}

/// A report with its evidence (newest upload first) and verifications.
pub async fn report_detail<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<ReportView, AtlasError> {
    let report = get_report(db, id).await?;
    let evidence = evidence::evidence_for_report(db, id)
        .await?
        .into_iter()
        .map(EvidenceView::from)
        .collect();
    let verifications = verification::verifications_for_report(db, id)
        .await?
        .into_iter()
        .map(VerificationView::from)
        .collect();
    Ok(ReportView::new(report, evidence, verifications))
}
