//! Verification Log: append-only record of reviewer checks on a report.
//!
//! Recording a verification never changes the report's workflow state.

use crate::app_config::LimitsConfig;
use crate::error::{AtlasError, FieldErrors};
use crate::orm::verifications::{self, VerificationMethod};
use crate::pagination::{fetch_page, Page, PageParams};
use crate::provenance::Provenance;
use crate::reports;
use chrono::{NaiveDateTime, Utc};
use sea_orm::entity::*;
use sea_orm::{ActiveEnum, ConnectionTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug)]
pub struct NewVerification {
    pub report_id: Uuid,
    pub verification_method: VerificationMethod,
    pub is_confirmed: bool,
    pub verification_notes: String,
    pub provenance: Provenance,
}

#[derive(Clone, Debug, Default)]
pub struct VerificationFilter {
    pub report_id: Option<Uuid>,
    pub verification_method: Option<VerificationMethod>,
    pub is_confirmed: Option<bool>,
}

/// Append a verification made by `acting_user` against a report.
pub async fn record_verification<C: ConnectionTrait>(
    db: &C,
    acting_user: Option<&str>,
    input: NewVerification,
) -> Result<verifications::Model, AtlasError> {
    let mut errors = FieldErrors::new();
    if let Err(e) = input.provenance.validate() {
        errors.extend(e.into());
    }
    errors.into_result()?;

    reports::get_report(db, input.report_id).await?;

    let now = Utc::now().naive_utc();
    let verification = verifications::ActiveModel {
        id: Set(Uuid::new_v4()),
        report_id: Set(input.report_id),
        verified_by: Set(acting_user.map(str::to_string)),
        verification_method: Set(input.verification_method),
        verified_at: Set(now),
        verification_notes: Set(input.verification_notes),
        is_confirmed: Set(input.is_confirmed),
        data_source: Set(input.provenance.data_source),
        source_url: Set(input.provenance.source_url),
        source_notes: Set(input.provenance.source_notes),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    log::info!(
        "Recorded {} verification {} of report {} by {} (confirmed: {})",
        verification.verification_method.to_value(),
        verification.id,
        verification.report_id,
        verification.verified_by.as_deref().unwrap_or("unknown"),
        verification.is_confirmed
    );
    Ok(verification)
}

pub async fn get_verification<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<verifications::Model, AtlasError> {
    verifications::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AtlasError::not_found("verification", id))
}

/// Verifications of one report, most recent first.
pub async fn verifications_for_report<C: ConnectionTrait>(
    db: &C,
    report_id: Uuid,
) -> Result<Vec<verifications::Model>, AtlasError> {
    Ok(verifications::Entity::find()
        .filter(verifications::Column::ReportId.eq(report_id))
        .order_by_desc(verifications::Column::VerifiedAt)
        .all(db)
        .await?)
}

pub async fn list_verifications<C: ConnectionTrait>(
    db: &C,
    filter: &VerificationFilter,
    params: &PageParams,
    limits: &LimitsConfig,
) -> Result<Page<verifications::Model>, AtlasError> {
    let mut query = verifications::Entity::find();
    if let Some(report_id) = filter.report_id {
        query = query.filter(verifications::Column::ReportId.eq(report_id));
    }
    if let Some(method) = filter.verification_method {
        query = query.filter(verifications::Column::VerificationMethod.eq(method));
    }
    if let Some(is_confirmed) = filter.is_confirmed {
        query = query.filter(verifications::Column::IsConfirmed.eq(is_confirmed));
    }
    let query = query.order_by_desc(verifications::Column::VerifiedAt);
    fetch_page(db, query, params, limits).await
}

#[derive(Debug, Serialize)]
pub struct VerificationView {
    pub id: Uuid,
    pub report_id: Uuid,
    pub verified_by: Option<String>,
    pub verification_method: VerificationMethod,
    pub verification_method_display: &'static str,
    pub verified_at: NaiveDateTime,
    pub verification_notes: String,
    pub is_confirmed: bool,
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl From<verifications::Model> for VerificationView {
    fn from(verification: verifications::Model) -> Self {
        Self {
            id: verification.id,
            report_id: verification.report_id,
            verified_by: verification.verified_by,
            verification_method: verification.verification_method,
            verification_method_display: verification.verification_method.label(),
            verified_at: verification.verified_at,
            verification_notes: verification.verification_notes,
            is_confirmed: verification.is_confirmed,
            provenance: Provenance {
                data_source: verification.data_source,
                source_url: verification.source_url,
                source_notes: verification.source_notes,
            },
        }
    }
}
