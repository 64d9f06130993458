//! Evidence Ledger: files and links attached to reports.
//!
//! Every record carries exactly one payload, an uploaded file or an external
//! URL. A file's SHA-256 digest and size are recorded the first time a file
//! is persisted for the record and are never rewritten afterwards.

pub mod digest;

use crate::app_config::LimitsConfig;
use crate::error::{AtlasError, FieldErrors};
use crate::orm::evidence::{self, EvidenceType, SourceDevice};
use crate::pagination::{fetch_page, Page, PageParams};
use crate::provenance::{Provenance, ProvenanceChanges};
use crate::reports;
use crate::storage::{content_key, StorageBackend, StorageObject};
use chrono::{NaiveDateTime, Utc};
use sea_orm::entity::*;
use sea_orm::{ActiveEnum, ConnectionTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

pub use digest::{EvidenceFile, FileDigest, StreamDigest, UploadBuffer};

/// The single payload of an evidence record.
#[derive(Clone, Debug)]
pub enum EvidencePayload {
    File(EvidenceFile),
    Url(String),
}

impl EvidencePayload {
    /// Exactly one of `file` and `url` must be given. A blank URL counts as absent.
    pub fn from_parts(file: Option<EvidenceFile>, url: Option<String>) -> Result<Self, AtlasError> {
        let url = url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
        match (file, url) {
            (Some(_), Some(_)) => Err(AtlasError::ConflictingPayload),
            (None, None) => Err(AtlasError::MissingPayload),
            (Some(file), None) => Ok(EvidencePayload::File(file)),
            (None, Some(url)) => {
                check_url(&url)?;
                Ok(EvidencePayload::Url(url))
            }
        }
    }
}

fn check_url(raw: &str) -> Result<(), AtlasError> {
    match url::Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(AtlasError::validation("url", "Enter a valid URL.")),
    }
}

#[derive(Clone, Debug)]
pub struct NewEvidence {
    pub report_id: Uuid,
    pub evidence_type: EvidenceType,
    pub captured_at: Option<NaiveDateTime>,
    pub source_device: Option<SourceDevice>,
    pub description: String,
    pub provenance: Provenance,
}

#[derive(Clone, Debug, Default)]
pub struct EvidenceChanges {
    pub evidence_type: Option<EvidenceType>,
    pub captured_at: Option<Option<NaiveDateTime>>,
    pub source_device: Option<Option<SourceDevice>>,
    pub description: Option<String>,
    pub provenance: ProvenanceChanges,
}

#[derive(Clone, Debug, Default)]
pub struct EvidenceFilter {
    pub report_id: Option<Uuid>,
    pub evidence_type: Option<EvidenceType>,
    pub source_device: Option<SourceDevice>,
}

/// Write file bytes under their content key unless an identical object exists.
async fn store_file(storage: &dyn StorageBackend, file: &EvidenceFile) -> Result<String, AtlasError> {
    let key = content_key(&file.digest.sha256, file.file_name.as_deref());
    if !storage.exists(&key).await? {
        storage.put_object(file.bytes.clone(), &key).await?;
    }
    Ok(key)
}

/// Attach a file or link to a report.
///
/// Payload problems are reported before anything is stored.
pub async fn attach_evidence<C: ConnectionTrait>(
    db: &C,
    storage: &dyn StorageBackend,
    input: NewEvidence,
    payload: EvidencePayload,
) -> Result<evidence::Model, AtlasError> {
    let mut errors = FieldErrors::new();
    if let Err(e) = input.provenance.validate() {
        errors.extend(e.into());
    }
    errors.into_result()?;

    reports::get_report(db, input.report_id).await?;

    let now = Utc::now().naive_utc();
    let mut record = evidence::ActiveModel {
        id: Set(Uuid::new_v4()),
        report_id: Set(input.report_id),
        evidence_type: Set(input.evidence_type),
        file_key: Set(None),
        file_name: Set(None),
        content_type: Set(None),
        url: Set(None),
        file_hash: Set(None),
        file_size_bytes: Set(None),
        captured_at: Set(input.captured_at),
        uploaded_at: Set(now),
        source_device: Set(input.source_device),
        description: Set(input.description),
        data_source: Set(input.provenance.data_source),
        source_url: Set(input.provenance.source_url),
        source_notes: Set(input.provenance.source_notes),
        created_at: Set(now),
        updated_at: Set(now),
    };

    match payload {
        EvidencePayload::File(file) => {
            let key = store_file(storage, &file).await?;
            record.file_key = Set(Some(key));
            record.file_name = Set(file.file_name);
            record.content_type = Set(file.content_type);
            record.file_hash = Set(Some(file.digest.sha256));
            record.file_size_bytes = Set(Some(file.digest.size as i64));
        }
        EvidencePayload::Url(url) => {
            record.url = Set(Some(url));
        }
    }

    let record = record.insert(db).await?;
    log::info!(
        "Attached {} evidence {} to report {} (sha256: {})",
        record.evidence_type.to_value(),
        record.id,
        record.report_id,
        record.file_hash.as_deref().unwrap_or("-")
    );
    Ok(record)
}

/// Update descriptive fields and optionally replace the payload.
///
/// A replacement payload goes through the same one-of check as creation. A
/// digest already on the record is kept even when a different file is
/// uploaded.
pub async fn update_evidence<C: ConnectionTrait>(
    db: &C,
    storage: &dyn StorageBackend,
    id: Uuid,
    changes: EvidenceChanges,
    file: Option<EvidenceFile>,
    url: Option<String>,
) -> Result<evidence::Model, AtlasError> {
    let existing = get_evidence(db, id).await?;

    let has_url = url.as_deref().map(str::trim).is_some_and(|u| !u.is_empty());
    let payload = if file.is_some() || has_url {
        Some(EvidencePayload::from_parts(file, url)?)
    } else {
        None
    };

    let mut errors = FieldErrors::new();
    if let Err(e) = changes.provenance.validate() {
        errors.extend(e.into());
    }
    errors.into_result()?;

    let frozen_hash = existing.file_hash.clone();
    let mut record: evidence::ActiveModel = existing.into();

    match payload {
        Some(EvidencePayload::File(file)) => {
            let key = store_file(storage, &file).await?;
            record.file_key = Set(Some(key));
            record.file_name = Set(file.file_name);
            record.content_type = Set(file.content_type);
            record.url = Set(None);
            match frozen_hash {
                Some(hash) => {
                    if hash != file.digest.sha256 {
                        log::warn!(
                            "Evidence {} received a different file; keeping recorded digest {}",
                            id,
                            hash
                        );
                    }
                }
                None => {
                    record.file_hash = Set(Some(file.digest.sha256));
                    record.file_size_bytes = Set(Some(file.digest.size as i64));
                }
            }
        }
        Some(EvidencePayload::Url(url)) => {
            record.url = Set(Some(url));
            record.file_key = Set(None);
            record.file_name = Set(None);
            record.content_type = Set(None);
        }
        None => {}
    }

    if let Some(evidence_type) = changes.evidence_type {
        record.evidence_type = Set(evidence_type);
    }
    if let Some(captured_at) = changes.captured_at {
        record.captured_at = Set(captured_at);
    }
    if let Some(source_device) = changes.source_device {
        record.source_device = Set(source_device);
    }
    if let Some(description) = changes.description {
        record.description = Set(description);
    }
    let provenance = changes.provenance;
    if let Some(source) = provenance.data_source {
        record.data_source = Set(source);
    }
    if provenance.source_url.is_some() || provenance.clear_source_url {
        record.source_url = Set(provenance.source_url);
    }
    if let Some(notes) = provenance.source_notes {
        record.source_notes = Set(notes);
    }
    record.updated_at = Set(Utc::now().naive_utc());

    Ok(record.update(db).await?)
}

pub async fn get_evidence<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<evidence::Model, AtlasError> {
    evidence::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AtlasError::not_found("evidence", id))
}

/// Evidence of one report, most recent upload first.
pub async fn evidence_for_report<C: ConnectionTrait>(
    db: &C,
    report_id: Uuid,
) -> Result<Vec<evidence::Model>, AtlasError> {
    reports::get_report(db, report_id).await?;
    Ok(evidence::Entity::find()
        .filter(evidence::Column::ReportId.eq(report_id))
        .order_by_desc(evidence::Column::UploadedAt)
        .all(db)
        .await?)
}

pub async fn list_evidence<C: ConnectionTrait>(
    db: &C,
    filter: &EvidenceFilter,
    params: &PageParams,
    limits: &LimitsConfig,
) -> Result<Page<evidence::Model>, AtlasError> {
    let mut query = evidence::Entity::find();
    if let Some(report_id) = filter.report_id {
        query = query.filter(evidence::Column::ReportId.eq(report_id));
    }
    if let Some(evidence_type) = filter.evidence_type {
        query = query.filter(evidence::Column::EvidenceType.eq(evidence_type));
    }
    if let Some(source_device) = filter.source_device {
        query = query.filter(evidence::Column::SourceDevice.eq(source_device));
    }
    let query = query.order_by_desc(evidence::Column::UploadedAt);
    fetch_page(db, query, params, limits).await
}

/// Remove an evidence record. Stored bytes stay, since other records may share them.
pub async fn delete_evidence<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<(), AtlasError> {
    get_evidence(db, id).await?;
    evidence::Entity::delete_by_id(id).exec(db).await?;
    log::info!("Deleted evidence {}", id);
    Ok(())
}

/// Open the stored file of an evidence record.
pub async fn open_file<C: ConnectionTrait>(
    db: &C,
    storage: &dyn StorageBackend,
    id: Uuid,
) -> Result<(evidence::Model, StorageObject), AtlasError> {
    let record = get_evidence(db, id).await?;
    let key = record
        .file_key
        .clone()
        .ok_or_else(|| AtlasError::not_found("evidence file", id))?;
    let object = storage.get_object(&key).await?;
    Ok((record, object))
}

#[derive(Debug, Serialize)]
pub struct EvidenceView {
    pub id: Uuid,
    pub report_id: Uuid,
    pub evidence_type: EvidenceType,
    pub evidence_type_display: &'static str,
    /// Download path of the stored file
    pub file: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub url: Option<String>,
    pub file_hash: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub captured_at: Option<NaiveDateTime>,
    pub uploaded_at: NaiveDateTime,
    pub source_device: Option<SourceDevice>,
    pub source_device_display: Option<&'static str>,
    pub description: String,
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl From<evidence::Model> for EvidenceView {
    fn from(record: evidence::Model) -> Self {
        Self {
            id: record.id,
            report_id: record.report_id,
            evidence_type: record.evidence_type,
            evidence_type_display: record.evidence_type.label(),
            file: record
                .file_key
                .as_ref()
                .map(|_| format!("/api/v1/evidence/{}/file", record.id)),
            file_name: record.file_name,
            content_type: record.content_type,
            url: record.url,
            file_hash: record.file_hash,
            file_size_bytes: record.file_size_bytes,
            captured_at: record.captured_at,
            uploaded_at: record.uploaded_at,
            source_device: record.source_device,
            source_device_display: record.source_device.map(|d| d.label()),
            description: record.description,
            provenance: Provenance {
                data_source: record.data_source,
                source_url: record.source_url,
                source_notes: record.source_notes,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> EvidenceFile {
        EvidenceFile::from_bytes(Some("pump.jpg".to_string()), None, b"jpeg".to_vec())
    }

    #[test]
    fn test_payload_requires_one_of_file_or_url() {
        assert!(matches!(
            EvidencePayload::from_parts(None, None),
            Err(AtlasError::MissingPayload)
        ));
        assert!(matches!(
            EvidencePayload::from_parts(None, Some("   ".to_string())),
            Err(AtlasError::MissingPayload)
        ));
    }

    #[test]
    fn test_payload_rejects_both() {
        assert!(matches!(
            EvidencePayload::from_parts(
                Some(sample_file()),
                Some("https://example.org/p.jpg".to_string())
            ),
            Err(AtlasError::ConflictingPayload)
        ));
    }

    #[test]
    fn test_payload_accepts_exactly_one() {
        assert!(matches!(
            EvidencePayload::from_parts(Some(sample_file()), None),
            Ok(EvidencePayload::File(_))
        ));
        assert!(matches!(
            EvidencePayload::from_parts(None, Some("https://example.org/p.jpg".to_string())),
            Ok(EvidencePayload::Url(_))
        ));
    }

    #[test]
    fn test_payload_url_must_be_http() {
        let err = EvidencePayload::from_parts(None, Some("ftp://example.org/x".to_string()))
            .unwrap_err();
        match err {
            AtlasError::Validation(fields) => assert!(fields.contains("url")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
