use super::{choice, datetime_param, required, required_choice, uuid_param};
use crate::app_config;
use crate::error::{AtlasError, FieldErrors, NON_FIELD_ERRORS};
use crate::evidence::{
    self, EvidenceChanges, EvidenceFile, EvidenceFilter, EvidencePayload, EvidenceView,
    NewEvidence, UploadBuffer,
};
use crate::orm::evidence::EvidenceType;
use crate::pagination::PageParams;
use crate::provenance::ProvenancePayload;
use crate::storage::{key_digest, StorageBackend};
use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{delete, get, patch, post, web, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Largest accepted non-file form field.
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

pub fn configure(conf: &mut web::ServiceConfig) {
    conf.service(list_evidence)
        .service(create_evidence)
        .service(get_evidence)
        .service(update_evidence)
        .service(delete_evidence)
        .service(download_evidence_file);
}

/// A parsed multipart evidence form.
#[derive(Debug, Default)]
pub struct EvidenceForm {
    fields: HashMap<String, String>,
    file: Option<EvidenceFile>,
}

impl EvidenceForm {
    /// Read every part, hashing the `file` part as it streams in.
    pub async fn read(mut multipart: Multipart, upload_limit: u64) -> Result<Self, AtlasError> {
        let mut form = EvidenceForm::default();

        while let Some(mut field) = multipart.try_next().await.map_err(|e| {
            log::debug!("evidence form: multipart read error: {}", e);
            AtlasError::validation(NON_FIELD_ERRORS, "Malformed multipart body.")
        })? {
            let disposition = field.content_disposition();
            let name = match disposition.and_then(|d| d.get_name()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            if name == "file" {
                let file_name = disposition.and_then(|d| d.get_filename()).map(str::to_string);
                let content_type = field.content_type().map(|m| m.to_string());
                let mut buffer = UploadBuffer::new(upload_limit);
                while let Some(chunk) = field.next().await {
                    let bytes = chunk.map_err(|e| {
                        log::debug!("evidence form: file read error: {}", e);
                        AtlasError::validation("file", "The upload could not be read.")
                    })?;
                    buffer.push(&bytes)?;
                }
                if buffer.is_empty() {
                    return Err(AtlasError::validation("file", "The submitted file is empty."));
                }
                form.file = Some(buffer.finish(file_name, content_type));
            } else {
                let mut buf: Vec<u8> = Vec::with_capacity(128);
                while let Some(chunk) = field.next().await {
                    let bytes = chunk.map_err(|e| {
                        log::debug!("evidence form: field read error: {}", e);
                        AtlasError::validation(&name, "The value could not be read.")
                    })?;
                    if buf.len() + bytes.len() > MAX_TEXT_FIELD_BYTES {
                        return Err(AtlasError::validation(&name, "The value is too long."));
                    }
                    buf.extend_from_slice(&bytes);
                }
                let value = String::from_utf8(buf)
                    .map_err(|_| AtlasError::validation(&name, "The value is not valid UTF-8."))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    fn owned(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    fn provenance(&self) -> ProvenancePayload {
        ProvenancePayload {
            data_source: self.owned("data_source"),
            source_url: self.fields.get("source_url").map(|u| Some(u.clone())),
            source_notes: self.owned("source_notes"),
        }
    }

    fn into_new(mut self) -> Result<(NewEvidence, EvidencePayload), AtlasError> {
        // Payload shape is checked before anything else.
        let payload = EvidencePayload::from_parts(self.file.take(), self.owned("url"))?;

        let mut errors = FieldErrors::new();
        let report_raw = self.text("report_id").or(self.text("report"));
        let report_uuid = uuid_param(&mut errors, "report_id", report_raw);
        let report_id = required(&mut errors, "report_id", report_uuid);
        let evidence_type: Option<EvidenceType> =
            required_choice(&mut errors, "evidence_type", self.text("evidence_type"));
        let captured_at = datetime_param(&mut errors, "captured_at", self.text("captured_at"), false);
        let source_device = choice(&mut errors, "source_device", self.text("source_device"));
        let provenance = self.provenance().into_provenance(&mut errors);

        match (report_id, evidence_type) {
            (Some(report_id), Some(evidence_type)) if errors.is_empty() => Ok((
                NewEvidence {
                    report_id,
                    evidence_type,
                    captured_at,
                    source_device,
                    description: self.owned("description").unwrap_or_default(),
                    provenance,
                },
                payload,
            )),
            _ => Err(AtlasError::Validation(errors)),
        }
    }

    fn into_changes(self) -> Result<(EvidenceChanges, Option<EvidenceFile>, Option<String>), AtlasError> {
        let mut errors = FieldErrors::new();
        let captured_at = self.fields.get("captured_at").map(|raw| {
            datetime_param(&mut errors, "captured_at", Some(raw.as_str()), false)
        });
        let source_device = self
            .fields
            .get("source_device")
            .map(|raw| choice(&mut errors, "source_device", Some(raw.as_str())));
        let changes = EvidenceChanges {
            evidence_type: choice(&mut errors, "evidence_type", self.text("evidence_type")),
            captured_at,
            source_device,
            description: self.owned("description"),
            provenance: self.provenance().into_changes(&mut errors),
        };
        errors.into_result()?;
        let url = self.owned("url");
        Ok((changes, self.file, url))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EvidenceQuery {
    pub report: Option<String>,
    pub evidence_type: Option<String>,
    pub source_device: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[get("/api/v1/evidence")]
pub async fn list_evidence(
    db: web::Data<DatabaseConnection>,
    query: web::Query<EvidenceQuery>,
) -> Result<HttpResponse, AtlasError> {
    let mut errors = FieldErrors::new();
    let filter = EvidenceFilter {
        report_id: uuid_param(&mut errors, "report", query.report.as_deref()),
        evidence_type: choice(&mut errors, "evidence_type", query.evidence_type.as_deref()),
        source_device: choice(&mut errors, "source_device", query.source_device.as_deref()),
    };
    errors.into_result()?;

    let params = PageParams {
        page: query.page,
        page_size: query.page_size,
    };
    let page = evidence::list_evidence(db.get_ref(), &filter, &params, &app_config::limits()).await?;
    Ok(HttpResponse::Ok().json(page.map(EvidenceView::from)))
}

#[post("/api/v1/evidence")]
pub async fn create_evidence(
    db: web::Data<DatabaseConnection>,
    storage: web::Data<dyn StorageBackend>,
    multipart: Multipart,
) -> Result<HttpResponse, AtlasError> {
    let form = EvidenceForm::read(multipart, app_config::limits().max_upload_bytes()).await?;
    let (input, payload) = form.into_new()?;
    let record = evidence::attach_evidence(db.get_ref(), storage.get_ref(), input, payload).await?;
    Ok(HttpResponse::Created().json(EvidenceView::from(record)))
}

#[get("/api/v1/evidence/{id}")]
pub async fn get_evidence(
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AtlasError> {
    let record = evidence::get_evidence(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(EvidenceView::from(record)))
}

#[patch("/api/v1/evidence/{id}")]
pub async fn update_evidence(
    db: web::Data<DatabaseConnection>,
    storage: web::Data<dyn StorageBackend>,
    path: web::Path<Uuid>,
    multipart: Multipart,
) -> Result<HttpResponse, AtlasError> {
    let form = EvidenceForm::read(multipart, app_config::limits().max_upload_bytes()).await?;
    let (changes, file, url) = form.into_changes()?;
    let record = evidence::update_evidence(
        db.get_ref(),
        storage.get_ref(),
        path.into_inner(),
        changes,
        file,
        url,
    )
    .await?;
    Ok(HttpResponse::Ok().json(EvidenceView::from(record)))
}

#[delete("/api/v1/evidence/{id}")]
pub async fn delete_evidence(
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AtlasError> {
    evidence::delete_evidence(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/api/v1/evidence/{id}/file")]
pub async fn download_evidence_file(
    db: web::Data<DatabaseConnection>,
    storage: web::Data<dyn StorageBackend>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AtlasError> {
    let (record, object) =
        evidence::open_file(db.get_ref(), storage.get_ref(), path.into_inner()).await?;

    let content_type = record
        .content_type
        .or(object.content_type)
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let mut response = HttpResponse::Ok();
    response.content_type(content_type);
    // The recorded hash stays frozen across replacements; the key names the
    // bytes actually served.
    if let Some(digest) = record.file_key.as_deref().and_then(key_digest) {
        response.insert_header((header::ETAG, format!("\"{}\"", digest)));
    }
    if let Some(name) = &record.file_name {
        response.insert_header((
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", name.replace('"', "")),
        ));
    }
    Ok(response.streaming(object.body))
}
