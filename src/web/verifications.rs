use super::{choice, flag, required, required_choice, uuid_param};
use crate::app_config;
use crate::error::{AtlasError, FieldErrors};
use crate::middleware::Actor;
use crate::orm::verifications::VerificationMethod;
use crate::pagination::PageParams;
use crate::provenance::ProvenancePayload;
use crate::verification::{self, NewVerification, VerificationFilter, VerificationView};
use actix_web::{get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use uuid::Uuid;

pub fn configure(conf: &mut web::ServiceConfig) {
    conf.service(list_verifications)
        .service(create_verification)
        .service(get_verification);
}

#[derive(Debug, Default, Deserialize)]
pub struct VerificationQuery {
    pub report: Option<String>,
    pub verification_method: Option<String>,
    pub is_confirmed: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerificationPayload {
    pub report_id: Option<Uuid>,
    pub verification_method: Option<String>,
    pub is_confirmed: Option<bool>,
    pub verification_notes: Option<String>,
    #[serde(flatten)]
    pub provenance: ProvenancePayload,
}

impl VerificationPayload {
    fn into_new(self) -> Result<NewVerification, AtlasError> {
        let mut errors = FieldErrors::new();
        let report_id = required(&mut errors, "report_id", self.report_id);
        let verification_method: Option<VerificationMethod> = required_choice(
            &mut errors,
            "verification_method",
            self.verification_method.as_deref(),
        );
        let is_confirmed = required(&mut errors, "is_confirmed", self.is_confirmed);
        let provenance = self.provenance.into_provenance(&mut errors);

        match (report_id, verification_method, is_confirmed) {
            (Some(report_id), Some(verification_method), Some(is_confirmed))
                if errors.is_empty() =>
            {
                Ok(NewVerification {
                    report_id,
                    verification_method,
                    is_confirmed,
                    verification_notes: self.verification_notes.unwrap_or_default(),
                    provenance,
                })
            }
            _ => Err(AtlasError::Validation(errors)),
        }
    }
}

#[get("/api/v1/verifications")]
pub async fn list_verifications(
    db: web::Data<DatabaseConnection>,
    query: web::Query<VerificationQuery>,
) -> Result<HttpResponse, AtlasError> {
    let mut errors = FieldErrors::new();
    let filter = VerificationFilter {
        report_id: uuid_param(&mut errors, "report", query.report.as_deref()),
        verification_method: choice(
            &mut errors,
            "verification_method",
            query.verification_method.as_deref(),
        ),
        is_confirmed: flag(&mut errors, "is_confirmed", query.is_confirmed.as_deref()),
    };
    errors.into_result()?;

    let params = PageParams {
        page: query.page,
        page_size: query.page_size,
    };
    let page =
        verification::list_verifications(db.get_ref(), &filter, &params, &app_config::limits())
            .await?;
    Ok(HttpResponse::Ok().json(page.map(VerificationView::from)))
}

#[post("/api/v1/verifications")]
pub async fn create_verification(
    db: web::Data<DatabaseConnection>,
    actor: Actor,
    payload: web::Json<VerificationPayload>,
) -> Result<HttpResponse, actix_web::Error> {
    let verified_by = actor.require()?;
    let input = payload.into_inner().into_new()?;
    let record = verification::record_verification(db.get_ref(), Some(verified_by), input).await?;
    Ok(HttpResponse::Created().json(VerificationView::from(record)))
}

#[get("/api/v1/verifications/{id}")]
pub async fn get_verification(
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AtlasError> {
    let record = verification::get_verification(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(VerificationView::from(record)))
}
