use super::{choice, datetime_param, flag, ordering, required, required_choice, uuid_param};
use crate::app_config;
use crate::error::{AtlasError, FieldErrors};
use crate::evidence::{self, EvidenceView};
use crate::geo::GeoPoint;
use crate::middleware::Actor;
use crate::orm::infrastructure_assets::AssetType;
use crate::orm::reports::{ReportState, ReportedStatus};
use crate::pagination::PageParams;
use crate::provenance::{double_option, ProvenancePayload};
use crate::reports::{self, NewReport, ReportChanges, ReportFilter, ReportSummary};
use actix_web::{delete, get, patch, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

pub fn configure(conf: &mut web::ServiceConfig) {
    conf.service(list_reports)
        .service(create_report)
        .service(reports_geojson)
        .service(report_stats)
        .service(pending_review)
        .service(get_report)
        .service(update_report)
        .service(delete_report)
        .service(transition_report)
        .service(report_evidence);
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub infrastructure_type: Option<String>,
    pub reported_status: Option<String>,
    pub current_state: Option<String>,
    pub state: Option<String>,
    pub reporter_type: Option<String>,
    pub is_anonymous: Option<String>,
    pub infrastructure_asset: Option<String>,
    pub geographic_area: Option<String>,
    pub country: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl ReportQuery {
    fn filter(&self) -> Result<ReportFilter, AtlasError> {
        let mut errors = FieldErrors::new();
        let filter = ReportFilter {
            infrastructure_type: choice(
                &mut errors,
                "infrastructure_type",
                self.infrastructure_type.as_deref(),
            ),
            reported_status: choice(
                &mut errors,
                "reported_status",
                self.reported_status.as_deref(),
            ),
            current_state: choice(
                &mut errors,
                "current_state",
                self.current_state.as_deref().or(self.state.as_deref()),
            ),
            reporter_type: choice(&mut errors, "reporter_type", self.reporter_type.as_deref()),
            is_anonymous: flag(&mut errors, "is_anonymous", self.is_anonymous.as_deref()),
            infrastructure_asset_id: uuid_param(
                &mut errors,
                "infrastructure_asset",
                self.infrastructure_asset.as_deref(),
            ),
            geographic_area_id: uuid_param(
                &mut errors,
                "geographic_area",
                self.geographic_area.as_deref(),
            ),
            country_code: self.country.clone().filter(|c| !c.trim().is_empty()),
            since: datetime_param(&mut errors, "since", self.since.as_deref(), false),
            until: datetime_param(&mut errors, "until", self.until.as_deref(), true),
            search: self.search.clone(),
            ordering: ordering(&mut errors, self.ordering.as_deref(), reports::REPORT_ORDERING),
        };
        errors.into_result()?;
        Ok(filter)
    }

    fn params(&self) -> PageParams {
        PageParams {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportPayload {
    #[serde(default, deserialize_with = "double_option")]
    pub infrastructure_asset_id: Option<Option<Uuid>>,
    pub infrastructure_type: Option<String>,
    pub reported_status: Option<String>,
    pub description: Option<String>,
    pub location: Option<GeoPoint>,
    #[serde(default, deserialize_with = "double_option")]
    pub location_accuracy_meters: Option<Option<i32>>,
    pub reporter_type: Option<String>,
    pub is_anonymous: Option<bool>,
    #[serde(flatten)]
    pub provenance: ProvenancePayload,
}

impl ReportPayload {
    fn into_new(self, actor: &Actor) -> Result<NewReport, AtlasError> {
        let mut errors = FieldErrors::new();
        let infrastructure_type: Option<AssetType> = required_choice(
            &mut errors,
            "infrastructure_type",
            self.infrastructure_type.as_deref(),
        );
        let reported_status: Option<ReportedStatus> = required_choice(
            &mut errors,
            "reported_status",
            self.reported_status.as_deref(),
        );
        let location = required(&mut errors, "location", self.location);
        let reporter_type = choice(&mut errors, "reporter_type", self.reporter_type.as_deref());
        let provenance = self.provenance.into_provenance(&mut errors);

        match (infrastructure_type, reported_status, location) {
            (Some(infrastructure_type), Some(reported_status), Some(location))
                if errors.is_empty() =>
            {
                Ok(NewReport {
                    infrastructure_asset_id: self.infrastructure_asset_id.flatten(),
                    infrastructure_type,
                    reported_status,
                    description: self.description.unwrap_or_default(),
                    location,
                    location_accuracy_meters: self.location_accuracy_meters.flatten(),
                    reporter_type: reporter_type.unwrap_or_default(),
                    is_anonymous: self.is_anonymous.unwrap_or(false),
                    reporter: actor.name().map(str::to_string),
                    provenance,
                })
            }
            _ => Err(AtlasError::Validation(errors)),
        }
    }

    fn into_changes(self) -> Result<ReportChanges, AtlasError> {
        let mut errors = FieldErrors::new();
        let changes = ReportChanges {
            infrastructure_asset_id: self.infrastructure_asset_id,
            infrastructure_type: choice(
                &mut errors,
                "infrastructure_type",
                self.infrastructure_type.as_deref(),
            ),
            reported_status: choice(
                &mut errors,
                "reported_status",
                self.reported_status.as_deref(),
            ),
            description: self.description,
            location: self.location,
            location_accuracy_meters: self.location_accuracy_meters,
            reporter_type: choice(&mut errors, "reporter_type", self.reporter_type.as_deref()),
            is_anonymous: self.is_anonymous,
            provenance: self.provenance.into_changes(&mut errors),
        };
        errors.into_result()?;
        Ok(changes)
    }
}

#[derive(Debug, Deserialize)]
pub struct TransitionPayload {
    pub new_state: Option<String>,
    pub reason: Option<String>,
}

#[get("/api/v1/reports")]
pub async fn list_reports(
    db: web::Data<DatabaseConnection>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, AtlasError> {
    let filter = query.filter()?;
    let page =
        reports::list_reports(db.get_ref(), &filter, &query.params(), &app_config::limits())
            .await?;
    Ok(HttpResponse::Ok().json(page.map(ReportSummary::from)))
}

#[post("/api/v1/reports")]
pub async fn create_report(
    db: web::Data<DatabaseConnection>,
    actor: Actor,
    payload: web::Json<ReportPayload>,
) -> Result<HttpResponse, AtlasError> {
    let input = payload.into_inner().into_new(&actor)?;
    let report = reports::create_report(db.get_ref(), input).await?;
    let view = reports::report_detail(db.get_ref(), report.id).await?;
    Ok(HttpResponse::Created().json(view))
}

#[get("/api/v1/reports/geojson")]
pub async fn reports_geojson(
    db: web::Data<DatabaseConnection>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, AtlasError> {
    let filter = query.filter()?;
    Ok(HttpResponse::Ok().json(reports::reports_geojson(db.get_ref(), &filter).await?))
}

#[get("/api/v1/reports/stats")]
pub async fn report_stats(
    db: web::Data<DatabaseConnection>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, AtlasError> {
    let filter = query.filter()?;
    Ok(HttpResponse::Ok().json(reports::report_stats(db.get_ref(), &filter).await?))
}

#[get("/api/v1/reports/pending_review")]
pub async fn pending_review(
    db: web::Data<DatabaseConnection>,
    query: web::Query<PageParams>,
) -> Result<HttpResponse, AtlasError> {
    let page = reports::pending_review(db.get_ref(), &query, &app_config::limits()).await?;
    Ok(HttpResponse::Ok().json(page.map(ReportSummary::from)))
}

#[get("/api/v1/reports/{id}")]
pub async fn get_report(
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AtlasError> {
    let view = reports::report_detail(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[patch("/api/v1/reports/{id}")]
pub async fn update_report(
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
    payload: web::Json<ReportPayload>,
) -> Result<HttpResponse, AtlasError> {
    let changes = payload.into_inner().into_changes()?;
    let report = reports::update_report(db.get_ref(), path.into_inner(), changes).await?;
    let view = reports::report_detail(db.get_ref(), report.id).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[delete("/api/v1/reports/{id}")]
pub async fn delete_report(
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AtlasError> {
    reports::delete_report(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/api/v1/reports/{id}/transition")]
pub async fn transition_report(
    db: web::Data<DatabaseConnection>,
    actor: Actor,
    path: web::Path<Uuid>,
    payload: web::Json<TransitionPayload>,
) -> Result<HttpResponse, actix_web::Error> {
    let actor_name = actor.require()?;
    let payload = payload.into_inner();

    let mut errors = FieldErrors::new();
    let target: Option<ReportState> =
        required_choice(&mut errors, "new_state", payload.new_state.as_deref());
    let target = match target {
        Some(target) if errors.is_empty() => target,
        _ => return Err(AtlasError::Validation(errors).into()),
    };

    let report_id = path.into_inner();
    log::debug!("{} requested transition of report {} to {}", actor_name, report_id, target);
    let report =
        reports::request_transition(db.get_ref(), report_id, target, payload.reason.as_deref())
            .await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": format!("Report transitioned to {}", report.current_state),
        "current_state": report.current_state,
    })))
}

#[get("/api/v1/reports/{id}/evidence")]
pub async fn report_evidence(
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AtlasError> {
    let evidence: Vec<EvidenceView> = evidence::evidence_for_report(db.get_ref(), path.into_inner())
        .await?
        .into_iter()
        .map(EvidenceView::from)
        .collect();
    Ok(HttpResponse::Ok().json(evidence))
}
