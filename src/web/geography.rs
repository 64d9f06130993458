use super::{choice, flag, ordering, required, required_choice, uuid_param};
use crate::app_config;
use crate::error::{AtlasError, FieldErrors};
use crate::geo::GeoPoint;
use crate::geography::{self, AreaChanges, AreaFilter, AreaSummary, NewArea};
use crate::orm::geographic_areas::AdminLevel;
use crate::pagination::PageParams;
use crate::provenance::{double_option, ProvenancePayload};
use actix_web::{delete, get, patch, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub fn configure(conf: &mut web::ServiceConfig) {
    conf.service(list_areas)
        .service(create_area)
        .service(areas_geojson)
        .service(countries)
        .service(get_area)
        .service(update_area)
        .service(delete_area)
        .service(area_children)
        .service(deactivate_area);
}

#[derive(Debug, Default, Deserialize)]
pub struct AreaQuery {
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub level: Option<String>,
    pub admin_level: Option<String>,
    pub parent_id: Option<String>,
    pub parent: Option<String>,
    pub is_active: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl AreaQuery {
    fn filter(&self) -> Result<AreaFilter, AtlasError> {
        let mut errors = FieldErrors::new();
        let admin_level = choice(
            &mut errors,
            "level",
            self.level.as_deref().or(self.admin_level.as_deref()),
        );
        let parent_id = uuid_param(
            &mut errors,
            "parent_id",
            self.parent_id.as_deref().or(self.parent.as_deref()),
        );
        let is_active = flag(&mut errors, "is_active", self.is_active.as_deref());
        let ordering = ordering(&mut errors, self.ordering.as_deref(), geography::AREA_ORDERING);
        errors.into_result()?;

        Ok(AreaFilter {
            country_code: self
                .country
                .clone()
                .or_else(|| self.country_code.clone())
                .filter(|c| !c.trim().is_empty()),
            admin_level,
            parent_id,
            is_active,
            search: self.search.clone(),
            ordering,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AreaPayload {
    pub name: Option<String>,
    pub country_code: Option<String>,
    pub admin_level: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub boundary: Option<Option<Value>>,
    #[serde(default, deserialize_with = "double_option")]
    pub centroid: Option<Option<GeoPoint>>,
    #[serde(default, deserialize_with = "double_option")]
    pub population: Option<Option<i64>>,
    pub is_active: Option<bool>,
    #[serde(flatten)]
    pub provenance: ProvenancePayload,
}

impl AreaPayload {
    fn into_new(self) -> Result<NewArea, AtlasError> {
        let mut errors = FieldErrors::new();
        let name = required(&mut errors, "name", self.name);
        let country_code = required(&mut errors, "country_code", self.country_code);
        let admin_level: Option<AdminLevel> =
            required_choice(&mut errors, "admin_level", self.admin_level.as_deref());
        let provenance = self.provenance.into_provenance(&mut errors);

        match (name, country_code, admin_level) {
            (Some(name), Some(country_code), Some(admin_level)) if errors.is_empty() => Ok(NewArea {
                name,
                country_code,
                admin_level,
                parent_id: self.parent_id.flatten(),
                boundary: self.boundary.flatten(),
                centroid: self.centroid.flatten(),
                population: self.population.flatten(),
                is_active: self.is_active.unwrap_or(true),
                provenance,
            }),
            _ => Err(AtlasError::Validation(errors)),
        }
    }

    fn into_changes(self) -> Result<AreaChanges, AtlasError> {
        let mut errors = FieldErrors::new();
        let admin_level = choice(&mut errors, "admin_level", self.admin_level.as_deref());
        let provenance = self.provenance.into_changes(&mut errors);
        errors.into_result()?;

        Ok(AreaChanges {
            name: self.name,
            country_code: self.country_code,
            admin_level,
            parent_id: self.parent_id,
            boundary: self.boundary,
            centroid: self.centroid,
            population: self.population,
            is_active: self.is_active,
            provenance,
        })
    }
}

#[get("/api/v1/geography/areas")]
pub async fn list_areas(
    db: web::Data<DatabaseConnection>,
    query: web::Query<AreaQuery>,
) -> Result<HttpResponse, AtlasError> {
    let filter = query.filter()?;
    let params = PageParams {
        page: query.page,
        page_size: query.page_size,
    };
    let page = geography::list_areas(db.get_ref(), &filter, &params, &app_config::limits()).await?;
    Ok(HttpResponse::Ok().json(page.map(AreaSummary::from)))
}

#[post("/api/v1/geography/areas")]
pub async fn create_area(
    db: web::Data<DatabaseConnection>,
    payload: web::Json<AreaPayload>,
) -> Result<HttpResponse, AtlasError> {
    let input = payload.into_inner().into_new()?;
    let area = geography::create_area(db.get_ref(), input).await?;
    let view = geography::area_view(db.get_ref(), area).await?;
    Ok(HttpResponse::Created().json(view))
}

#[get("/api/v1/geography/areas/geojson")]
pub async fn areas_geojson(
    db: web::Data<DatabaseConnection>,
    query: web::Query<AreaQuery>,
) -> Result<HttpResponse, AtlasError> {
    let filter = query.filter()?;
    let collection = geography::areas_geojson(db.get_ref(), &filter).await?;
    Ok(HttpResponse::Ok().json(collection))
}

#[get("/api/v1/geography/areas/countries")]
pub async fn countries(db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AtlasError> {
    let countries: Vec<Value> = geography::countries(db.get_ref())
        .await?
        .into_iter()
        .map(|area| {
            json!({
                "id": area.id,
                "name": area.name,
                "country_code": area.country_code,
            })
        })
        .collect();
    Ok(HttpResponse::Ok().json(countries))
}

#[get("/api/v1/geography/areas/{id}")]
pub async fn get_area(
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AtlasError> {
    let area = geography::get_area(db.get_ref(), path.into_inner()).await?;
    let view = geography::area_view(db.get_ref(), area).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[patch("/api/v1/geography/areas/{id}")]
pub async fn update_area(
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
    payload: web::Json<AreaPayload>,
) -> Result<HttpResponse, AtlasError> {
    let changes = payload.into_inner().into_changes()?;
    let area = geography::update_area(db.get_ref(), path.into_inner(), changes).await?;
    let view = geography::area_view(db.get_ref(), area).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[delete("/api/v1/geography/areas/{id}")]
pub async fn delete_area(
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AtlasError> {
    geography::delete_area(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/api/v1/geography/areas/{id}/children")]
pub async fn area_children(
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AtlasError> {
    let children: Vec<AreaSummary> = geography::children(db.get_ref(), path.into_inner())
        .await?
        .into_iter()
        .map(AreaSummary::from)
        .collect();
    Ok(HttpResponse::Ok().json(children))
}

#[post("/api/v1/geography/areas/{id}/deactivate")]
pub async fn deactivate_area(
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AtlasError> {
    let area = geography::deactivate_area(db.get_ref(), path.into_inner()).await?;
    let view = geography::area_view(db.get_ref(), area).await?;
    Ok(HttpResponse::Ok().json(view))
}
