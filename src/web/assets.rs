use super::{choice, flag, ordering, required, required_choice, uuid_param};
use crate::app_config;
use crate::assets::{self, AssetChanges, AssetFilter, AssetView, NewAsset};
use crate::error::{AtlasError, FieldErrors};
use crate::geo::GeoPoint;
use crate::orm::infrastructure_assets::AssetType;
use crate::pagination::PageParams;
use crate::provenance::{double_option, ProvenancePayload};
use actix_web::{delete, get, patch, post, web, HttpResponse};
use chrono::NaiveDateTime;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use uuid::Uuid;

pub fn configure(conf: &mut web::ServiceConfig) {
    conf.service(list_assets)
        .service(create_asset)
        .service(assets_geojson)
        .service(asset_types)
        .service(asset_stats)
        .service(get_asset)
        .service(update_asset)
        .service(delete_asset)
        .service(deactivate_asset);
}

#[derive(Debug, Default, Deserialize)]
pub struct AssetQuery {
    pub asset_type: Option<String>,
    pub condition: Option<String>,
    pub geographic_area: Option<String>,
    pub geographic_area_id: Option<String>,
    pub country: Option<String>,
    pub is_verified: Option<String>,
    pub data_source: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl AssetQuery {
    fn filter(&self) -> Result<AssetFilter, AtlasError> {
        let mut errors = FieldErrors::new();
        let filter = AssetFilter {
            asset_type: choice(&mut errors, "asset_type", self.asset_type.as_deref()),
            condition: choice(&mut errors, "condition", self.condition.as_deref()),
            geographic_area_id: uuid_param(
                &mut errors,
                "geographic_area",
                self.geographic_area_id
                    .as_deref()
                    .or(self.geographic_area.as_deref()),
            ),
            country_code: self.country.clone().filter(|c| !c.trim().is_empty()),
            is_verified: flag(&mut errors, "is_verified", self.is_verified.as_deref()),
            data_source: choice(&mut errors, "data_source", self.data_source.as_deref()),
            search: self.search.clone(),
            ordering: ordering(&mut errors, self.ordering.as_deref(), assets::ASSET_ORDERING),
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
pub struct AssetPayload {
    pub asset_type: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub official_name: Option<Option<String>>,
    pub local_name: Option<String>,
    pub description: Option<String>,
    pub location: Option<GeoPoint>,
    pub geographic_area_id: Option<Uuid>,
    pub condition: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub condition_verified_at: Option<Option<NaiveDateTime>>,
    pub official_id: Option<String>,
    pub is_verified: Option<bool>,
    pub is_active: Option<bool>,
    #[serde(flatten)]
    pub provenance: ProvenancePayload,
}

impl AssetPayload {
    fn into_new(self) -> Result<NewAsset, AtlasError> {
        let mut errors = FieldErrors::new();
        let asset_type: Option<AssetType> =
            required_choice(&mut errors, "asset_type", self.asset_type.as_deref());
        let location = required(&mut errors, "location", self.location);
        let area_id = required(&mut errors, "geographic_area_id", self.geographic_area_id);
        let condition = choice(&mut errors, "condition", self.condition.as_deref());
        let provenance = self.provenance.into_provenance(&mut errors);

        match (asset_type, location, area_id) {
            (Some(asset_type), Some(location), Some(geographic_area_id)) if errors.is_empty() => {
                Ok(NewAsset {
                    asset_type,
                    official_name: self.official_name.flatten(),
                    local_name: self.local_name.unwrap_or_default(),
                    description: self.description.unwrap_or_default(),
                    location,
                    geographic_area_id,
                    condition: condition.unwrap_or_default(),
                    condition_verified_at: self.condition_verified_at.flatten(),
                    official_id: self.official_id.unwrap_or_default(),
                    is_verified: self.is_verified.unwrap_or(false),
                    provenance,
                })
            }
            _ => Err(AtlasError::Validation(errors)),
        }
    }

    fn into_changes(self) -> Result<AssetChanges, AtlasError> {
        let mut errors = FieldErrors::new();
        let asset_type = choice(&mut errors, "asset_type", self.asset_type.as_deref());
        let condition = choice(&mut errors, "condition", self.condition.as_deref());
        let provenance = self.provenance.into_changes(&mut errors);
        errors.into_result()?;

        Ok(AssetChanges {
            asset_type,
            official_name: self.official_name,
            local_name: self.local_name,
            description: self.description,
            location: self.location,
            geographic_area_id: self.geographic_area_id,
            condition,
            condition_verified_at: self.condition_verified_at,
            official_id: self.official_id,
            is_verified: self.is_verified,
            is_active: self.is_active,
            provenance,
        })
    }
}

#[get("/api/v1/infrastructure/assets")]
pub async fn list_assets(
    db: web::Data<DatabaseConnection>,
    query: web::Query<AssetQuery>,
) -> Result<HttpResponse, AtlasError> {
    let filter = query.filter()?;
    let page =
        assets::list_assets(db.get_ref(), &filter, &query.params(), &app_config::limits()).await?;

    let (count, page_number, page_size) = (page.count, page.page, page.page_size);
    let results = assets::asset_views(db.get_ref(), page.results).await?;
    Ok(HttpResponse::Ok().json(crate::pagination::Page {
        count,
        page: page_number,
        page_size,
        results,
    }))
}

#[post("/api/v1/infrastructure/assets")]
pub async fn create_asset(
    db: web::Data<DatabaseConnection>,
    payload: web::Json<AssetPayload>,
) -> Result<HttpResponse, AtlasError> {
    let input = payload.into_inner().into_new()?;
    let asset = assets::create_asset(db.get_ref(), input).await?;
    Ok(HttpResponse::Created().json(assets::asset_view(db.get_ref(), asset).await?))
}

#[get("/api/v1/infrastructure/assets/geojson")]
pub async fn assets_geojson(
    db: web::Data<DatabaseConnection>,
    query: web::Query<AssetQuery>,
) -> Result<HttpResponse, AtlasError> {
    let filter = query.filter()?;
    Ok(HttpResponse::Ok().json(assets::assets_geojson(db.get_ref(), &filter).await?))
}

#[get("/api/v1/infrastructure/assets/types")]
pub async fn asset_types() -> HttpResponse {
    HttpResponse::Ok().json(assets::asset_types())
}

#[get("/api/v1/infrastructure/assets/stats")]
pub async fn asset_stats(
    db: web::Data<DatabaseConnection>,
    query: web::Query<AssetQuery>,
) -> Result<HttpResponse, AtlasError> {
    let filter = query.filter()?;
    Ok(HttpResponse::Ok().json(assets::asset_stats(db.get_ref(), &filter).await?))
}

#[get("/api/v1/infrastructure/assets/{id}")]
pub async fn get_asset(
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AtlasError> {
    let asset = assets::get_asset(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(assets::asset_view(db.get_ref(), asset).await?))
}

#[patch("/api/v1/infrastructure/assets/{id}")]
pub async fn update_asset(
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
    payload: web::Json<AssetPayload>,
) -> Result<HttpResponse, AtlasError> {
    let changes = payload.into_inner().into_changes()?;
    let asset = assets::update_asset(db.get_ref(), path.into_inner(), changes).await?;
    Ok(HttpResponse::Ok().json(assets::asset_view(db.get_ref(), asset).await?))
}

#[delete("/api/v1/infrastructure/assets/{id}")]
pub async fn delete_asset(
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AtlasError> {
    assets::delete_asset(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/api/v1/infrastructure/assets/{id}/deactivate")]
pub async fn deactivate_asset(
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AtlasError> {
    let asset = assets::deactivate_asset(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(assets::asset_view(db.get_ref(), asset).await?))
}
