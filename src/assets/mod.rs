//! Asset Registry: canonical infrastructure records anchored to an area.

use crate::app_config::LimitsConfig;
use crate::error::{AtlasError, FieldErrors};
use crate::geo::GeoPoint;
use crate::geography::{self, plural};
use crate::geojson::{Feature, FeatureCollection};
use crate::orm::infrastructure_assets::{self, AssetCondition, AssetType};
use crate::orm::{geographic_areas, reports, DataSource};
use crate::pagination::{fetch_page, Page, PageParams};
use crate::provenance::{Provenance, ProvenanceChanges};
use crate::search::{any_icontains, search_term, Sort};
use crate::stats::count_by;
use chrono::{NaiveDateTime, Utc};
use sea_orm::entity::*;
use sea_orm::{
    ActiveEnum, ConnectionTrait, DatabaseConnection, Iterable, JoinType, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Select, TransactionTrait,
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug)]
pub struct NewAsset {
    pub asset_type: AssetType,
    pub official_name: Option<String>,
    pub local_name: String,
    pub description: String,
    pub location: GeoPoint,
    pub geographic_area_id: Uuid,
    pub condition: AssetCondition,
    pub condition_verified_at: Option<NaiveDateTime>,
    pub official_id: String,
    pub is_verified: bool,
    pub provenance: Provenance,
}

#[derive(Clone, Debug, Default)]
pub struct AssetChanges {
    pub asset_type: Option<AssetType>,
    pub official_name: Option<Option<String>>,
    pub local_name: Option<String>,
    pub description: Option<String>,
    pub location: Option<GeoPoint>,
    pub geographic_area_id: Option<Uuid>,
    pub condition: Option<AssetCondition>,
    pub condition_verified_at: Option<Option<NaiveDateTime>>,
    pub official_id: Option<String>,
    pub is_verified: Option<bool>,
    pub is_active: Option<bool>,
    pub provenance: ProvenanceChanges,
}

#[derive(Clone, Debug, Default)]
pub struct AssetFilter {
    pub asset_type: Option<AssetType>,
    pub condition: Option<AssetCondition>,
    pub geographic_area_id: Option<Uuid>,
    pub country_code: Option<String>,
    pub is_verified: Option<bool>,
    pub data_source: Option<DataSource>,
    /// Case-insensitive substring of the official name, local name or description
    pub search: Option<String>,
    /// Replaces the default newest-first ordering.
    pub ordering: Option<Sort<infrastructure_assets::Column>>,
}

/// Fields a client may order the asset list by.
pub const ASSET_ORDERING: &[(&str, infrastructure_assets::Column)] = &[
    ("created_at", infrastructure_assets::Column::CreatedAt),
    ("asset_type", infrastructure_assets::Column::AssetType),
    ("condition", infrastructure_assets::Column::Condition),
];

const ASSET_SEARCH: &[infrastructure_assets::Column] = &[
    infrastructure_assets::Column::OfficialName,
    infrastructure_assets::Column::LocalName,
    infrastructure_assets::Column::Description,
];

fn check_lengths(errors: &mut FieldErrors, fields: &[(&str, Option<&str>, usize)]) {
    for (field, value, max) in fields {
        if let Some(value) = value {
            if value.chars().count() > *max {
                errors.add(
                    field,
                    format!("Ensure this field has no more than {} characters.", max),
                );
            }
        }
    }
}

/// The anchor area must exist and be active.
async fn check_anchor<C: ConnectionTrait>(db: &C, area_id: Uuid) -> Result<(), AtlasError> {
    if geography::exists_and_active(db, area_id).await? {
        Ok(())
    } else {
        Err(AtlasError::validation(
            "geographic_area_id",
            format!(
                "Geographic area {} does not exist or is not active.",
                area_id
            ),
        ))
    }
}

pub async fn get_asset<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<infrastructure_assets::Model, AtlasError> {
    infrastructure_assets::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AtlasError::not_found("infrastructure asset", id))
}

/// Whether an asset exists, is active, and its area exists.
pub async fn exists_and_active<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<bool, AtlasError> {
    let count = infrastructure_assets::Entity::find()
        .inner_join(geographic_areas::Entity)
        .filter(infrastructure_assets::Column::Id.eq(id))
        .filter(infrastructure_assets::Column::IsActive.eq(true))
        .count(db)
        .await?;
    Ok(count > 0)
}

pub async fn create_asset<C: ConnectionTrait>(
    db: &C,
    input: NewAsset,
) -> Result<infrastructure_assets::Model, AtlasError> {
    let mut errors = FieldErrors::new();
    check_lengths(
        &mut errors,
        &[
            ("official_name", input.official_name.as_deref(), 255),
            ("local_name", Some(input.local_name.as_str()), 255),
            ("official_id", Some(input.official_id.as_str()), 100),
        ],
    );
    if let Err(e) = input.provenance.validate() {
        errors.extend(e.into());
    }
    errors.into_result()?;

    check_anchor(db, input.geographic_area_id).await?;

    let now = Utc::now().naive_utc();
    let asset = infrastructure_assets::ActiveModel {
        id: Set(Uuid::new_v4()),
        asset_type: Set(input.asset_type),
        official_name: Set(input.official_name.filter(|n| !n.trim().is_empty())),
        local_name: Set(input.local_name),
        description: Set(input.description),
        longitude: Set(input.location.longitude),
        latitude: Set(input.location.latitude),
        geographic_area_id: Set(input.geographic_area_id),
        condition: Set(input.condition),
        condition_verified_at: Set(input.condition_verified_at),
        official_id: Set(input.official_id),
        is_verified: Set(input.is_verified),
        is_active: Set(true),
        data_source: Set(input.provenance.data_source),
        source_url: Set(input.provenance.source_url),
        source_notes: Set(input.provenance.source_notes),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    log::info!(
        "Created {} asset {} in area {}",
        asset.asset_type.to_value(),
        asset.id,
        asset.geographic_area_id
    );
    Ok(asset)
}

pub async fn update_asset<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    changes: AssetChanges,
) -> Result<infrastructure_assets::Model, AtlasError> {
    let existing = get_asset(db, id).await?;

    let mut errors = FieldErrors::new();
    check_lengths(
        &mut errors,
        &[
            (
                "official_name",
                changes.official_name.as_ref().and_then(|n| n.as_deref()),
                255,
            ),
            ("local_name", changes.local_name.as_deref(), 255),
            ("official_id", changes.official_id.as_deref(), 100),
        ],
    );
    if let Err(e) = changes.provenance.validate() {
        errors.extend(e.into());
    }
    errors.into_result()?;

    if let Some(area_id) = changes.geographic_area_id {
        if area_id != existing.geographic_area_id {
            check_anchor(db, area_id).await?;
        }
    }

    let mut asset: infrastructure_assets::ActiveModel = existing.into();
    if let Some(asset_type) = changes.asset_type {
        asset.asset_type = Set(asset_type);
    }
    if let Some(official_name) = changes.official_name {
        asset.official_name = Set(official_name.filter(|n| !n.trim().is_empty()));
    }
    if let Some(local_name) = changes.local_name {
        asset.local_name = Set(local_name);
    }
    if let Some(description) = changes.description {
        asset.description = Set(description);
    }
    if let Some(location) = changes.location {
        asset.longitude = Set(location.longitude);
        asset.latitude = Set(location.latitude);
    }
    if let Some(area_id) = changes.geographic_area_id {
        asset.geographic_area_id = Set(area_id);
    }
    if let Some(condition) = changes.condition {
        asset.condition = Set(condition);
    }
    if let Some(verified_at) = changes.condition_verified_at {
        asset.condition_verified_at = Set(verified_at);
    }
    if let Some(official_id) = changes.official_id {
        asset.official_id = Set(official_id);
    }
    if let Some(is_verified) = changes.is_verified {
        asset.is_verified = Set(is_verified);
    }
    if let Some(is_active) = changes.is_active {
        asset.is_active = Set(is_active);
    }
    let provenance = changes.provenance;
    if let Some(source) = provenance.data_source {
        asset.data_source = Set(source);
    }
    if provenance.source_url.is_some() || provenance.clear_source_url {
        asset.source_url = Set(provenance.source_url);
    }
    if let Some(notes) = provenance.source_notes {
        asset.source_notes = Set(notes);
    }
    asset.updated_at = Set(Utc::now().naive_utc());

    Ok(asset.update(db).await?)
}

pub async fn deactivate_asset<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<infrastructure_assets::Model, AtlasError> {
    let mut asset: infrastructure_assets::ActiveModel = get_asset(db, id).await?.into();
    asset.is_active = Set(false);
    asset.updated_at = Set(Utc::now().naive_utc());
    let asset = asset.update(db).await?;
    log::info!("Deactivated infrastructure asset {}", id);
    Ok(asset)
}

/// Hard-delete an asset that no report links to.
pub async fn delete_asset(db: &DatabaseConnection, id: Uuid) -> Result<(), AtlasError> {
    let txn = db.begin().await?;

    get_asset(&txn, id).await?;

    let linked = reports::Entity::find()
        .filter(reports::Column::InfrastructureAssetId.eq(id))
        .count(&txn)
        .await?;
    if linked > 0 {
        let err = AtlasError::ReferentialIntegrityViolation {
            entity: "infrastructure asset",
            id,
            dependents: plural(linked, "report", "reports"),
        };
        log::warn!("{}", err);
        txn.rollback().await?;
        return Err(err);
    }

    infrastructure_assets::Entity::delete_by_id(id)
        .exec(&txn)
        .await?;
    txn.commit().await?;
    log::info!("Deleted infrastructure asset {}", id);
    Ok(())
}

/// Active assets matching `filter`, unordered.
fn filtered(filter: &AssetFilter) -> Select<infrastructure_assets::Entity> {
    let mut query = infrastructure_assets::Entity::find()
        .filter(infrastructure_assets::Column::IsActive.eq(true));

    if let Some(asset_type) = filter.asset_type {
        query = query.filter(infrastructure_assets::Column::AssetType.eq(asset_type));
    }
    if let Some(condition) = filter.condition {
        query = query.filter(infrastructure_assets::Column::Condition.eq(condition));
    }
    if let Some(area_id) = filter.geographic_area_id {
        query = query.filter(infrastructure_assets::Column::GeographicAreaId.eq(area_id));
    }
    if let Some(is_verified) = filter.is_verified {
        query = query.filter(infrastructure_assets::Column::IsVerified.eq(is_verified));
    }
    if let Some(source) = filter.data_source {
        query = query.filter(infrastructure_assets::Column::DataSource.eq(source));
    }
    if let Some(term) = search_term(filter.search.as_deref()) {
        query = query.filter(any_icontains(ASSET_SEARCH, term));
    }
    if let Some(code) = &filter.country_code {
        query = query
            .join(
                JoinType::InnerJoin,
                infrastructure_assets::Relation::GeographicArea.def(),
            )
            .filter(geographic_areas::Column::CountryCode.eq(code.trim().to_ascii_uppercase()));
    }
    query
}

pub async fn list_assets<C: ConnectionTrait>(
    db: &C,
    filter: &AssetFilter,
    params: &PageParams,
    limits: &LimitsConfig,
) -> Result<Page<infrastructure_assets::Model>, AtlasError> {
    let query = match filter.ordering {
        Some(sort) => sort.apply(filtered(filter)),
        None => filtered(filter),
    };
    let query = query.order_by_desc(infrastructure_assets::Column::CreatedAt);
    fetch_page(db, query, params, limits).await
}

pub async fn assets_geojson<C: ConnectionTrait>(
    db: &C,
    filter: &AssetFilter,
) -> Result<FeatureCollection, AtlasError> {
    let assets = filtered(filter)
        .order_by_desc(infrastructure_assets::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(FeatureCollection::from_optional(assets.into_iter().map(
        |asset| {
            let point = GeoPoint::from_columns(Some(asset.longitude), Some(asset.latitude))?;
            Some(Feature::new(
                asset.id,
                point.to_geojson(),
                json!({
                    "id": asset.id,
                    "asset_type": asset.asset_type,
                    "asset_type_display": asset.asset_type.label(),
                    "official_name": asset.official_name,
                    "local_name": asset.local_name,
                    "condition": asset.condition,
                    "condition_display": asset.condition.label(),
                    "is_verified": asset.is_verified,
                }),
            ))
        },
    )))
}

#[derive(Debug, Serialize)]
pub struct AssetStats {
    pub total: u64,
    pub verified: u64,
    pub by_type: BTreeMap<String, i64>,
    pub by_condition: BTreeMap<String, i64>,
}

pub async fn asset_stats<C: ConnectionTrait>(
    db: &C,
    filter: &AssetFilter,
) -> Result<AssetStats, AtlasError> {
    let total = filtered(filter).count(db).await?;
    let verified = filtered(filter)
        .filter(infrastructure_assets::Column::IsVerified.eq(true))
        .count(db)
        .await?;
    let by_type = count_by(db, filtered(filter), infrastructure_assets::Column::AssetType).await?;
    let by_condition =
        count_by(db, filtered(filter), infrastructure_assets::Column::Condition).await?;

    Ok(AssetStats {
        total,
        verified,
        by_type,
        by_condition,
    })
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub value: String,
    pub label: &'static str,
}

/// Catalogue of asset types for pickers.
pub fn asset_types() -> Vec<Choice> {
    AssetType::iter()
        .map(|t| Choice {
            value: t.to_value(),
            label: t.label(),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct AssetView {
    pub id: Uuid,
    pub asset_type: AssetType,
    pub asset_type_display: &'static str,
    pub official_name: Option<String>,
    pub local_name: String,
    pub description: String,
    pub location: GeoPoint,
    pub geographic_area_id: Uuid,
    pub geographic_area_name: Option<String>,
    pub condition: AssetCondition,
    pub condition_display: &'static str,
    pub condition_verified_at: Option<NaiveDateTime>,
    pub official_id: String,
    pub is_verified: bool,
    pub is_active: bool,
    #[serde(flatten)]
    pub provenance: Provenance,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl AssetView {
    pub fn new(asset: infrastructure_assets::Model, area_name: Option<String>) -> Self {
        Self {
            id: asset.id,
            asset_type: asset.asset_type,
            asset_type_display: asset.asset_type.label(),
            official_name: asset.official_name,
            local_name: asset.local_name,
            description: asset.description,
            location: GeoPoint {
                longitude: asset.longitude,
                latitude: asset.latitude,
            },
            geographic_area_id: asset.geographic_area_id,
            geographic_area_name: area_name,
            condition: asset.condition,
            condition_display: asset.condition.label(),
            condition_verified_at: asset.condition_verified_at,
            official_id: asset.official_id,
            is_verified: asset.is_verified,
            is_active: asset.is_active,
            provenance: Provenance {
                data_source: asset.data_source,
                source_url: asset.source_url,
                source_notes: asset.source_notes,
            },
            created_at: asset.created_at,
            updated_at: asset.updated_at,
        }
    }
}

pub async fn asset_view<C: ConnectionTrait>(
    db: &C,
    asset: infrastructure_assets::Model,
) -> Result<AssetView, AtlasError> {
    let area_name = geographic_areas::Entity::find_by_id(asset.geographic_area_id)
        .one(db)
        .await?
        .map(|area| area.name);
    Ok(AssetView::new(asset, area_name))
}

/// Views for a batch of assets, resolving area names in one query.
pub async fn asset_views<C: ConnectionTrait>(
    db: &C,
    assets: Vec<infrastructure_assets::Model>,
) -> Result<Vec<AssetView>, AtlasError> {
    let mut area_ids: Vec<Uuid> = assets.iter().map(|a| a.geographic_area_id).collect();
    area_ids.sort();
    area_ids.dedup();

    let names: BTreeMap<Uuid, String> = if area_ids.is_empty() {
        BTreeMap::new()
    } else {
        geographic_areas::Entity::find()
            .filter(geographic_areas::Column::Id.is_in(area_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|area| (area.id, area.name))
            .collect()
    };

    Ok(assets
        .into_iter()
        .map(|asset| {
            let name = names.get(&asset.geographic_area_id).cloned();
            AssetView::new(asset, name)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_types_catalogue() {
        let types = asset_types();
        assert_eq!(types.len(), 12);
        assert!(types.contains(&Choice {
            value: "water_point".to_string(),
            label: "Water Point",
        }));
    }

    #[test]
    fn test_long_names_are_field_errors() {
        let mut errors = FieldErrors::new();
        let long = "x".repeat(256);
        check_lengths(&mut errors, &[("local_name", Some(long.as_str()), 255)]);
        assert!(errors.contains("local_name"));
    }
}
