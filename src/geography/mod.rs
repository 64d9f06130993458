//! Geography Store: the administrative area hierarchy.
//!
//! Areas form an arena-style tree through `parent_id`. Paths are computed by
//! bounded upward walks, and acyclicity is checked whenever a parent is set.

use crate::error::{AtlasError, FieldErrors, NON_FIELD_ERRORS};
use crate::geo::{self, GeoPoint};
use crate::geojson::{Feature, FeatureCollection};
use crate::orm::geographic_areas::{self, AdminLevel};
use crate::orm::infrastructure_assets;
use crate::pagination::{fetch_page, Page, PageParams};
use crate::app_config::LimitsConfig;
use crate::provenance::{Provenance, ProvenanceChanges};
use crate::search::{icontains, search_term, Sort};
use chrono::{NaiveDateTime, Utc};
use sea_orm::entity::*;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbErr, PaginatorTrait, QueryFilter, QueryOrder, Select,
    SqlErr, TransactionTrait,
};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

/// Upper bound on hierarchy depth walked when computing paths or checking cycles.
pub const MAX_DEPTH: usize = 32;

pub const PATH_SEPARATOR: &str = " > ";

#[derive(Clone, Debug)]
pub struct NewArea {
    pub name: String,
    pub country_code: String,
    pub admin_level: AdminLevel,
    pub parent_id: Option<Uuid>,
    /// GeoJSON Polygon or MultiPolygon
    pub boundary: Option<Value>,
    pub centroid: Option<GeoPoint>,
    pub population: Option<i64>,
    pub is_active: bool,
    pub provenance: Provenance,
}

/// Partial update. Outer `None` leaves a field untouched; `Some(None)` clears it.
#[derive(Clone, Debug, Default)]
pub struct AreaChanges {
    pub name: Option<String>,
    pub country_code: Option<String>,
    pub admin_level: Option<AdminLevel>,
    pub parent_id: Option<Option<Uuid>>,
    pub boundary: Option<Option<Value>>,
    pub centroid: Option<Option<GeoPoint>>,
    pub population: Option<Option<i64>>,
    pub is_active: Option<bool>,
    pub provenance: ProvenanceChanges,
}

#[derive(Clone, Debug, Default)]
pub struct AreaFilter {
    pub country_code: Option<String>,
    pub admin_level: Option<AdminLevel>,
    pub parent_id: Option<Uuid>,
    /// `None` lists active areas only.
    pub is_active: Option<bool>,
    /// Case-insensitive substring of the name
    pub search: Option<String>,
    /// Replaces the default country, level, name ordering.
    pub ordering: Option<Sort<geographic_areas::Column>>,
}

/// Fields a client may order the area list by.
pub const AREA_ORDERING: &[(&str, geographic_areas::Column)] = &[
    ("name", geographic_areas::Column::Name),
    ("admin_level", geographic_areas::Column::AdminLevel),
    ("created_at", geographic_areas::Column::CreatedAt),
];

/// Upper-case a country code and check it is 2-3 ASCII letters.
pub fn normalize_country_code(raw: &str) -> Result<String, String> {
    let code = raw.trim().to_ascii_uppercase();
    if (2..=3).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(format!(
            "\"{}\" is not a valid country code. Use 2 or 3 letters (ISO 3166-1).",
            raw
        ))
    }
}

fn check_name(errors: &mut FieldErrors, name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        errors.add("name", "This field may not be blank.");
    } else if name.chars().count() > 255 {
        errors.add("name", "Ensure this field has no more than 255 characters.");
    }
    name.to_string()
}

fn check_country(errors: &mut FieldErrors, raw: &str) -> String {
    match normalize_country_code(raw) {
        Ok(code) => code,
        Err(message) => {
            errors.add("country_code", message);
            raw.to_string()
        }
    }
}

fn check_population(errors: &mut FieldErrors, population: Option<i64>) {
    if matches!(population, Some(p) if p < 0) {
        errors.add("population", "Ensure this value is greater than or equal to 0.");
    }
}

fn check_boundary(errors: &mut FieldErrors, boundary: Option<&Value>) -> Option<String> {
    let value = boundary?;
    match geo::normalize_boundary("boundary", value) {
        Ok(text) => Some(text),
        Err(AtlasError::Validation(fields)) => {
            errors.extend(fields);
            None
        }
        Err(other) => {
            errors.add("boundary", other.to_string());
            None
        }
    }
}

pub async fn get_area<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<geographic_areas::Model, AtlasError> {
    geographic_areas::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AtlasError::not_found("geographic area", id))
}

/// Whether an area with this id exists and is active.
pub async fn exists_and_active<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<bool, AtlasError> {
    let count = geographic_areas::Entity::find()
        .filter(geographic_areas::Column::Id.eq(id))
        .filter(geographic_areas::Column::IsActive.eq(true))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Fails when `candidate_parent` is `area_id` itself or one of its descendants.
async fn check_acyclic<C: ConnectionTrait>(
    db: &C,
    area_id: Option<Uuid>,
    candidate_parent: Uuid,
) -> Result<(), AtlasError> {
    let mut cursor = Some(candidate_parent);
    let mut depth = 0;

    while let Some(current) = cursor {
        if Some(current) == area_id {
            return Err(AtlasError::validation(
                "parent_id",
                "An area cannot be its own ancestor.",
            ));
        }
        depth += 1;
        if depth > MAX_DEPTH {
            return Err(AtlasError::validation(
                "parent_id",
                format!("Area hierarchy is deeper than {} levels.", MAX_DEPTH),
            ));
        }
        cursor = match geographic_areas::Entity::find_by_id(current).one(db).await? {
            Some(area) => area.parent_id,
            None if current == candidate_parent => {
                return Err(AtlasError::validation(
                    "parent_id",
                    format!("Geographic area {} does not exist.", candidate_parent),
                ))
            }
            None => None,
        };
    }
    Ok(())
}

/// Fails when another area already has this (name, country, level, parent).
async fn check_unique<C: ConnectionTrait>(
    db: &C,
    exclude: Option<Uuid>,
    name: &str,
    country_code: &str,
    admin_level: AdminLevel,
    parent_id: Option<Uuid>,
) -> Result<(), AtlasError> {
    let mut query = geographic_areas::Entity::find()
        .filter(geographic_areas::Column::Name.eq(name))
        .filter(geographic_areas::Column::CountryCode.eq(country_code))
        .filter(geographic_areas::Column::AdminLevel.eq(admin_level));
    query = match parent_id {
        Some(parent) => query.filter(geographic_areas::Column::ParentId.eq(parent)),
        None => query.filter(geographic_areas::Column::ParentId.is_null()),
    };
    if let Some(id) = exclude {
        query = query.filter(geographic_areas::Column::Id.ne(id));
    }

    if query.count(db).await? > 0 {
        return Err(duplicate_area());
    }
    Ok(())
}

fn duplicate_area() -> AtlasError {
    AtlasError::validation(
        NON_FIELD_ERRORS,
        "An area with this name, country code, admin level and parent already exists.",
    )
}

/// Map a write that tripped the scope unique index to the same field error
/// the up-front check reports.
fn map_unique_violation(err: DbErr) -> AtlasError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => duplicate_area(),
        _ => err.into(),
    }
}

pub async fn create_area(
    db: &DatabaseConnection,
    input: NewArea,
) -> Result<geographic_areas::Model, AtlasError> {
    let mut errors = FieldErrors::new();
    let name = check_name(&mut errors, &input.name);
    let country_code = check_country(&mut errors, &input.country_code);
    check_population(&mut errors, input.population);
    let boundary = check_boundary(&mut errors, input.boundary.as_ref());
    if let Err(e) = input.provenance.validate() {
        errors.extend(e.into());
    }
    errors.into_result()?;

    // Dropping `txn` on an early return rolls it back.
    let txn = db.begin().await?;
    if let Some(parent_id) = input.parent_id {
        check_acyclic(&txn, None, parent_id).await?;
    }
    check_unique(
        &txn,
        None,
        &name,
        &country_code,
        input.admin_level,
        input.parent_id,
    )
    .await?;

    let now = Utc::now().naive_utc();
    let area = geographic_areas::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        country_code: Set(country_code),
        admin_level: Set(input.admin_level),
        parent_id: Set(input.parent_id),
        boundary: Set(boundary),
        centroid_longitude: Set(input.centroid.map(|c| c.longitude)),
        centroid_latitude: Set(input.centroid.map(|c| c.latitude)),
        population: Set(input.population),
        is_active: Set(input.is_active),
        data_source: Set(input.provenance.data_source),
        source_url: Set(input.provenance.source_url),
        source_notes: Set(input.provenance.source_notes),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await
    .map_err(map_unique_violation)?;
    txn.commit().await?;

    log::info!("Created geographic area {} ({})", area.id, area.name);
    Ok(area)
}

pub async fn update_area(
    db: &DatabaseConnection,
    id: Uuid,
    changes: AreaChanges,
) -> Result<geographic_areas::Model, AtlasError> {
    let txn = db.begin().await?;
    let existing = get_area(&txn, id).await?;

    let mut errors = FieldErrors::new();
    let name = match &changes.name {
        Some(name) => check_name(&mut errors, name),
        None => existing.name.clone(),
    };
    let country_code = match &changes.country_code {
        Some(code) => check_country(&mut errors, code),
        None => existing.country_code.clone(),
    };
    if let Some(population) = changes.population {
        check_population(&mut errors, population);
    }
    let boundary = match &changes.boundary {
        Some(Some(value)) => Some(check_boundary(&mut errors, Some(value))),
        Some(None) => Some(None),
        None => None,
    };
    if let Err(e) = changes.provenance.validate() {
        errors.extend(e.into());
    }
    errors.into_result()?;

    let admin_level = changes.admin_level.unwrap_or(existing.admin_level);
    let parent_id = changes.parent_id.unwrap_or(existing.parent_id);

    if let Some(Some(new_parent)) = changes.parent_id {
        check_acyclic(&txn, Some(id), new_parent).await?;
    }
    check_unique(&txn, Some(id), &name, &country_code, admin_level, parent_id).await?;

    let mut area: geographic_areas::ActiveModel = existing.into();
    area.name = Set(name);
    area.country_code = Set(country_code);
    area.admin_level = Set(admin_level);
    area.parent_id = Set(parent_id);
    if let Some(boundary) = boundary {
        area.boundary = Set(boundary);
    }
    if let Some(centroid) = changes.centroid {
        area.centroid_longitude = Set(centroid.map(|c| c.longitude));
        area.centroid_latitude = Set(centroid.map(|c| c.latitude));
    }
    if let Some(population) = changes.population {
        area.population = Set(population);
    }
    if let Some(is_active) = changes.is_active {
        area.is_active = Set(is_active);
    }
    apply_provenance(&mut area, changes.provenance);
    area.updated_at = Set(Utc::now().naive_utc());

    let area = area.update(&txn).await.map_err(map_unique_violation)?;
    txn.commit().await?;
    Ok(area)
}

fn apply_provenance(area: &mut geographic_areas::ActiveModel, changes: ProvenanceChanges) {
    if let Some(source) = changes.data_source {
        area.data_source = Set(source);
    }
    if changes.source_url.is_some() || changes.clear_source_url {
        area.source_url = Set(changes.source_url);
    }
    if let Some(notes) = changes.source_notes {
        area.source_notes = Set(notes);
    }
}

/// Mark an area inactive. Its children and assets are left as they are.
pub async fn deactivate_area<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<geographic_areas::Model, AtlasError> {
    let mut area: geographic_areas::ActiveModel = get_area(db, id).await?.into();
    area.is_active = Set(false);
    area.updated_at = Set(Utc::now().naive_utc());
    let area = area.update(db).await?;
    log::info!("Deactivated geographic area {}", id);
    Ok(area)
}

/// Hard-delete an area that nothing references.
pub async fn delete_area(db: &DatabaseConnection, id: Uuid) -> Result<(), AtlasError> {
    let txn = db.begin().await?;

    get_area(&txn, id).await?;

    let children = geographic_areas::Entity::find()
        .filter(geographic_areas::Column::ParentId.eq(id))
        .count(&txn)
        .await?;
    let assets = infrastructure_assets::Entity::find()
        .filter(infrastructure_assets::Column::GeographicAreaId.eq(id))
        .count(&txn)
        .await?;

    if children > 0 || assets > 0 {
        let mut dependents = Vec::new();
        if children > 0 {
            dependents.push(plural(children, "child area", "child areas"));
        }
        if assets > 0 {
            dependents.push(plural(assets, "asset", "assets"));
        }
        let err = AtlasError::ReferentialIntegrityViolation {
            entity: "geographic area",
            id,
            dependents: dependents.join(" and "),
        };
        log::warn!("{}", err);
        txn.rollback().await?;
        return Err(err);
    }

    geographic_areas::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;
    log::info!("Deleted geographic area {}", id);
    Ok(())
}

pub(crate) fn plural(count: u64, one: &str, many: &str) -> String {
    if count == 1 {
        format!("1 {}", one)
    } else {
        format!("{} {}", count, many)
    }
}

/// Names from the root down to `area`, joined with " > ".
pub async fn full_path<C: ConnectionTrait>(
    db: &C,
    area: &geographic_areas::Model,
) -> Result<String, AtlasError> {
    let mut parts = vec![area.name.clone()];
    let mut cursor = area.parent_id;

    while let Some(parent_id) = cursor {
        if parts.len() > MAX_DEPTH {
            log::warn!("Area {} exceeds the hierarchy depth limit", area.id);
            break;
        }
        match geographic_areas::Entity::find_by_id(parent_id).one(db).await? {
            Some(parent) => {
                parts.push(parent.name);
                cursor = parent.parent_id;
            }
            None => break,
        }
    }

    parts.reverse();
    Ok(parts.join(PATH_SEPARATOR))
}

/// Active direct children of an area.
pub async fn children<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<Vec<geographic_areas::Model>, AtlasError> {
    get_area(db, id).await?;
    Ok(geographic_areas::Entity::find()
        .filter(geographic_areas::Column::ParentId.eq(id))
        .filter(geographic_areas::Column::IsActive.eq(true))
        .order_by_asc(geographic_areas::Column::Name)
        .all(db)
        .await?)
}

/// Active country-level areas.
pub async fn countries<C: ConnectionTrait>(
    db: &C,
) -> Result<Vec<geographic_areas::Model>, AtlasError> {
    Ok(geographic_areas::Entity::find()
        .filter(geographic_areas::Column::AdminLevel.eq(AdminLevel::Country))
        .filter(geographic_areas::Column::IsActive.eq(true))
        .order_by_asc(geographic_areas::Column::CountryCode)
        .order_by_asc(geographic_areas::Column::Name)
        .all(db)
        .await?)
}

fn filtered(filter: &AreaFilter) -> Select<geographic_areas::Entity> {
    let mut query = geographic_areas::Entity::find()
        .filter(geographic_areas::Column::IsActive.eq(filter.is_active.unwrap_or(true)));

    if let Some(code) = &filter.country_code {
        query = query.filter(
            geographic_areas::Column::CountryCode.eq(code.trim().to_ascii_uppercase()),
        );
    }
    if let Some(level) = filter.admin_level {
        query = query.filter(geographic_areas::Column::AdminLevel.eq(level));
    }
    if let Some(parent_id) = filter.parent_id {
        query = query.filter(geographic_areas::Column::ParentId.eq(parent_id));
    }
    if let Some(term) = search_term(filter.search.as_deref()) {
        query = query.filter(icontains(geographic_areas::Column::Name, term));
    }

    query
}

fn ordered(
    query: Select<geographic_areas::Entity>,
    sort: Option<Sort<geographic_areas::Column>>,
) -> Select<geographic_areas::Entity> {
    let query = match sort {
        Some(sort) => sort.apply(query),
        None => query,
    };
    query
        .order_by_asc(geographic_areas::Column::CountryCode)
        .order_by_asc(geographic_areas::Column::AdminLevel)
        .order_by_asc(geographic_areas::Column::Name)
}

pub async fn list_areas<C: ConnectionTrait>(
    db: &C,
    filter: &AreaFilter,
    params: &PageParams,
    limits: &LimitsConfig,
) -> Result<Page<geographic_areas::Model>, AtlasError> {
    fetch_page(db, ordered(filtered(filter), filter.ordering), params, limits).await
}

/// Matching areas that have a boundary, as a FeatureCollection.
pub async fn areas_geojson<C: ConnectionTrait>(
    db: &C,
    filter: &AreaFilter,
) -> Result<FeatureCollection, AtlasError> {
    let areas = ordered(filtered(filter), filter.ordering)
        .filter(geographic_areas::Column::Boundary.is_not_null())
        .all(db)
        .await?;

    let mut features = Vec::with_capacity(areas.len());
    for area in areas {
        let path = full_path(db, &area).await?;
        features.push(geo::boundary_geojson(area.boundary.as_deref()).map(|geometry| {
            Feature::new(
                area.id,
                geometry,
                json!({
                    "id": area.id,
                    "name": area.name,
                    "country_code": area.country_code,
                    "admin_level": area.admin_level,
                    "full_path": path,
                    "population": area.population,
                    "is_active": area.is_active,
                }),
            )
        }));
    }
    Ok(FeatureCollection::from_optional(features))
}

/// Compact area entry for lists and dropdowns.
#[derive(Debug, Serialize)]
pub struct AreaSummary {
    pub id: Uuid,
    pub name: String,
    pub country_code: String,
    pub admin_level: AdminLevel,
    pub admin_level_display: &'static str,
}

impl From<geographic_areas::Model> for AreaSummary {
    fn from(area: geographic_areas::Model) -> Self {
        Self {
            id: area.id,
            name: area.name,
            country_code: area.country_code,
            admin_level: area.admin_level,
            admin_level_display: area.admin_level.label(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AreaView {
    pub id: Uuid,
    pub name: String,
    pub country_code: String,
    pub admin_level: AdminLevel,
    pub admin_level_display: &'static str,
    pub parent_id: Option<Uuid>,
    pub parent_name: Option<String>,
    pub full_path: String,
    pub boundary: Option<Value>,
    pub centroid: Option<GeoPoint>,
    pub population: Option<i64>,
    pub is_active: bool,
    #[serde(flatten)]
    pub provenance: Provenance,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Full view of an area including its parent name and path.
pub async fn area_view<C: ConnectionTrait>(
    db: &C,
    area: geographic_areas::Model,
) -> Result<AreaView, AtlasError> {
    let parent_name = match area.parent_id {
        Some(parent_id) => geographic_areas::Entity::find_by_id(parent_id)
            .one(db)
            .await?
            .map(|p| p.name),
        None => None,
    };
    let full_path = full_path(db, &area).await?;

    Ok(AreaView {
        id: area.id,
        admin_level_display: area.admin_level.label(),
        centroid: GeoPoint::from_columns(area.centroid_longitude, area.centroid_latitude),
        boundary: geo::boundary_geojson(area.boundary.as_deref()),
        name: area.name,
        country_code: area.country_code,
        admin_level: area.admin_level,
        parent_id: area.parent_id,
        parent_name,
        full_path,
        population: area.population,
        is_active: area.is_active,
        provenance: Provenance {
            data_source: area.data_source,
            source_url: area.source_url,
            source_notes: area.source_notes,
        },
        created_at: area.created_at,
        updated_at: area.updated_at,
    })
}
