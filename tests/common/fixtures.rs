//! Test fixtures for creating test data
#![allow(dead_code)]

use atlas::assets::{self, NewAsset};
use atlas::error::AtlasError;
use atlas::geo::GeoPoint;
use atlas::geography::{self, NewArea};
use atlas::orm::geographic_areas::{self, AdminLevel};
use atlas::orm::infrastructure_assets::{self, AssetCondition, AssetType};
use atlas::orm::reports::{self as report_rows, ReportedStatus, ReporterType};
use atlas::provenance::Provenance;
use atlas::reports::{self, NewReport};
use atlas::storage::local::LocalStorage;
use sea_orm::DatabaseConnection;
use tempfile::TempDir;
use uuid::Uuid;

pub fn point(longitude: f64, latitude: f64) -> GeoPoint {
    GeoPoint::new(longitude, latitude).expect("valid test coordinates")
}

pub fn new_area(name: &str, admin_level: AdminLevel, parent_id: Option<Uuid>) -> NewArea {
    NewArea {
        name: name.to_string(),
        country_code: "NG".to_string(),
        admin_level,
        parent_id,
        boundary: None,
        centroid: None,
        population: None,
        is_active: true,
        provenance: Provenance::default(),
    }
}

pub async fn create_test_area(
    db: &DatabaseConnection,
    name: &str,
    admin_level: AdminLevel,
    parent_id: Option<Uuid>,
) -> Result<geographic_areas::Model, AtlasError> {
    geography::create_area(db, new_area(name, admin_level, parent_id)).await
}

/// Nigeria > Lagos > Ikeja, returned leaf first.
pub async fn create_test_hierarchy(
    db: &DatabaseConnection,
) -> Result<(geographic_areas::Model, geographic_areas::Model, geographic_areas::Model), AtlasError>
{
    let country = create_test_area(db, "Nigeria", AdminLevel::Country, None).await?;
    let state = create_test_area(db, "Lagos", AdminLevel::State, Some(country.id)).await?;
    let lga = create_test_area(db, "Ikeja", AdminLevel::Lga, Some(state.id)).await?;
    Ok((lga, state, country))
}

pub fn new_asset(area_id: Uuid, asset_type: AssetType, local_name: &str) -> NewAsset {
    NewAsset {
        asset_type,
        official_name: None,
        local_name: local_name.to_string(),
        description: String::new(),
        location: point(3.35, 6.6),
        geographic_area_id: area_id,
        condition: AssetCondition::Unknown,
        condition_verified_at: None,
        official_id: String::new(),
        is_verified: false,
        provenance: Provenance::default(),
    }
}

pub async fn create_test_asset(
    db: &DatabaseConnection,
    area_id: Uuid,
    asset_type: AssetType,
    local_name: &str,
) -> Result<infrastructure_assets::Model, AtlasError> {
    assets::create_asset(db, new_asset(area_id, asset_type, local_name)).await
}

pub fn new_report(asset_id: Option<Uuid>) -> NewReport {
    NewReport {
        infrastructure_asset_id: asset_id,
        infrastructure_type: AssetType::WaterPoint,
        reported_status: ReportedStatus::Broken,
        description: "Pump handle snapped".to_string(),
        location: point(3.35, 6.6),
        location_accuracy_meters: Some(15),
        reporter_type: ReporterType::Citizen,
        is_anonymous: false,
        reporter: Some("amina".to_string()),
        provenance: Provenance::default(),
    }
}

pub async fn create_test_report(
    db: &DatabaseConnection,
    asset_id: Option<Uuid>,
) -> Result<report_rows::Model, AtlasError> {
    reports::create_report(db, new_report(asset_id)).await
}

/// Evidence storage rooted in a temporary directory that lives as long as
/// the returned guard.
pub fn test_storage() -> (TempDir, LocalStorage) {
    let dir = TempDir::new().expect("temp dir");
    let storage = LocalStorage::new(dir.path().join("uploads")).expect("local storage");
    (dir, storage)
}
