//! SeaORM Entity for infrastructure_assets table

use super::DataSource;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of public infrastructure. Reports reuse this for their
/// `infrastructure_type` so an unknown asset can still be classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(30))")]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    #[sea_orm(string_value = "school")]
    School,
    #[sea_orm(string_value = "clinic")]
    Clinic,
    #[sea_orm(string_value = "hospital")]
    Hospital,
    #[sea_orm(string_value = "water_point")]
    WaterPoint,
    #[sea_orm(string_value = "borehole")]
    Borehole,
    #[sea_orm(string_value = "road")]
    Road,
    #[sea_orm(string_value = "bridge")]
    Bridge,
    #[sea_orm(string_value = "sanitation")]
    Sanitation,
    #[sea_orm(string_value = "electricity")]
    Electricity,
    #[sea_orm(string_value = "market")]
    Market,
    #[sea_orm(string_value = "government_office")]
    GovernmentOffice,
    #[sea_orm(string_value = "other")]
    Other,
}

impl AssetType {
    pub fn label(&self) -> &'static str {
        match self {
            AssetType::School => "School",
            AssetType::Clinic => "Health Clinic",
            AssetType::Hospital => "Hospital",
            AssetType::WaterPoint => "Water Point",
            AssetType::Borehole => "Borehole",
            AssetType::Road => "Road",
            AssetType::Bridge => "Bridge",
            AssetType::Sanitation => "Sanitation Facility",
            AssetType::Electricity => "Electricity Infrastructure",
            AssetType::Market => "Market",
            AssetType::GovernmentOffice => "Government Office",
            AssetType::Other => "Other",
        }
    }
}

/// Current condition of an asset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(30))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum AssetCondition {
    #[sea_orm(string_value = "functional")]
    Functional,
    #[sea_orm(string_value = "partially_functional")]
    PartiallyFunctional,
    #[sea_orm(string_value = "non_functional")]
    NonFunctional,
    #[sea_orm(string_value = "under_construction")]
    UnderConstruction,
    #[sea_orm(string_value = "abandoned")]
    Abandoned,
    #[sea_orm(string_value = "unknown")]
    #[default]
    Unknown,
}

impl AssetCondition {
    pub fn label(&self) -> &'static str {
        match self {
            AssetCondition::Functional => "Functional",
            AssetCondition::PartiallyFunctional => "Partially Functional",
            AssetCondition::NonFunctional => "Non-Functional",
            AssetCondition::UnderConstruction => "Under Construction",
            AssetCondition::Abandoned => "Abandoned",
            AssetCondition::Unknown => "Unknown",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "infrastructure_assets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub asset_type: AssetType,
    pub official_name: Option<String>,
    pub local_name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    /// WGS84 longitude of the asset location
    pub longitude: f64,
    /// WGS84 latitude of the asset location
    pub latitude: f64,
    #[sea_orm(indexed)]
    pub geographic_area_id: Uuid,
    #[sea_orm(indexed)]
    pub condition: AssetCondition,
    pub condition_verified_at: Option<DateTime>,
    pub official_id: String,
    pub is_verified: bool,
    pub is_active: bool,
    pub data_source: DataSource,
    pub source_url: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub source_notes: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::geographic_areas::Entity",
        from = "Column::GeographicAreaId",
        to = "super::geographic_areas::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    GeographicArea,
    #[sea_orm(has_many = "super::reports::Entity")]
    Reports,
}

impl Related<super::geographic_areas::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GeographicArea.def()
    }
}

impl Related<super::reports::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reports.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
