//! SeaORM Entity for geographic_areas table
//!
//! Areas form a tree through `parent_id`. A parent cannot be removed while it
//! still has children or anchored assets.

use super::DataSource;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Administrative level of an area.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
#[serde(rename_all = "snake_case")]
pub enum AdminLevel {
    #[sea_orm(string_value = "country")]
    Country,
    #[sea_orm(string_value = "state")]
    State,
    #[sea_orm(string_value = "province")]
    Province,
    #[sea_orm(string_value = "district")]
    District,
    #[sea_orm(string_value = "county")]
    County,
    #[sea_orm(string_value = "lga")]
    Lga,
    #[sea_orm(string_value = "ward")]
    Ward,
    #[sea_orm(string_value = "village")]
    Village,
}

impl AdminLevel {
    pub fn label(&self) -> &'static str {
        match self {
            AdminLevel::Country => "Country",
            AdminLevel::State => "State / Region",
            AdminLevel::Province => "Province",
            AdminLevel::District => "District",
            AdminLevel::County => "County",
            AdminLevel::Lga => "Local Government Area",
            AdminLevel::Ward => "Ward",
            AdminLevel::Village => "Village / Settlement",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "geographic_areas")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    /// ISO 3166-1 alpha-3 (or alpha-2) code, upper-case
    #[sea_orm(indexed)]
    pub country_code: String,
    #[sea_orm(indexed)]
    pub admin_level: AdminLevel,
    #[sea_orm(nullable, indexed)]
    pub parent_id: Option<Uuid>,
    /// Boundary as a GeoJSON MultiPolygon in WGS84
    #[sea_orm(column_type = "Text", nullable)]
    pub boundary: Option<String>,
    pub centroid_longitude: Option<f64>,
    pub centroid_latitude: Option<f64>,
    pub population: Option<i64>,
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
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Parent,
    #[sea_orm(has_many = "super::infrastructure_assets::Entity")]
    Assets,
}

impl Related<super::infrastructure_assets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
