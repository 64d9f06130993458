//! SeaORM Entity for reports table

use super::infrastructure_assets::AssetType;
use super::DataSource;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status of the infrastructure as observed by the reporter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(30))")]
#[serde(rename_all = "snake_case")]
pub enum ReportedStatus {
    #[sea_orm(string_value = "working")]
    Working,
    #[sea_orm(string_value = "partially_working")]
    PartiallyWorking,
    #[sea_orm(string_value = "broken")]
    Broken,
    #[sea_orm(string_value = "inaccessible")]
    Inaccessible,
    #[sea_orm(string_value = "unknown")]
    Unknown,
}

impl ReportedStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReportedStatus::Working => "Working",
            ReportedStatus::PartiallyWorking => "Partially Working",
            ReportedStatus::Broken => "Broken",
            ReportedStatus::Inaccessible => "Inaccessible",
            ReportedStatus::Unknown => "Unknown",
        }
    }
}

/// Who submitted a report
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(30))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ReporterType {
    #[sea_orm(string_value = "citizen")]
    #[default]
    Citizen,
    #[sea_orm(string_value = "government_official")]
    GovernmentOfficial,
    #[sea_orm(string_value = "ngo")]
    Ngo,
}

impl ReporterType {
    pub fn label(&self) -> &'static str {
        match self {
            ReporterType::Citizen => "Citizen",
            ReporterType::GovernmentOfficial => "Government Official",
            ReporterType::Ngo => "NGO Representative",
        }
    }
}

/// Moderation workflow state. Transitions live in `crate::reports::workflow`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ReportState {
    #[sea_orm(string_value = "submitted")]
    #[default]
    Submitted,
    #[sea_orm(string_value = "under_review")]
    UnderReview,
    #[sea_orm(string_value = "verified")]
    Verified,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "resolved")]
    Resolved,
}

impl ReportState {
    pub fn label(&self) -> &'static str {
        match self {
            ReportState::Submitted => "Submitted",
            ReportState::UnderReview => "Under Review",
            ReportState::Verified => "Verified",
            ReportState::Rejected => "Rejected",
            ReportState::Resolved => "Resolved",
        }
    }
}

impl std::fmt::Display for ReportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_value())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "reports")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Linked asset, if the reporter identified one
    #[sea_orm(nullable, indexed)]
    pub infrastructure_asset_id: Option<Uuid>,
    #[sea_orm(indexed)]
    pub infrastructure_type: AssetType,
    #[sea_orm(indexed)]
    pub reported_status: ReportedStatus,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub longitude: f64,
    pub latitude: f64,
    pub location_accuracy_meters: Option<i32>,
    pub reporter_type: ReporterType,
    /// Identity of the submitting user; always empty for anonymous reports
    pub reporter: Option<String>,
    pub is_anonymous: bool,
    #[sea_orm(indexed)]
    pub current_state: ReportState,
    #[sea_orm(column_type = "Text", nullable)]
    pub rejection_reason: Option<String>,
    pub last_activity_at: DateTime,
    pub data_source: DataSource,
    pub source_url: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub source_notes: String,
    #[sea_orm(indexed)]
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::infrastructure_assets::Entity",
        from = "Column::InfrastructureAssetId",
        to = "super::infrastructure_assets::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    InfrastructureAsset,
    #[sea_orm(has_many = "super::evidence::Entity")]
    Evidence,
    #[sea_orm(has_many = "super::verifications::Entity")]
    Verifications,
}

impl Related<super::infrastructure_assets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InfrastructureAsset.def()
    }
}

impl Related<super::evidence::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Evidence.def()
    }
}

impl Related<super::verifications::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Verifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
