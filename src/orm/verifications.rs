//! SeaORM Entity for verifications table

use super::DataSource;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(30))")]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    #[sea_orm(string_value = "site_visit")]
    SiteVisit,
    #[sea_orm(string_value = "document")]
    Document,
    #[sea_orm(string_value = "photo")]
    Photo,
    #[sea_orm(string_value = "cross_reference")]
    CrossReference,
    #[sea_orm(string_value = "other")]
    Other,
}

impl VerificationMethod {
    pub fn label(&self) -> &'static str {
        match self {
            VerificationMethod::SiteVisit => "Site Visit",
            VerificationMethod::Document => "Document Review",
            VerificationMethod::Photo => "Photo Verification",
            VerificationMethod::CrossReference => "Cross-Reference with Official Data",
            VerificationMethod::Other => "Other",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "verifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub report_id: Uuid,
    /// Acting user; cleared if that user is removed upstream
    pub verified_by: Option<String>,
    pub verification_method: VerificationMethod,
    pub verified_at: DateTime,
    #[sea_orm(column_type = "Text")]
    pub verification_notes: String,
    pub is_confirmed: bool,
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
        belongs_to = "super::reports::Entity",
        from = "Column::ReportId",
        to = "super::reports::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Report,
}

impl Related<super::reports::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Report.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
