//! SeaORM Entity for evidence table
//!
//! Exactly one of `file_key` and `url` is set. `file_hash` and
//! `file_size_bytes` are written once, when a file is first persisted.

use super::DataSource;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    #[sea_orm(string_value = "photo")]
    Photo,
    #[sea_orm(string_value = "video")]
    Video,
    #[sea_orm(string_value = "document")]
    Document,
    #[sea_orm(string_value = "audio")]
    Audio,
    #[sea_orm(string_value = "link")]
    Link,
}

impl EvidenceType {
    pub fn label(&self) -> &'static str {
        match self {
            EvidenceType::Photo => "Photo",
            EvidenceType::Video => "Video",
            EvidenceType::Document => "Document",
            EvidenceType::Audio => "Audio Recording",
            EvidenceType::Link => "External Link",
        }
    }
}

/// How the evidence was captured
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
#[serde(rename_all = "snake_case")]
pub enum SourceDevice {
    #[sea_orm(string_value = "camera")]
    Camera,
    #[sea_orm(string_value = "upload")]
    Upload,
    #[sea_orm(string_value = "screenshot")]
    Screenshot,
    #[sea_orm(string_value = "other")]
    Other,
}

impl SourceDevice {
    pub fn label(&self) -> &'static str {
        match self {
            SourceDevice::Camera => "Camera/Phone",
            SourceDevice::Upload => "File Upload",
            SourceDevice::Screenshot => "Screenshot",
            SourceDevice::Other => "Other",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "evidence")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub report_id: Uuid,
    pub evidence_type: EvidenceType,
    /// Storage key of the uploaded file
    pub file_key: Option<String>,
    /// Name of the file as uploaded by the client
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub url: Option<String>,
    /// Hex SHA-256 of the file as first persisted
    pub file_hash: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub captured_at: Option<DateTime>,
    pub uploaded_at: DateTime,
    pub source_device: Option<SourceDevice>,
    #[sea_orm(column_type = "Text")]
    pub description: String,
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
