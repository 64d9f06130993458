//! Provenance source type shared by every table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Origin of a data entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum DataSource {
    #[sea_orm(string_value = "official")]
    Official,
    #[sea_orm(string_value = "ngo")]
    Ngo,
    #[sea_orm(string_value = "community")]
    #[default]
    Community,
    #[sea_orm(string_value = "research")]
    Research,
}

impl DataSource {
    pub fn label(&self) -> &'static str {
        match self {
            DataSource::Official => "Official Government Source",
            DataSource::Ngo => "NGO / Civil Society",
            DataSource::Community => "Community Reported",
            DataSource::Research => "Research / Academic",
        }
    }
}
