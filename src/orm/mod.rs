//! SeaORM entities for the atlas tables.
//!
//! Every enum column is a closed set stored as a short string. The helpers
//! below parse user input into those enums with field-addressable errors.

pub mod data_source;
pub mod evidence;
pub mod geographic_areas;
pub mod infrastructure_assets;
pub mod reports;
pub mod verifications;

pub use data_source::DataSource;

use crate::error::{AtlasError, FieldErrors};
use sea_orm::{ActiveEnum, Iterable};

/// Parse a case-insensitive choice value into one of the closed enums.
pub fn parse_choice<E>(field: &str, raw: &str) -> Result<E, AtlasError>
where
    E: ActiveEnum<Value = String> + Iterable,
{
    let normalized = raw.trim().to_ascii_lowercase();
    E::try_from_value(&normalized).map_err(|_| {
        let choices: Vec<String> = E::iter().map(|v| v.to_value()).collect();
        AtlasError::Validation(FieldErrors::single(
            field,
            format!(
                "\"{}\" is not a valid choice. Expected one of: {}",
                raw,
                choices.join(", ")
            ),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::infrastructure_assets::AssetType;

    #[test]
    fn test_parse_choice_is_case_insensitive() {
        let parsed: AssetType = parse_choice("asset_type", "Water_Point").unwrap();
        assert_eq!(parsed, AssetType::WaterPoint);
    }

    #[test]
    fn test_parse_choice_rejects_unknown_value() {
        let err = parse_choice::<AssetType>("asset_type", "castle").unwrap_err();
        match err {
            AtlasError::Validation(fields) => {
                let messages = fields.get("asset_type").unwrap();
                assert!(messages[0].contains("castle"));
                assert!(messages[0].contains("water_point"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
