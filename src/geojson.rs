//! GeoJSON FeatureCollection rendering for map views.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    pub id: Uuid,
    pub geometry: Value,
    pub properties: Value,
}

impl Feature {
    pub fn new(id: Uuid, geometry: Value, properties: Value) -> Self {
        Self {
            kind: "Feature",
            id,
            geometry,
            properties,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    kind: &'static str,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Build a collection, skipping records that have no geometry.
    pub fn from_optional<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Option<Feature>>,
    {
        Self {
            kind: "FeatureCollection",
            features: items.into_iter().flatten().collect(),
        }
    }
}
