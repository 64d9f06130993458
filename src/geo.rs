//! WGS84 geometry values.
//!
//! Points travel as GeoJSON `Point` objects and are stored as separate
//! longitude/latitude columns. Area boundaries travel and are stored as
//! GeoJSON `MultiPolygon` text; a bare `Polygon` is promoted on input.

use crate::error::AtlasError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Spatial reference of every stored coordinate.
pub const SRID: i32 = 4326;

/// A WGS84 point, `[longitude, latitude]` on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PointGeometry", into = "PointGeometry")]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, String> {
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(format!(
                "Longitude {} is outside the range -180 to 180.",
                longitude
            ));
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(format!(
                "Latitude {} is outside the range -90 to 90.",
                latitude
            ));
        }
        Ok(Self {
            longitude,
            latitude,
        })
    }

    /// Rebuild a point from stored columns; both must be present.
    pub fn from_columns(longitude: Option<f64>, latitude: Option<f64>) -> Option<Self> {
        match (longitude, latitude) {
            (Some(longitude), Some(latitude)) => Some(Self {
                longitude,
                latitude,
            }),
            _ => None,
        }
    }

    pub fn to_geojson(&self) -> Value {
        json!({
            "type": "Point",
            "coordinates": [self.longitude, self.latitude],
        })
    }
}

/// Wire shape of a GeoJSON point.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct PointGeometry {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Vec<f64>,
}

impl TryFrom<PointGeometry> for GeoPoint {
    type Error = String;

    fn try_from(geometry: PointGeometry) -> Result<Self, Self::Error> {
        if geometry.kind != "Point" {
            return Err(format!("Expected a Point geometry, got {}.", geometry.kind));
        }
        match geometry.coordinates.as_slice() {
            [longitude, latitude] => GeoPoint::new(*longitude, *latitude),
            _ => Err("Point coordinates must be [longitude, latitude].".to_string()),
        }
    }
}

impl From<GeoPoint> for PointGeometry {
    fn from(point: GeoPoint) -> Self {
        PointGeometry {
            kind: "Point".to_string(),
            coordinates: vec![point.longitude, point.latitude],
        }
    }
}

/// Validate a GeoJSON boundary and return it as MultiPolygon text.
///
/// Each ring must be closed, hold at least four positions and stay inside
/// the WGS84 coordinate range.
pub fn normalize_boundary(field: &str, value: &Value) -> Result<String, AtlasError> {
    let invalid = |message: String| AtlasError::validation(field, message);

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("Boundary must be a GeoJSON geometry object.".to_string()))?;
    let coordinates = value
        .get("coordinates")
        .ok_or_else(|| invalid("Boundary has no coordinates.".to_string()))?;

    let polygons = match kind {
        "MultiPolygon" => coordinates.clone(),
        "Polygon" => Value::Array(vec![coordinates.clone()]),
        other => {
            return Err(invalid(format!(
                "Boundary must be a Polygon or MultiPolygon, got {}.",
                other
            )))
        }
    };

    let polygon_list = polygons
        .as_array()
        .filter(|list| !list.is_empty())
        .ok_or_else(|| invalid("MultiPolygon must contain at least one polygon.".to_string()))?;

    for polygon in polygon_list {
        let rings = polygon
            .as_array()
            .filter(|rings| !rings.is_empty())
            .ok_or_else(|| invalid("Each polygon must contain at least one ring.".to_string()))?;
        for ring in rings {
            check_ring(ring).map_err(invalid)?;
        }
    }

    let normalized = json!({
        "type": "MultiPolygon",
        "coordinates": polygons,
    });
    Ok(normalized.to_string())
}

fn check_ring(ring: &Value) -> Result<(), String> {
    let positions = ring
        .as_array()
        .ok_or_else(|| "Each ring must be an array of positions.".to_string())?;
    if positions.len() < 4 {
        return Err("Each ring must have at least four positions.".to_string());
    }

    let mut parsed = Vec::with_capacity(positions.len());
    for position in positions {
        let pair = position
            .as_array()
            .filter(|p| p.len() >= 2)
            .ok_or_else(|| "Each position must be [longitude, latitude].".to_string())?;
        let longitude = pair[0]
            .as_f64()
            .ok_or_else(|| "Coordinates must be numbers.".to_string())?;
        let latitude = pair[1]
            .as_f64()
            .ok_or_else(|| "Coordinates must be numbers.".to_string())?;
        GeoPoint::new(longitude, latitude)?;
        parsed.push((longitude, latitude));
    }

    if parsed.first() != parsed.last() {
        return Err("Each ring must be closed (first and last positions equal).".to_string());
    }
    Ok(())
}

/// Parse stored boundary text back into a GeoJSON value.
pub fn boundary_geojson(stored: Option<&str>) -> Option<Value> {
    stored.and_then(|text| serde_json::from_str(text).ok())
}
