//! Bounding boxes and GeoJSON axis-order helpers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors from parsing geometry-related request parameters.
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("invalid bbox '{0}': expected 'lonMin,latMin,lonMax,latMax'")]
    InvalidBbox(String),
    #[error("invalid coordinate '{0}'")]
    InvalidCoordinate(String),
}

/// A WGS84 coordinate pair in lon/lat order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Axis-aligned bounding box in lon/lat order, matching the
/// `bbox=lonMin,latMin,lonMax,latMax` query convention of map widgets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lon_min: f64,
    pub lat_min: f64,
    pub lon_max: f64,
    pub lat_max: f64,
}

impl BoundingBox {
    pub fn new(lon_min: f64, lat_min: f64, lon_max: f64, lat_max: f64) -> Self {
        Self {
            lon_min,
            lat_min,
            lon_max,
            lat_max,
        }
    }

    /// Parses the `lonMin,latMin,lonMax,latMax` query form.
    pub fn parse(raw: &str) -> Result<Self, GeoError> {
        let parts: Vec<f64> = raw
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| GeoError::InvalidBbox(raw.to_string()))?;
        match parts[..] {
            [lon_min, lat_min, lon_max, lat_max] => {
                if parts.iter().any(|v| !v.is_finite()) {
                    return Err(GeoError::InvalidBbox(raw.to_string()));
                }
                Ok(Self::new(lon_min, lat_min, lon_max, lat_max))
            }
            _ => Err(GeoError::InvalidBbox(raw.to_string())),
        }
    }
}

/// Swaps GeoJSON coordinate axis order in place, from [lon, lat] to
/// [lat, lon]. The map widget consuming the admin-area overlay expects
/// latitude-first pairs, and renders MultiPolygon rings only under a
/// `Polygon` type tag, so that tag is rewritten as well.
pub fn swap_geometry_axes(geometry: &mut Value) {
    let Some(kind) = geometry.get("type").and_then(Value::as_str).map(String::from) else {
        return;
    };
    let Some(coords) = geometry.get_mut("coordinates") else {
        return;
    };
    match kind.as_str() {
        "Point" => swap_pair(coords),
        "LineString" => swap_pairs(coords),
        "Polygon" => swap_rings(coords),
        "MultiPolygon" => {
            if let Some(polygons) = coords.as_array_mut() {
                for polygon in polygons {
                    swap_rings(polygon);
                }
            }
            geometry["type"] = Value::String("Polygon".to_string());
        }
        _ => {}
    }
}

fn swap_pair(pair: &mut Value) {
    if let Some(p) = pair.as_array_mut()
        && p.len() >= 2
    {
        p.swap(0, 1);
    }
}

fn swap_pairs(pairs: &mut Value) {
    if let Some(list) = pairs.as_array_mut() {
        for pair in list {
            swap_pair(pair);
        }
    }
}

fn swap_rings(rings: &mut Value) {
    if let Some(list) = rings.as_array_mut() {
        for ring in list {
            swap_pairs(ring);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_bbox() {
        let bbox = BoundingBox::parse("33.5,44.3,34.7,45.2").unwrap();
        assert_eq!(bbox.lon_min, 33.5);
        assert_eq!(bbox.lat_max, 45.2);
    }

    #[test]
    fn parse_bbox_rejects_bad_input() {
        assert!(BoundingBox::parse("33.5,44.3,34.7").is_err());
        assert!(BoundingBox::parse("a,b,c,d").is_err());
        assert!(BoundingBox::parse("").is_err());
    }

    #[test]
    fn swap_polygon_axes() {
        let mut geom = json!({
            "type": "Polygon",
            "coordinates": [[[33.0, 44.0], [34.0, 44.5], [33.5, 45.0], [33.0, 44.0]]]
        });
        swap_geometry_axes(&mut geom);
        assert_eq!(geom["type"], "Polygon");
        assert_eq!(geom["coordinates"][0][0], json!([44.0, 33.0]));
        assert_eq!(geom["coordinates"][0][1], json!([44.5, 34.0]));
    }

    #[test]
    fn swap_multipolygon_flattens_type_tag() {
        let mut geom = json!({
            "type": "MultiPolygon",
            "coordinates": [[[[33.0, 44.0], [34.0, 44.0], [33.5, 45.0], [33.0, 44.0]]]]
        });
        swap_geometry_axes(&mut geom);
        assert_eq!(geom["type"], "Polygon");
        assert_eq!(geom["coordinates"][0][0][0], json!([44.0, 33.0]));
    }

    #[test]
    fn swap_point_axes() {
        let mut geom = json!({"type": "Point", "coordinates": [33.1, 44.9]});
        swap_geometry_axes(&mut geom);
        assert_eq!(geom["coordinates"], json!([44.9, 33.1]));
    }

    #[test]
    fn swap_ignores_unknown_types() {
        let mut geom = json!({"type": "GeometryCollection", "geometries": []});
        let before = geom.clone();
        swap_geometry_axes(&mut geom);
        assert_eq!(geom, before);
    }
}
