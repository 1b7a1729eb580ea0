use foundation::math::{GeoPoint, multipolygon_centroid, polygon_centroid};
use serde_json::{Map, Value};
use tracing::warn;

use crate::coerce::{json_text, normalize_key, optional_text};
use crate::records::{BayGeometry, Parsed};

#[derive(Debug)]
pub enum GeoJsonError {
    Json(serde_json::Error),
    NotAFeatureCollection,
    InvalidFeature { index: usize, reason: String },
}

impl std::fmt::Display for GeoJsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeoJsonError::Json(e) => write!(f, "JSON parse error: {e}"),
            GeoJsonError::NotAFeatureCollection => {
                write!(f, "expected GeoJSON FeatureCollection")
            }
            GeoJsonError::InvalidFeature { index, reason } => {
                write!(f, "invalid feature at index {index}: {reason}")
            }
        }
    }
}

impl std::error::Error for GeoJsonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GeoJsonError::Json(e) => Some(e),
            _ => None,
        }
    }
}

/// Bay shapes reduced to centroids.
#[derive(Debug, Clone, PartialEq)]
enum BayShape {
    Point(GeoPoint),
    Polygon(Vec<Vec<GeoPoint>>),
    MultiPolygon(Vec<Vec<Vec<GeoPoint>>>),
}

impl BayShape {
    fn centroid(&self) -> Option<GeoPoint> {
        match self {
            BayShape::Point(p) => Some(*p),
            BayShape::Polygon(rings) => polygon_centroid(rings),
            BayShape::MultiPolygon(polys) => multipolygon_centroid(polys),
        }
    }
}

pub fn parse_bay_geometries(payload: &[u8]) -> Result<Parsed<BayGeometry>, GeoJsonError> {
    let value: Value = serde_json::from_slice(payload).map_err(GeoJsonError::Json)?;
    parse_bay_geometries_value(&value)
}

/// Reads a FeatureCollection of bay polygons.
///
/// Features without a `bay_id` (property or feature id) or without geometry
/// are skipped and counted; structurally broken features are errors.
pub fn parse_bay_geometries_value(value: &Value) -> Result<Parsed<BayGeometry>, GeoJsonError> {
    let obj = value
        .as_object()
        .ok_or(GeoJsonError::NotAFeatureCollection)?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or(GeoJsonError::NotAFeatureCollection)?;
    if ty != "FeatureCollection" {
        return Err(GeoJsonError::NotAFeatureCollection);
    }

    let features_val = obj
        .get("features")
        .and_then(|v| v.as_array())
        .ok_or(GeoJsonError::NotAFeatureCollection)?;

    let mut out = Parsed::new(Vec::with_capacity(features_val.len()), 0);
    for (index, feat_val) in features_val.iter().enumerate() {
        let feat_obj = feat_val
            .as_object()
            .ok_or(GeoJsonError::InvalidFeature {
                index,
                reason: "feature must be an object".to_string(),
            })?;

        let feat_type = feat_obj.get("type").and_then(|v| v.as_str()).ok_or(
            GeoJsonError::InvalidFeature {
                index,
                reason: "feature missing type".to_string(),
            },
        )?;
        if feat_type != "Feature" {
            return Err(GeoJsonError::InvalidFeature {
                index,
                reason: format!("unexpected feature type: {feat_type}"),
            });
        }

        let empty = Map::new();
        let properties = feat_obj
            .get("properties")
            .and_then(|v| v.as_object())
            .unwrap_or(&empty);

        let bay_id = property_key(properties, "bay_id")
            .or_else(|| feat_obj.get("id").and_then(json_text).and_then(|s| normalize_key(&s)));
        let Some(bay_id) = bay_id else {
            warn!(index, "bay feature without bay_id skipped");
            out.skipped += 1;
            continue;
        };

        let shape = match feat_obj.get("geometry") {
            None | Some(Value::Null) => None,
            Some(g) => Some(
                parse_shape(g).map_err(|reason| GeoJsonError::InvalidFeature { index, reason })?,
            ),
        };
        let Some(centroid) = shape
            .as_ref()
            .and_then(BayShape::centroid)
            .filter(GeoPoint::is_finite)
        else {
            warn!(index, bay_id = %bay_id, "bay feature without usable geometry skipped");
            out.skipped += 1;
            continue;
        };

        let street = property_text(properties, "rd_seg_dsc")
            .or_else(|| property_text(properties, "street"));

        out.rows.push(BayGeometry {
            bay_id,
            rd_seg_id: property_key(properties, "rd_seg_id"),
            street,
            centroid,
        });
    }

    Ok(out)
}

fn property_key(props: &Map<String, Value>, key: &str) -> Option<String> {
    props
        .get(key)
        .and_then(json_text)
        .and_then(|s| normalize_key(&s))
}

fn property_text(props: &Map<String, Value>, key: &str) -> Option<String> {
    props
        .get(key)
        .and_then(json_text)
        .and_then(|s| optional_text(&s))
}

fn parse_shape(value: &Value) -> Result<BayShape, String> {
    let obj = value
        .as_object()
        .ok_or("geometry must be an object".to_string())?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or("geometry missing type".to_string())?;

    let coords = obj
        .get("coordinates")
        .ok_or("geometry missing coordinates".to_string())?;

    match ty {
        "Point" => Ok(BayShape::Point(parse_point(coords)?)),
        "Polygon" => Ok(BayShape::Polygon(parse_polygon(coords)?)),
        "MultiPolygon" => Ok(BayShape::MultiPolygon(parse_multi_polygon(coords)?)),
        other => Err(format!("unsupported bay geometry type: {other}")),
    }
}

fn parse_point(coords: &Value) -> Result<GeoPoint, String> {
    let arr = coords
        .as_array()
        .ok_or("Point coordinates must be an array".to_string())?;
    if arr.len() < 2 {
        return Err("Point coordinates must have [lon, lat]".to_string());
    }
    let lon = arr[0]
        .as_f64()
        .ok_or("Point lon must be a number".to_string())?;
    let lat = arr[1]
        .as_f64()
        .ok_or("Point lat must be a number".to_string())?;
    Ok(GeoPoint::new(lat, lon))
}

fn parse_ring(coords: &Value) -> Result<Vec<GeoPoint>, String> {
    let arr = coords
        .as_array()
        .ok_or("ring must be an array".to_string())?;
    let mut out = Vec::with_capacity(arr.len());
    for item in arr {
        out.push(parse_point(item)?);
    }
    Ok(out)
}

fn parse_polygon(coords: &Value) -> Result<Vec<Vec<GeoPoint>>, String> {
    let rings = coords
        .as_array()
        .ok_or("Polygon coordinates must be an array of rings".to_string())?;
    let mut out = Vec::with_capacity(rings.len());
    for ring in rings {
        out.push(parse_ring(ring)?);
    }
    Ok(out)
}

fn parse_multi_polygon(coords: &Value) -> Result<Vec<Vec<Vec<GeoPoint>>>, String> {
    let polys = coords
        .as_array()
        .ok_or("MultiPolygon coordinates must be an array of polygons".to_string())?;
    let mut out = Vec::with_capacity(polys.len());
    for poly in polys {
        out.push(parse_polygon(poly)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{GeoJsonError, parse_bay_geometries};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    const BAYS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "bay_id": 4810.0, "rd_seg_id": "20013", "rd_seg_dsc": "Lonsdale Street" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[144.96, -37.81], [144.9602, -37.81], [144.9602, -37.8098], [144.96, -37.8098], [144.96, -37.81]]]
                }
            },
            {
                "type": "Feature",
                "id": 77,
                "properties": { "street": "Swanston Street" },
                "geometry": { "type": "Point", "coordinates": [144.9665, -37.8136] }
            },
            {
                "type": "Feature",
                "properties": { "rd_seg_id": 1 },
                "geometry": { "type": "Point", "coordinates": [144.9, -37.8] }
            },
            {
                "type": "Feature",
                "properties": { "bay_id": "9" },
                "geometry": null
            }
        ]
    }"#;

    #[test]
    fn parses_bays_with_centroids() {
        let parsed = parse_bay_geometries(BAYS.as_bytes()).expect("parse bays");
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.skipped, 2);

        let first = &parsed.rows[0];
        assert_eq!(first.bay_id, "4810");
        assert_eq!(first.rd_seg_id.as_deref(), Some("20013"));
        assert_eq!(first.street.as_deref(), Some("Lonsdale Street"));
        assert_close(first.centroid.lat_deg, -37.8099, 1e-9);
        assert_close(first.centroid.lon_deg, 144.9601, 1e-9);

        let second = &parsed.rows[1];
        assert_eq!(second.bay_id, "77");
        assert_eq!(second.rd_seg_id, None);
        assert_eq!(second.street.as_deref(), Some("Swanston Street"));
        assert_close(second.centroid.lat_deg, -37.8136, 1e-12);
    }

    #[test]
    fn rejects_non_collections() {
        let err = parse_bay_geometries(br#"{"type": "Feature"}"#).unwrap_err();
        assert!(matches!(err, GeoJsonError::NotAFeatureCollection));

        let err = parse_bay_geometries(b"not json").unwrap_err();
        assert!(matches!(err, GeoJsonError::Json(_)));
    }

    #[test]
    fn unsupported_geometry_is_an_error() {
        let payload = br#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"bay_id":1},
             "geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]}}]}"#;
        let err = parse_bay_geometries(payload).unwrap_err();
        assert!(matches!(err, GeoJsonError::InvalidFeature { index: 0, .. }));
    }
}
