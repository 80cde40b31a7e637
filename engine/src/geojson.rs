// GeoJSON encoding of territory geometry. Positions are [lng, lat] and
// rings are explicitly closed, per RFC 7946; the Region type keeps
// (lat, lng) and open rings, so conversion happens only here.

use crate::error::{EngineError, Result};
use crate::types::{Coordinate, PolygonRings, Region, Ring};
use serde_json::{json, Value};

/// `Polygon` for a single part, `MultiPolygon` otherwise.
pub fn to_geojson(region: &Region) -> Value {
    match region.polygons.as_slice() {
        [single] => json!({ "type": "Polygon", "coordinates": polygon_positions(single) }),
        parts => json!({
            "type": "MultiPolygon",
            "coordinates": parts.iter().map(polygon_positions).collect::<Vec<_>>(),
        }),
    }
}

pub fn from_geojson(value: &Value) -> Result<Region> {
    let kind = value.get("type").and_then(Value::as_str)
        .ok_or_else(|| invalid("missing geometry type"))?;
    let coordinates = value.get("coordinates")
        .ok_or_else(|| invalid("missing coordinates"))?;
    match kind {
        "Polygon" => Ok(Region::single(parse_polygon(coordinates)?)),
        "MultiPolygon" => {
            let parts = coordinates.as_array().ok_or_else(|| invalid("MultiPolygon coordinates must be an array"))?;
            let polygons = parts.iter().map(parse_polygon).collect::<Result<Vec<_>>>()?;
            Ok(Region { polygons })
        }
        other => Err(invalid(&format!("unsupported geometry type {other:?}"))),
    }
}

/// Wrap a region as a Feature with arbitrary properties.
pub fn feature(region: &Region, properties: Value) -> Value {
    json!({ "type": "Feature", "geometry": to_geojson(region), "properties": properties })
}

fn polygon_positions(polygon: &PolygonRings) -> Vec<Vec<[f64; 2]>> {
    std::iter::once(&polygon.exterior)
        .chain(polygon.holes.iter())
        .map(|ring| closed_positions(ring))
        .collect()
}

fn closed_positions(ring: &Ring) -> Vec<[f64; 2]> {
    let mut positions: Vec<[f64; 2]> = ring.iter().map(|c| [c.lng, c.lat]).collect();
    if let Some(&first) = positions.first() {
        positions.push(first);
    }
    positions
}

fn parse_polygon(value: &Value) -> Result<PolygonRings> {
    let rings = value.as_array().ok_or_else(|| invalid("polygon must be an array of rings"))?;
    let mut rings = rings.iter().map(parse_ring);
    let exterior = rings.next().ok_or_else(|| invalid("polygon has no outer ring"))??;
    let holes = rings.collect::<Result<Vec<_>>>()?;
    Ok(PolygonRings { exterior, holes })
}

fn parse_ring(value: &Value) -> Result<Ring> {
    let positions = value.as_array().ok_or_else(|| invalid("ring must be an array of positions"))?;
    let mut ring = positions.iter()
        .map(|p| {
            let lng = p.get(0).and_then(Value::as_f64);
            let lat = p.get(1).and_then(Value::as_f64);
            match (lat, lng) {
                (Some(lat), Some(lng)) => Ok(Coordinate::new(lat, lng)),
                _ => Err(invalid("position must be [lng, lat]")),
            }
        })
        .collect::<Result<Vec<_>>>()?;
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    Ok(ring)
}

fn invalid(msg: &str) -> EngineError {
    EngineError::InvalidGeometry(format!("GeoJSON: {msg}"))
}
