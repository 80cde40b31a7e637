// ═══════════════════════════════════════════════════════════════════════
// Geometry primitives — planar shapes, area, ring validity, predicates
// ═══════════════════════════════════════════════════════════════════════

use crate::error::{EngineError, Result};
use crate::projection::Projection;
use crate::types::{Coordinate, Region};
use geo::{Area, BoundingRect, Centroid, Contains, Coord, LineString, MultiPolygon, Point, Polygon, Rect};

// ── Shape ──────────────────────────────────────────────────────────────

/// A planar (multi)polygon in metres. This is what every boolean
/// operation consumes and produces; an empty shape is "no ground".
#[derive(Debug, Clone, PartialEq)]
pub struct Shape(MultiPolygon<f64>);

impl Default for Shape {
    fn default() -> Self {
        Shape::empty()
    }
}

impl Shape {
    pub fn empty() -> Self {
        Shape(MultiPolygon::new(Vec::new()))
    }

    pub fn from_multi(multi: MultiPolygon<f64>) -> Self {
        Shape(multi)
    }

    pub fn from_polygon(polygon: Polygon<f64>) -> Self {
        Shape(MultiPolygon::new(vec![polygon]))
    }

    /// Axis-aligned rectangle, mostly for tests and synthetic maps.
    pub fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Shape::from_polygon(Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y }).to_polygon())
    }

    /// Simple polygon from an open or closed list of (x, y) vertices.
    pub fn from_ring(vertices: &[(f64, f64)]) -> Self {
        let ring: Vec<Coord<f64>> = vertices.iter().map(|&(x, y)| Coord { x, y }).collect();
        Shape::from_polygon(Polygon::new(LineString::new(ring), vec![]))
    }

    pub fn as_multi(&self) -> &MultiPolygon<f64> {
        &self.0
    }

    pub fn polygons(&self) -> &[Polygon<f64>] {
        &self.0 .0
    }

    pub fn parts(&self) -> usize {
        self.0 .0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0 .0.is_empty()
    }

    pub fn area(&self) -> f64 {
        area(self)
    }

    pub fn coords(&self) -> impl Iterator<Item = &Coord<f64>> {
        self.polygons().iter().flat_map(|p| {
            p.exterior().coords().chain(p.interiors().iter().flat_map(|h| h.coords()))
        })
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.0.bounding_rect()
    }
}

// ── Area ───────────────────────────────────────────────────────────────

/// Planar area in square metres. Holes are subtracted; never negative.
pub fn area(shape: &Shape) -> f64 {
    shape.0.unsigned_area()
}

/// Area of a boundary region under the given projection.
pub fn region_area(region: &Region, projection: &Projection) -> f64 {
    area(&projection.shape_from_region(region))
}

// ── Validity ───────────────────────────────────────────────────────────

/// True iff the ring has at least three distinct vertices and no
/// zero-length edge, including the implicit closing edge.
pub fn ring_is_valid(ring: &[Coordinate]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let zero_length_edge = ring.iter()
        .zip(ring.iter().cycle().skip(1))
        .any(|(a, b)| a == b);
    if zero_length_edge {
        return false;
    }
    let mut distinct: Vec<&Coordinate> = Vec::with_capacity(3);
    for c in ring {
        if !distinct.contains(&c) {
            distinct.push(c);
            if distinct.len() == 3 {
                return true;
            }
        }
    }
    false
}

/// Reject a region that must not enter a boolean operation.
pub fn validate_region(region: &Region) -> Result<()> {
    if region.is_empty() {
        return Err(EngineError::InvalidGeometry("region has no polygons".into()));
    }
    if let Some(bad) = region.coordinates().find(|c| !c.in_range()) {
        return Err(EngineError::InvalidGeometry(format!(
            "coordinate ({}, {}) is not a valid lat/lng",
            bad.lat, bad.lng
        )));
    }
    for (i, polygon) in region.polygons.iter().enumerate() {
        if !ring_is_valid(&polygon.exterior) {
            return Err(EngineError::InvalidGeometry(format!("polygon {i}: degenerate outer ring")));
        }
        if polygon.holes.iter().any(|h| !ring_is_valid(h)) {
            return Err(EngineError::InvalidGeometry(format!("polygon {i}: degenerate hole")));
        }
    }
    Ok(())
}

/// Count vertices that are pairwise further apart than `epsilon`, stopping
/// once `limit` have been found.
pub(crate) fn count_distinct(points: &[Coord<f64>], epsilon: f64, limit: usize) -> usize {
    let mut reps: Vec<Coord<f64>> = Vec::with_capacity(limit);
    for &p in points {
        if !reps.iter().any(|r| near(*r, p, epsilon)) {
            reps.push(p);
            if reps.len() >= limit {
                break;
            }
        }
    }
    reps.len()
}

pub(crate) fn near(a: Coord<f64>, b: Coord<f64>, epsilon: f64) -> bool {
    (a.x - b.x).hypot(a.y - b.y) <= epsilon
}

// ── Predicates ─────────────────────────────────────────────────────────

pub fn contains_point(shape: &Shape, point: Coord<f64>) -> bool {
    shape.0.contains(&Point::from(point))
}

/// Cheap pre-filter: can these two shapes possibly overlap?
pub fn bounds_overlap(a: &Shape, b: &Shape) -> bool {
    match (a.bounding_rect(), b.bounding_rect()) {
        (Some(ra), Some(rb)) => {
            ra.min().x <= rb.max().x
                && rb.min().x <= ra.max().x
                && ra.min().y <= rb.max().y
                && rb.min().y <= ra.max().y
        }
        _ => false,
    }
}

pub fn centroid(shape: &Shape) -> Option<Coord<f64>> {
    shape.0.centroid().map(|p| p.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng)
    }

    #[test]
    fn ring_validity() {
        assert!(ring_is_valid(&[c(0.0, 0.0), c(0.0, 1.0), c(1.0, 1.0)]));
        // too short
        assert!(!ring_is_valid(&[c(0.0, 0.0), c(0.0, 1.0)]));
        // repeated vertex gives a zero-length edge
        assert!(!ring_is_valid(&[c(0.0, 0.0), c(0.0, 1.0), c(0.0, 1.0), c(1.0, 1.0)]));
        // explicitly closed ring has a zero-length closing edge
        assert!(!ring_is_valid(&[c(0.0, 0.0), c(0.0, 1.0), c(1.0, 1.0), c(0.0, 0.0)]));
        // only two distinct vertices
        assert!(!ring_is_valid(&[c(0.0, 0.0), c(0.0, 1.0), c(0.0, 0.0), c(0.0, 1.0)]));
    }

    #[test]
    fn area_subtracts_holes() {
        let outer = LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let hole = LineString::from(vec![(2.0, 2.0), (4.0, 2.0), (4.0, 4.0), (2.0, 4.0)]);
        let shape = Shape::from_polygon(Polygon::new(outer, vec![hole]));
        assert!((shape.area() - 96.0).abs() < 1e-9);
    }

    #[test]
    fn area_ignores_orientation() {
        let ccw = Shape::from_ring(&[(0.0, 0.0), (5.0, 0.0), (5.0, 5.0), (0.0, 5.0)]);
        let cw = Shape::from_ring(&[(0.0, 0.0), (0.0, 5.0), (5.0, 5.0), (5.0, 0.0)]);
        assert_eq!(ccw.area(), 25.0);
        assert_eq!(cw.area(), 25.0);
        assert_eq!(Shape::empty().area(), 0.0);
    }

    #[test]
    fn bounds_and_points() {
        let a = Shape::rect(0.0, 0.0, 10.0, 10.0);
        let b = Shape::rect(20.0, 0.0, 30.0, 10.0);
        let touching = Shape::rect(10.0, 0.0, 15.0, 10.0);
        assert!(!bounds_overlap(&a, &b));
        assert!(bounds_overlap(&a, &touching));
        assert!(!bounds_overlap(&a, &Shape::empty()));
        assert!(contains_point(&a, Coord { x: 5.0, y: 5.0 }));
        assert!(!contains_point(&a, Coord { x: 15.0, y: 5.0 }));
    }

    #[test]
    fn invalid_regions() {
        let bad_lat = Region::single(crate::types::PolygonRings::new(vec![c(95.0, 0.0), c(0.0, 1.0), c(1.0, 1.0)]));
        assert!(matches!(validate_region(&bad_lat), Err(EngineError::InvalidGeometry(_))));
        assert!(validate_region(&Region::default()).is_err());
    }
}
