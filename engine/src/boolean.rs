// ═══════════════════════════════════════════════════════════════════════
// Boolean operator — union / intersection / difference on planar shapes
//
// Clipping is delegated to Clipper (via geo-clipper), which works on an
// integer grid: every vertex is snap-rounded to `snap_epsilon` before the
// sweep, so near-coincident edges from corridor buffering become exactly
// coincident and self-overlapping rings are normalised with a non-zero
// fill rule. Afterwards parts and holes below the sliver area are dropped.
//
// The resolver only ever talks to the four functions below, so the
// clipping backend can be replaced without touching conquest.rs.
// ═══════════════════════════════════════════════════════════════════════

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::geometry::Shape;
use geo::{Area, Coord, LineString, MultiPolygon, Polygon};
use geo_clipper::Clipper;

/// Clipper keeps integer coordinates within ±(2^62 - 1).
const CLIPPER_RANGE: f64 = 4.6e18;

/// Snap grid and sliver threshold shared by every boolean operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Scale from metres to the integer clipping grid (1 / snap epsilon).
    pub factor: f64,
    pub sliver_area: f64,
}

impl Tolerance {
    pub fn new(snap_epsilon_m: f64, sliver_area_m2: f64) -> Self {
        Tolerance { factor: 1.0 / snap_epsilon_m, sliver_area: sliver_area_m2 }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Tolerance::new(config.snap_epsilon_m, config.sliver_area_m2)
    }

    pub fn snap_epsilon(&self) -> f64 {
        1.0 / self.factor
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance::from_config(&EngineConfig::default())
    }
}

// ── Operations ─────────────────────────────────────────────────────────

/// Merged footprint. Overlapping or touching parts coalesce; disjoint
/// parts stay separate polygons of the result.
pub fn union(a: &Shape, b: &Shape, tol: &Tolerance) -> Result<Shape> {
    check_operand(a, tol)?;
    check_operand(b, tol)?;
    if a.is_empty() {
        return Ok(drop_slivers(b.as_multi().union(&empty(), tol.factor), tol));
    }
    Ok(drop_slivers(a.as_multi().union(b.as_multi(), tol.factor), tol))
}

/// Overlapping footprint. An empty shape means "no overlap", not an error.
pub fn intersect(a: &Shape, b: &Shape, tol: &Tolerance) -> Result<Shape> {
    check_operand(a, tol)?;
    check_operand(b, tol)?;
    if a.is_empty() || b.is_empty() {
        return Ok(Shape::empty());
    }
    Ok(drop_slivers(a.as_multi().intersection(b.as_multi(), tol.factor), tol))
}

/// `a` with `b`'s footprint removed.
pub fn difference(a: &Shape, b: &Shape, tol: &Tolerance) -> Result<Shape> {
    check_operand(a, tol)?;
    check_operand(b, tol)?;
    if a.is_empty() {
        return Ok(Shape::empty());
    }
    if b.is_empty() {
        return heal(a, tol);
    }
    Ok(drop_slivers(a.as_multi().difference(b.as_multi(), tol.factor), tol))
}

/// Normalise a single shape: resolve self-overlap, merge touching parts,
/// drop slivers.
pub fn heal(shape: &Shape, tol: &Tolerance) -> Result<Shape> {
    union(&Shape::empty(), shape, tol)
}

fn empty() -> MultiPolygon<f64> {
    MultiPolygon::new(Vec::new())
}

// ── Operand checks ─────────────────────────────────────────────────────

fn check_operand(shape: &Shape, tol: &Tolerance) -> Result<()> {
    check_range(shape.coords().copied(), 0.0, tol)?;
    for polygon in shape.polygons() {
        check_winding(polygon.exterior(), tol)?;
        for hole in polygon.interiors() {
            check_winding(hole, tol)?;
        }
    }
    Ok(())
}

/// Every vertex, grown by `margin` metres, has to land on Clipper's integer
/// grid without overflowing.
pub(crate) fn check_range(coords: impl IntoIterator<Item = Coord<f64>>, margin: f64, tol: &Tolerance) -> Result<()> {
    let limit = CLIPPER_RANGE / tol.factor - margin;
    for c in coords {
        if !c.x.is_finite() || !c.y.is_finite() {
            return Err(EngineError::InvalidGeometry(format!("non-finite vertex ({}, {})", c.x, c.y)));
        }
        if !(c.x.abs() < limit && c.y.abs() < limit) {
            return Err(EngineError::UnresolvableGeometry(format!(
                "vertex ({}, {}) is outside the clipping range",
                c.x, c.y
            )));
        }
    }
    Ok(())
}

/// A self-crossing ring whose lobes cancel out (a bow-tie) has no usable
/// orientation: its signed area is ~0 while its filled footprint is not.
fn check_winding(ring: &LineString<f64>, tol: &Tolerance) -> Result<()> {
    let polygon = Polygon::new(ring.clone(), vec![]);
    if polygon.signed_area().abs() >= tol.sliver_area {
        return Ok(());
    }
    let filled = polygon.union(&empty(), tol.factor).unsigned_area();
    if filled >= tol.sliver_area {
        return Err(EngineError::UnresolvableGeometry(format!(
            "self-crossing ring with ambiguous winding ({filled:.3} m² filled, signed area cancels)"
        )));
    }
    Ok(())
}

// ── Sliver removal ─────────────────────────────────────────────────────

fn drop_slivers(multi: MultiPolygon<f64>, tol: &Tolerance) -> Shape {
    let polygons = multi.0.into_iter()
        .filter_map(|polygon| {
            let (exterior, interiors) = polygon.into_inner();
            let holes: Vec<LineString<f64>> = interiors.into_iter()
                .filter(|h| Polygon::new(h.clone(), vec![]).unsigned_area() >= tol.sliver_area)
                .collect();
            let kept = Polygon::new(exterior, holes);
            (kept.unsigned_area() >= tol.sliver_area).then_some(kept)
        })
        .collect();
    Shape::from_multi(MultiPolygon::new(polygons))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tol() -> Tolerance {
        Tolerance::new(0.01, 1.0)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6 * b.abs().max(1.0)
    }

    #[test]
    fn union_of_overlapping_squares_is_one_part() {
        let a = Shape::rect(0.0, 0.0, 100.0, 100.0);
        let b = Shape::rect(50.0, 0.0, 150.0, 100.0);
        let u = union(&a, &b, &tol()).unwrap();
        assert_eq!(u.parts(), 1);
        assert!(close(u.area(), 15_000.0));
    }

    #[test]
    fn union_of_disjoint_squares_keeps_both_parts() {
        let a = Shape::rect(0.0, 0.0, 10.0, 10.0);
        let b = Shape::rect(50.0, 50.0, 60.0, 60.0);
        let u = union(&a, &b, &tol()).unwrap();
        assert_eq!(u.parts(), 2);
        assert!(close(u.area(), 200.0));
    }

    #[test]
    fn disjoint_intersection_is_empty_not_error() {
        let a = Shape::rect(0.0, 0.0, 10.0, 10.0);
        let b = Shape::rect(50.0, 50.0, 60.0, 60.0);
        let i = intersect(&a, &b, &tol()).unwrap();
        assert!(i.is_empty());
    }

    #[test]
    fn difference_can_split_and_punch_holes() {
        let a = Shape::rect(0.0, 0.0, 100.0, 100.0);
        let band = Shape::rect(40.0, -10.0, 60.0, 110.0);
        let split = difference(&a, &band, &tol()).unwrap();
        assert_eq!(split.parts(), 2);
        assert!(close(split.area(), 8_000.0));

        let core = Shape::rect(40.0, 40.0, 60.0, 60.0);
        let ring = difference(&a, &core, &tol()).unwrap();
        assert_eq!(ring.parts(), 1);
        assert_eq!(ring.polygons()[0].interiors().len(), 1);
        assert!(close(ring.area(), 9_600.0));
    }

    #[test]
    fn full_cover_leaves_nothing() {
        let a = Shape::rect(10.0, 10.0, 20.0, 20.0);
        let cover = Shape::rect(0.0, 0.0, 30.0, 30.0);
        assert!(difference(&a, &cover, &tol()).unwrap().is_empty());
    }

    #[test]
    fn slivers_below_threshold_are_dropped() {
        let a = Shape::rect(0.0, 0.0, 10.0, 10.0);
        // leaves a 10 x 0.02 strip: 0.2 m², below the 1 m² threshold
        let b = Shape::rect(0.0, 0.02, 10.0, 10.0);
        assert!(difference(&a, &b, &tol()).unwrap().is_empty());
    }

    #[test]
    fn near_coincident_edges_snap_together() {
        let a = Shape::rect(0.0, 0.0, 100.0, 100.0);
        let b = Shape::rect(100.001, 0.0, 200.0, 100.0);
        let u = union(&a, &b, &tol()).unwrap();
        assert_eq!(u.parts(), 1);
    }

    #[test]
    fn bow_tie_is_unresolvable() {
        let bow_tie = Shape::from_ring(&[(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0)]);
        let other = Shape::rect(0.0, 0.0, 5.0, 5.0);
        assert!(matches!(
            intersect(&bow_tie, &other, &tol()),
            Err(EngineError::UnresolvableGeometry(_))
        ));
    }

    #[test]
    fn self_overlapping_ring_is_healed() {
        // outer square traced twice with a fold: winding is consistent, so
        // the non-zero fill resolves it to the plain square
        let folded = Shape::from_ring(&[
            (0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0),
            (0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0),
        ]);
        let healed = heal(&folded, &tol()).unwrap();
        assert_eq!(healed.parts(), 1);
        assert!(close(healed.area(), 100.0));
    }

    #[test]
    fn non_finite_vertices_are_invalid() {
        let broken = Shape::from_ring(&[(0.0, 0.0), (f64::NAN, 1.0), (1.0, 1.0)]);
        assert!(matches!(
            union(&broken, &Shape::rect(0.0, 0.0, 1.0, 1.0), &tol()),
            Err(EngineError::InvalidGeometry(_))
        ));
    }
}
