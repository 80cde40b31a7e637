// ═══════════════════════════════════════════════════════════════════════
// Route corridor builder — thicken a GPS trace into a claimable polygon
// ═══════════════════════════════════════════════════════════════════════

use crate::boolean::{self, Tolerance};
use crate::config::{self, EngineConfig};
use crate::error::{EngineError, Result};
use crate::geometry::{self, Shape};
use crate::types::Coordinate;
use geo::{Coord, Distance, Haversine, LineString, MultiLineString, Point};
use geo_clipper::{ClipperOpen, EndType, JoinType};
use tracing::debug;

/// Buffer the route polyline by `half_width_m`: every point within that
/// distance of the path, with round joins and round end caps.
///
/// Pure and deterministic. Fails with `InsufficientPoints` when the trace
/// has fewer than three distinct fixes (at the snap epsilon) and with
/// `InvalidGeometry` when a fix is not a usable lat/lng.
pub fn build_corridor(route: &[Coordinate], half_width_m: f64, config: &EngineConfig) -> Result<Shape> {
    config::check_half_width(half_width_m, config.snap_epsilon_m)?;
    if let Some(bad) = route.iter().find(|c| !c.in_range()) {
        return Err(EngineError::InvalidGeometry(format!(
            "route fix ({}, {}) is not a valid lat/lng",
            bad.lat, bad.lng
        )));
    }

    let projection = config.projection();
    let path = dedup_consecutive(projection.project_line(route), config.snap_epsilon_m);
    let distinct = geometry::count_distinct(&path, config.snap_epsilon_m, 3);
    if distinct < 3 {
        return Err(EngineError::InsufficientPoints { distinct });
    }

    let tol = Tolerance::from_config(config);
    // The buffer reaches half_width past every fix, and all of it has to
    // fit Clipper's integer grid.
    boolean::check_range(path.iter().copied(), half_width_m, &tol)?;

    // Clipper scales the delta by the factor but takes the arc tolerance
    // in grid units.
    let arc_tolerance = config.arc_tolerance_m * tol.factor;
    let line = MultiLineString::new(vec![LineString::new(path)]);
    let buffered = line.offset(
        half_width_m,
        JoinType::Round(arc_tolerance),
        EndType::OpenRound(arc_tolerance),
        tol.factor,
    );
    // Offsetting already unions the swept area; healing drops slivers and
    // folds any remaining self-overlap at hairpin turns.
    let corridor = boolean::heal(&Shape::from_multi(buffered), &tol)?;
    if corridor.is_empty() {
        return Err(EngineError::UnresolvableGeometry("route buffer collapsed to nothing".into()));
    }

    debug!(
        fixes = route.len(),
        vertices = line.0[0].0.len(),
        parts = corridor.parts(),
        area_m2 = corridor.area(),
        "built route corridor"
    );
    Ok(corridor)
}

/// Collapse runs of fixes that sit on top of each other (a runner standing
/// still at a crossing).
fn dedup_consecutive(points: Vec<Coord<f64>>, epsilon: f64) -> Vec<Coord<f64>> {
    let mut out: Vec<Coord<f64>> = Vec::with_capacity(points.len());
    for p in points {
        match out.last() {
            Some(&last) if geometry::near(last, p, epsilon) => {}
            _ => out.push(p),
        }
    }
    out
}

/// Great-circle length of the trace in metres.
pub fn route_length_m(route: &[Coordinate]) -> f64 {
    route.windows(2)
        .map(|w| {
            let a = Point::new(w[0].lng, w[0].lat);
            let b = Point::new(w[1].lng, w[1].lat);
            Haversine::distance(a, b)
        })
        .sum()
}
