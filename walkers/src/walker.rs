// ═══════════════════════════════════════════════════════════════════════
// Walker Trait — synthetic players that plan routes against the map
//
// KEY DESIGN PRINCIPLE:
//   Walkers receive a `MapView` (not the raw Board). They see owners,
//   areas, centroids and bounding boxes, never the stored geometry, so
//   a plan can only react to what the map screen shows a player.
// ═══════════════════════════════════════════════════════════════════════

use crate::raider::RaiderWalker;
use crate::random::RandomWalker;
use serde::{Deserialize, Serialize};
use turf_engine::projection::Projection;
use turf_engine::types::{Coordinate, UserId};
use turf_engine::view::MapView;

pub trait Walker: Send + Sync {
    /// Human-readable strategy name (e.g. "Random", "Raider").
    fn name(&self) -> &str;

    /// The user this walker plays as.
    fn user(&self) -> UserId;

    /// Where this walker starts when it has nothing better to do.
    fn home(&self) -> Coordinate;

    /// Plan the next route as a `[lat, lng]` sequence. Returning fewer
    /// than three distinct points is allowed; the route is recorded and
    /// claims nothing.
    fn plan_route(&mut self, view: &MapView) -> Vec<Coordinate>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalkerKind {
    Random,
    Raider,
}

/// Construct a boxed walker of the given kind.
pub fn build(kind: WalkerKind, user: UserId, home: Coordinate, seed: u64) -> Box<dyn Walker> {
    match kind {
        WalkerKind::Random => Box::new(RandomWalker::new(user, home, seed)),
        WalkerKind::Raider => Box::new(RaiderWalker::new(user, home, seed)),
    }
}

// ── Route helpers ──────────────────────────────────────────────────────

// Metre offsets go through the engine's projection, so a walker plans in
// the same metric the corridor is built in.

/// Move `origin` by a metre offset, east and north positive.
pub fn offset(projection: &Projection, origin: Coordinate, east_m: f64, north_m: f64) -> Coordinate {
    projection.shift(origin, east_m, north_m)
}

/// Closed loop of `points` vertices on a circle around `center`, starting
/// due east and walking counter-clockwise. The start is repeated at the end.
pub fn loop_around(projection: &Projection, center: Coordinate, radius_m: f64, points: usize) -> Vec<Coordinate> {
    loop_from(projection, center, radius_m, points, 0.0)
}

pub(crate) fn loop_from(
    projection: &Projection,
    center: Coordinate,
    radius_m: f64,
    points: usize,
    start_angle: f64,
) -> Vec<Coordinate> {
    let points = points.max(3);
    let step = std::f64::consts::TAU / points as f64;
    let mut route: Vec<Coordinate> = (0..points)
        .map(|i| {
            let angle = start_angle + step * i as f64;
            projection.shift(center, radius_m * angle.cos(), radius_m * angle.sin())
        })
        .collect();
    if let Some(&first) = route.first() {
        route.push(first);
    }
    route
}
