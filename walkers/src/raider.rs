// ═══════════════════════════════════════════════════════════════════════
// Raider Walker — goes after the biggest rival territory on the map.
// Falls back to a loop around home while the map holds no rivals.
// ═══════════════════════════════════════════════════════════════════════

use crate::walker::{loop_from, offset, Walker};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use turf_engine::types::{Coordinate, UserId};
use turf_engine::view::{MapView, TerritorySummary};

const HOME_RADIUS_M: f64 = 120.0;
const MIN_RADIUS_M: f64 = 40.0;
const MAX_RADIUS_M: f64 = 400.0;
const CORNERS: usize = 10;

pub struct RaiderWalker {
    user: UserId,
    home: Coordinate,
    rng: ChaCha8Rng,
}

impl RaiderWalker {
    pub fn new(user: UserId, home: Coordinate, seed: u64) -> Self {
        RaiderWalker {
            user,
            home,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Half the diagonal of the target's bounding box, clamped.
    fn raid_radius(target: &TerritorySummary, view: &MapView) -> f64 {
        let (sw, ne) = target.bounds;
        (view.projection.distance_m(sw, ne) / 2.0).clamp(MIN_RADIUS_M, MAX_RADIUS_M)
    }
}

impl Walker for RaiderWalker {
    fn name(&self) -> &str { "Raider" }
    fn user(&self) -> UserId { self.user }
    fn home(&self) -> Coordinate { self.home }

    fn plan_route(&mut self, view: &MapView) -> Vec<Coordinate> {
        let start_angle = self.rng.gen_range(0.0..std::f64::consts::TAU);
        let projection = &view.projection;
        match view.largest_rival() {
            Some(target) => {
                let radius = Self::raid_radius(target, view);
                // Sweep straight through the middle, then circle it
                let mut route = vec![
                    offset(projection, target.centroid, -radius, 0.0),
                    target.centroid,
                ];
                route.extend(loop_from(projection, target.centroid, radius, CORNERS, start_angle));
                route
            }
            None => loop_from(projection, self.home, HOME_RADIUS_M, CORNERS, start_angle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turf_engine::conquest::{submit_route, RouteSubmission};
    use turf_engine::types::RouteId;
    use turf_engine::{Board, EngineConfig};

    const HOME: Coordinate = Coordinate::new(40.4168, -3.7038);

    #[test]
    fn circles_home_on_an_empty_map() {
        let config = EngineConfig::default();
        let view = MapView::new(&Board::new(), UserId(1), &config.projection());
        let route = RaiderWalker::new(UserId(1), HOME, 3).plan_route(&view);
        assert_eq!(route.first(), route.last());
        let p = config.projection();
        let centre = p.project(HOME);
        for c in &route {
            let q = p.project(*c);
            assert!(((q.x - centre.x).hypot(q.y - centre.y) - HOME_RADIUS_M).abs() < 0.5);
        }
    }

    #[test]
    fn plans_in_the_configured_scale() {
        let config = EngineConfig { meters_per_degree: 120_000.0, ..EngineConfig::default() };
        let p = config.projection();
        let view = MapView::new(&Board::new(), UserId(1), &p);
        let route = RaiderWalker::new(UserId(1), HOME, 3).plan_route(&view);
        for c in &route {
            assert!((p.distance_m(HOME, *c) - HOME_RADIUS_M).abs() < 0.5);
        }
    }

    #[test]
    fn raid_takes_ground_from_the_largest_rival() {
        let config = EngineConfig::default();
        let mut board = Board::new();
        let projection = config.projection();
        let rival_home = offset(&projection, HOME, 1_000.0, 1_000.0);
        for (i, (user, home, radius)) in [(2, rival_home, 150.0), (3, HOME, 60.0)].into_iter().enumerate() {
            let sub = RouteSubmission::new(UserId(user), RouteId(i as u64 + 1), crate::loop_around(&projection, home, radius, 12));
            let result = submit_route(&board, &sub, &config).unwrap();
            board.apply(&result).unwrap();
        }
        let before = board.total_area(UserId(2));

        let mut raider = RaiderWalker::new(UserId(1), HOME, 9);
        let view = MapView::new(&board, UserId(1), &projection);
        let route = raider.plan_route(&view);
        let result = submit_route(&board, &RouteSubmission::new(UserId(1), RouteId(3), route), &config).unwrap();

        assert!(result.affected_user_totals[&UserId(2)] < before);
        assert!(!result.affected_user_totals.contains_key(&UserId(3)));
        assert!(result.area_conquered() > 0.0);
    }
}
