// ═══════════════════════════════════════════════════════════════════════
// Random Walker — wanders near home and walks a lumpy loop.
// Serves as baseline and for exercising the resolver on messy routes.
// ═══════════════════════════════════════════════════════════════════════

use crate::walker::{offset, Walker};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use turf_engine::types::{Coordinate, UserId};
use turf_engine::view::MapView;

/// How far from home a loop may start.
const WANDER_M: f64 = 400.0;

pub struct RandomWalker {
    user: UserId,
    home: Coordinate,
    rng: ChaCha8Rng,
}

impl RandomWalker {
    pub fn new(user: UserId, home: Coordinate, seed: u64) -> Self {
        RandomWalker {
            user,
            home,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Walker for RandomWalker {
    fn name(&self) -> &str { "Random" }
    fn user(&self) -> UserId { self.user }
    fn home(&self) -> Coordinate { self.home }

    fn plan_route(&mut self, view: &MapView) -> Vec<Coordinate> {
        let projection = &view.projection;
        let start = offset(
            projection,
            self.home,
            self.rng.gen_range(-WANDER_M..WANDER_M),
            self.rng.gen_range(-WANDER_M..WANDER_M),
        );

        // One walk in ten is a short out-and-back that claims nothing
        if self.rng.gen_bool(0.1) {
            let turn = offset(projection, start, self.rng.gen_range(-80.0..80.0), self.rng.gen_range(-80.0..80.0));
            return vec![start, turn, start];
        }

        let corners = self.rng.gen_range(3..=8);
        let mut angles: Vec<f64> = (0..corners)
            .map(|_| self.rng.gen_range(0.0..std::f64::consts::TAU))
            .collect();
        angles.sort_by(|a, b| a.total_cmp(b));

        let mut route: Vec<Coordinate> = angles.iter()
            .map(|&angle| {
                let radius = self.rng.gen_range(40.0..180.0);
                offset(projection, start, radius * angle.cos(), radius * angle.sin())
            })
            .collect();
        // Not every walker makes it back to the start
        if self.rng.gen_bool(0.7) {
            if let Some(&first) = route.first() {
                route.push(first);
            }
        }
        route
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turf_engine::{Board, EngineConfig};

    const HOME: Coordinate = Coordinate::new(40.4168, -3.7038);

    fn empty_view(user: UserId) -> MapView {
        MapView::new(&Board::new(), user, &EngineConfig::default().projection())
    }

    #[test]
    fn same_seed_same_routes() {
        let view = empty_view(UserId(1));
        let mut a = RandomWalker::new(UserId(1), HOME, 42);
        let mut b = RandomWalker::new(UserId(1), HOME, 42);
        for _ in 0..5 {
            assert_eq!(a.plan_route(&view), b.plan_route(&view));
        }
    }

    #[test]
    fn routes_stay_near_home() {
        let view = empty_view(UserId(1));
        let mut walker = RandomWalker::new(UserId(1), HOME, 7);
        for _ in 0..50 {
            let route = walker.plan_route(&view);
            assert!(route.len() >= 3);
            for c in route {
                assert!((c.lat - HOME.lat).abs() < 0.01);
                assert!((c.lng - HOME.lng).abs() < 0.01);
            }
        }
    }
}
