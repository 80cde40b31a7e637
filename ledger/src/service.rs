// ═══════════════════════════════════════════════════════════════════════
// Conquest service — the one serialization point for route submissions
//
// A resolution reads every territory, computes a mutation set and writes
// it back. Holding a single lock across load -> resolve -> apply keeps two
// submissions from interleaving their read and write phases.
// ═══════════════════════════════════════════════════════════════════════

use crate::database::Ledger;
use crate::error::{LedgerError, Result};
use std::sync::Mutex;
use tracing::{info, warn};
use turf_engine::conquest::{submit_route, RouteSubmission};
use turf_engine::types::{Coordinate, RouteId, UserId};
use turf_engine::{EngineConfig, EngineError, ResolutionResult};

/// What happened to one submitted route.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub route_id: RouteId,
    /// `Err` when the corridor itself could not be built. The route stays
    /// recorded either way.
    pub resolution: std::result::Result<ResolutionResult, EngineError>,
}

impl Receipt {
    pub fn claimed_area(&self) -> f64 {
        self.resolution.as_ref().ok()
            .and_then(|r| r.created_territory.as_ref())
            .map_or(0.0, |t| t.area)
    }
}

pub struct ConquestService {
    ledger: Mutex<Ledger>,
    config: EngineConfig,
}

impl ConquestService {
    pub fn new(ledger: Ledger, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(ConquestService { ledger: Mutex::new(ledger), config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `f` with exclusive access to the ledger.
    pub fn with_ledger<T>(&self, f: impl FnOnce(&mut Ledger) -> Result<T>) -> Result<T> {
        let mut ledger = self.ledger.lock().map_err(|_| LedgerError::Poisoned)?;
        f(&mut ledger)
    }

    /// Record a route and settle it against the map.
    ///
    /// The route row is committed before any geometry runs. Storage errors
    /// propagate; a corridor that cannot be built is reported in the
    /// receipt instead.
    pub fn submit_route(
        &self,
        user: UserId,
        name: &str,
        coordinates: Vec<Coordinate>,
        half_width_m: Option<f64>,
    ) -> Result<Receipt> {
        self.with_ledger(|ledger| {
            let route_id = ledger.record_route(user, name, &coordinates)?;
            let board = ledger.load_board()?;
            let mut submission = RouteSubmission::new(user, route_id, coordinates);
            submission.corridor_half_width_m = half_width_m;

            match submit_route(&board, &submission, &self.config) {
                Ok(result) => {
                    if !result.is_noop() {
                        ledger.apply_resolution(&result)?;
                    }
                    info!(%user, route = %route_id, outcome = ?result.outcome, "submission settled");
                    Ok(Receipt { route_id, resolution: Ok(result) })
                }
                Err(e @ EngineError::InvalidConfig(_)) => Err(e.into()),
                Err(e) => {
                    warn!(%user, route = %route_id, error = %e, "route recorded, corridor rejected");
                    Ok(Receipt { route_id, resolution: Err(e) })
                }
            }
        })
    }

    pub fn into_ledger(self) -> Result<Ledger> {
        self.ledger.into_inner().map_err(|_| LedgerError::Poisoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turf_engine::boolean::{self, Tolerance};
    use turf_engine::conquest::Outcome;
    use turf_walkers::{loop_around, offset};

    const HOME: Coordinate = Coordinate::new(40.4168, -3.7038);

    fn proj() -> turf_engine::projection::Projection {
        EngineConfig::default().projection()
    }

    fn service(users: usize) -> (ConquestService, Vec<UserId>) {
        let ledger = Ledger::in_memory().unwrap();
        let ids = (0..users)
            .map(|i| ledger.create_user(&format!("u{i}"), &format!("User {i}")).unwrap().id)
            .collect();
        (ConquestService::new(ledger, EngineConfig::default()).unwrap(), ids)
    }

    #[test]
    fn bad_route_is_still_recorded() {
        let (svc, users) = service(1);
        let receipt = svc.submit_route(users[0], "broken", vec![HOME, Coordinate::new(f64::NAN, 0.0), offset(&proj(), HOME, 50.0, 50.0)], None).unwrap();
        assert!(matches!(receipt.resolution, Err(EngineError::InvalidGeometry(_))));
        assert_eq!(svc.with_ledger(|l| l.route_count()).unwrap(), 1);
        assert!(svc.with_ledger(|l| l.territories()).unwrap().is_empty());
    }

    #[test]
    fn short_route_claims_nothing() {
        let (svc, users) = service(1);
        let receipt = svc.submit_route(users[0], "stroll", vec![HOME, offset(&proj(), HOME, 30.0, 0.0)], None).unwrap();
        assert_eq!(receipt.claimed_area(), 0.0);
        let result = receipt.resolution.unwrap();
        assert_eq!(result.outcome, Outcome::InsufficientPoints { distinct: 2 });
        assert_eq!(svc.with_ledger(|l| l.route_count()).unwrap(), 1);
    }

    #[test]
    fn per_route_half_width_is_honoured() {
        let (svc, users) = service(2);
        let narrow = svc.submit_route(users[0], "narrow", loop_around(&proj(), HOME, 100.0, 12), Some(10.0)).unwrap();
        let wide = svc.submit_route(users[1], "wide", loop_around(&proj(), offset(&proj(), HOME, 3_000.0, 0.0), 100.0, 12), None).unwrap();
        assert!(narrow.claimed_area() * 3.0 < wide.claimed_area());
    }

    #[test]
    fn concurrent_submissions_keep_the_map_consistent() {
        let (svc, users) = service(4);
        std::thread::scope(|scope| {
            for (i, &user) in users.iter().enumerate() {
                let svc = &svc;
                scope.spawn(move || {
                    for round in 0..3 {
                        let centre = offset(&proj(), HOME, 60.0 * i as f64, 40.0 * round as f64);
                        svc.submit_route(user, "loop", loop_around(&proj(), centre, 80.0, 10), None).unwrap();
                    }
                });
            }
        });

        let config = EngineConfig::default();
        let ledger = svc.into_ledger().unwrap();
        assert_eq!(ledger.route_count().unwrap(), 12);
        assert!(ledger.verify_aggregates(&config).unwrap().is_empty());

        // whatever order the threads ran in, no two users share ground
        let territories = ledger.territories().unwrap();
        let projection = config.projection();
        let tol = Tolerance::from_config(&config);
        for (i, a) in territories.iter().enumerate() {
            for b in territories[i + 1..].iter().filter(|b| b.owner != a.owner) {
                let overlap = boolean::intersect(&a.shape(&projection), &b.shape(&projection), &tol).unwrap();
                assert!(overlap.area() < 5.0, "{} and {} overlap by {}", a.id, b.id, overlap.area());
            }
        }
    }
}
