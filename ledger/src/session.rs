// ═══════════════════════════════════════════════════════════════════════
// Session — runs several rounds of walkers against one conquest service
//
// Each round every walker plans against the same snapshot of the map, in
// parallel, and the routes are then submitted one by one in walker order
// so a given set of seeds always produces the same map.
// ═══════════════════════════════════════════════════════════════════════

use crate::database::Standing;
use crate::error::Result;
use crate::service::ConquestService;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};
use turf_engine::types::Coordinate;
use turf_engine::view::MapView;
use turf_walkers::Walker;

/// Result of a completed session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub rounds: u32,
    pub submissions: u32,
    pub claims: u32,
    /// Routes too short to claim anything.
    pub no_claims: u32,
    /// Routes whose corridor could not be built.
    pub rejected: u32,
    pub warnings: u32,
    pub area_conquered: f64,
    pub standings: Vec<Standing>,
}

/// Play `rounds` rounds. Walkers must belong to users that already exist.
pub fn run_session(service: &ConquestService, walkers: &mut [Box<dyn Walker>], rounds: u32) -> Result<SessionReport> {
    let projection = service.config().projection();
    let mut report = SessionReport {
        rounds,
        submissions: 0,
        claims: 0,
        no_claims: 0,
        rejected: 0,
        warnings: 0,
        area_conquered: 0.0,
        standings: Vec::new(),
    };

    for round in 1..=rounds {
        let board = service.with_ledger(|l| l.load_board())?;
        let plans: Vec<Vec<Coordinate>> = walkers.par_iter_mut()
            .map(|w| {
                let view = MapView::new(&board, w.user(), &projection);
                w.plan_route(&view)
            })
            .collect();

        for (walker, route) in walkers.iter().zip(plans) {
            let name = format!("{} round {round}", walker.name());
            let receipt = service.submit_route(walker.user(), &name, route, None)?;
            report.submissions += 1;
            match &receipt.resolution {
                Ok(r) if r.is_claim() => {
                    report.claims += 1;
                    report.warnings += r.warnings.len() as u32;
                    report.area_conquered += r.area_conquered();
                }
                Ok(_) => report.no_claims += 1,
                Err(_) => report.rejected += 1,
            }
            debug!(round, walker = walker.name(), user = %walker.user(), claimed_m2 = receipt.claimed_area(), "walker moved");
        }
        let territories = service.with_ledger(|l| l.territory_count())?;
        info!(round, territories, "round complete");
    }

    report.standings = service.with_ledger(|l| l.leaderboard())?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Ledger;
    use turf_engine::EngineConfig;
    use turf_walkers::{build, offset, WalkerKind};

    const HOME: Coordinate = Coordinate::new(40.4168, -3.7038);

    fn proj() -> turf_engine::projection::Projection {
        EngineConfig::default().projection()
    }

    fn play(seed: u64) -> (SessionReport, ConquestService) {
        let ledger = Ledger::in_memory().unwrap();
        let mut walkers: Vec<Box<dyn Walker>> = Vec::new();
        for i in 0..4u64 {
            let user = ledger.create_user(&format!("w{i}"), &format!("Walker {i}")).unwrap();
            let kind = if i % 2 == 0 { WalkerKind::Random } else { WalkerKind::Raider };
            let home = offset(&proj(), HOME, 250.0 * i as f64, 0.0);
            walkers.push(build(kind, user.id, home, seed + i));
        }
        let service = ConquestService::new(ledger, EngineConfig::default()).unwrap();
        let report = run_session(&service, &mut walkers, 3).unwrap();
        (report, service)
    }

    #[test]
    fn session_counts_every_submission() {
        let (report, service) = play(11);
        assert_eq!(report.submissions, 12);
        assert_eq!(report.claims + report.no_claims + report.rejected, 12);
        assert_eq!(report.standings.len(), 4);
        let ledger = service.into_ledger().unwrap();
        assert_eq!(ledger.route_count().unwrap(), 12);
        assert!(ledger.verify_aggregates(&EngineConfig::default()).unwrap().is_empty());
        let held: u64 = report.standings.iter().map(|s| s.territories as u64).sum();
        assert_eq!(ledger.territory_count().unwrap(), held);
    }

    #[test]
    fn same_seed_same_standings() {
        let (a, _) = play(5);
        let (b, _) = play(5);
        assert_eq!(a.standings, b.standings);
        assert_eq!(a.claims, b.claims);
    }
}
