// ═══════════════════════════════════════════════════════════════════════
// Conquest resolver — one submitted route against the whole board
//
// Architecture:
//   Resolution is a pure function of (board snapshot, submission, config).
//   It never touches storage. It returns a ResolutionResult describing the
//   mutation set (deleted ids, replacement territories, the one created
//   territory, recomputed totals) and the caller applies it atomically.
//
// Flow:
//   1. Build the corridor C. Too few points -> "recorded, no claim".
//   2. Conquest pass: every rival territory, ascending id. Overlap with C
//      is cut out; a rival fully covered is deleted, a partly covered
//      one is replaced by its remainder under a fresh id.
//   3. Merge pass: fold C with each of the claimant's own territories,
//      ascending id; every piece folded in is deleted.
//   4. One new territory for the claimant with the merged geometry.
//   5. Recompute totals once per affected user from the post-mutation set.
//
//   A boolean failure on one rival or one own piece skips just that step
//   and becomes a warning; only a corridor failure aborts the resolution.
// ═══════════════════════════════════════════════════════════════════════

use crate::aggregate;
use crate::board::Board;
use crate::boolean::{self, Tolerance};
use crate::config::EngineConfig;
use crate::corridor;
use crate::error::{EngineError, Result};
use crate::geometry::{self, Shape};
use crate::projection::Projection;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

// ── Input ──────────────────────────────────────────────────────────────

/// A completed route, already recorded by the caller under `route_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSubmission {
    pub user: UserId,
    pub route_id: RouteId,
    pub coordinates: Vec<Coordinate>,
    /// Overrides `EngineConfig::corridor_half_width_m` for this route.
    #[serde(default)]
    pub corridor_half_width_m: Option<f64>,
}

impl RouteSubmission {
    pub fn new(user: UserId, route_id: RouteId, coordinates: Vec<Coordinate>) -> Self {
        RouteSubmission { user, route_id, coordinates, corridor_half_width_m: None }
    }

    pub fn with_half_width(mut self, meters: f64) -> Self {
        self.corridor_half_width_m = Some(meters);
        self
    }
}

// ── Output ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Claimed,
    /// Route recorded, nothing claimed.
    InsufficientPoints { distinct: usize },
}

/// One rival territory that lost ground to the corridor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conquest {
    pub territory_id: TerritoryId,
    pub owner: UserId,
    pub area_taken: f64,
    /// Id of the reduced successor, `None` when the corridor took it all.
    pub replacement: Option<TerritoryId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WarningStep {
    Conquest { territory: TerritoryId, owner: UserId },
    Merge { territory: TerritoryId },
}

/// A step that was skipped because its geometry could not be processed.
/// The territory involved was left exactly as it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryWarning {
    pub step: WarningStep,
    pub message: String,
}

/// The mutation set for one submission. The caller persists
/// `created_territory` and `updated_territories`, deletes
/// `deleted_territory_ids` and writes `affected_user_totals`, all in one
/// transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub outcome: Outcome,
    pub user: UserId,
    pub route_id: RouteId,
    pub created_territory: Option<Territory>,
    pub deleted_territory_ids: BTreeSet<TerritoryId>,
    pub updated_territories: Vec<Territory>,
    pub affected_user_totals: BTreeMap<UserId, f64>,
    pub conquests: Vec<Conquest>,
    pub warnings: Vec<GeometryWarning>,
    /// First id not used by this resolution.
    pub next_territory_id: TerritoryId,
}

impl ResolutionResult {
    fn no_claim(submission: &RouteSubmission, distinct: usize, next_territory_id: TerritoryId) -> Self {
        ResolutionResult {
            outcome: Outcome::InsufficientPoints { distinct },
            user: submission.user,
            route_id: submission.route_id,
            created_territory: None,
            deleted_territory_ids: BTreeSet::new(),
            updated_territories: Vec::new(),
            affected_user_totals: BTreeMap::new(),
            conquests: Vec::new(),
            warnings: Vec::new(),
            next_territory_id,
        }
    }

    pub fn is_claim(&self) -> bool {
        self.outcome == Outcome::Claimed
    }

    /// True when nothing needs to be written apart from the route itself.
    pub fn is_noop(&self) -> bool {
        self.created_territory.is_none()
            && self.deleted_territory_ids.is_empty()
            && self.updated_territories.is_empty()
            && self.affected_user_totals.is_empty()
    }

    /// Ground taken from rivals by this submission.
    pub fn area_conquered(&self) -> f64 {
        self.conquests.iter().map(|c| c.area_taken).sum()
    }
}

// ── Resolution ─────────────────────────────────────────────────────────

/// Resolve one route against `board`.
///
/// Errors only when the corridor itself cannot be built from valid input
/// (`InvalidGeometry`, `UnresolvableGeometry`) or the configuration is bad.
/// A too-short route is `Ok` with `Outcome::InsufficientPoints`.
pub fn submit_route(board: &Board, submission: &RouteSubmission, config: &EngineConfig) -> Result<ResolutionResult> {
    config.validate()?;
    let half_width = submission.corridor_half_width_m.unwrap_or(config.corridor_half_width_m);
    let corridor = match corridor::build_corridor(&submission.coordinates, half_width, config) {
        Ok(c) => c,
        Err(EngineError::InsufficientPoints { distinct }) => {
            info!(user = %submission.user, route = %submission.route_id, distinct, "route recorded without a claim");
            return Ok(ResolutionResult::no_claim(submission, distinct, board.next_territory_id()));
        }
        Err(e) => return Err(e),
    };

    let ctx = Context {
        projection: config.projection(),
        tol: Tolerance::from_config(config),
        corridor,
    };

    // 1. Partition. Board iteration is ascending id, which fixes the order
    //    of both passes.
    let (own, rivals): (Vec<&Territory>, Vec<&Territory>) =
        board.territories().partition(|t| t.owner == submission.user);

    // 2. Conquest pass
    let settlement = rivals.iter().fold(Settlement::new(board.next_territory_id()), |s, rival| {
        let step = conquer(rival, &ctx, s.next_id);
        s.record(rival, step)
    });

    // 3. Merge pass
    let merged = own.iter().fold(Merge::new(ctx.corridor.clone()), |m, piece| m.absorb(piece, &ctx));

    // 4. The claimant's new territory
    let Settlement { next_id, mut deleted, updated, conquests, mut warnings, mut affected } = settlement;
    let created = Territory::from_shape(next_id, submission.user, submission.route_id, &merged.shape, &ctx.projection);
    let next_territory_id = next_id.next();

    // 5. Own pieces folded into the successor disappear
    deleted.extend(merged.consumed.iter().copied());
    warnings.extend(merged.warnings);
    affected.insert(submission.user);

    // 6. Totals from the post-mutation territory set
    let post: Vec<&Territory> = board.territories()
        .filter(|t| !deleted.contains(&t.id))
        .chain(updated.iter())
        .chain(std::iter::once(&created))
        .collect();
    let affected_user_totals: BTreeMap<UserId, f64> = affected.iter()
        .map(|&user| (user, aggregate::recompute_total(user, post.iter().copied())))
        .collect();

    let result = ResolutionResult {
        outcome: Outcome::Claimed,
        user: submission.user,
        route_id: submission.route_id,
        created_territory: Some(created),
        deleted_territory_ids: deleted,
        updated_territories: updated,
        affected_user_totals,
        conquests,
        warnings,
        next_territory_id,
    };
    info!(
        user = %submission.user,
        route = %submission.route_id,
        claimed_m2 = result.created_territory.as_ref().map_or(0.0, |t| t.area),
        conquered_m2 = result.area_conquered(),
        deleted = result.deleted_territory_ids.len(),
        warnings = result.warnings.len(),
        "route resolved"
    );
    Ok(result)
}

struct Context {
    projection: Projection,
    tol: Tolerance,
    corridor: Shape,
}

// ── Conquest pass ──────────────────────────────────────────────────────

enum RivalStep {
    Untouched,
    Consumed { area_taken: f64 },
    Reduced { successor: Territory, area_taken: f64 },
    Skipped(EngineError),
}

/// Settle one rival. A reduced rival keeps its owner and route
/// back-reference but is re-issued under `next_id`.
fn conquer(rival: &Territory, ctx: &Context, next_id: TerritoryId) -> RivalStep {
    if let Err(e) = geometry::validate_region(&rival.geometry) {
        return RivalStep::Skipped(e);
    }
    let shape = rival.shape(&ctx.projection);
    if !geometry::bounds_overlap(&ctx.corridor, &shape) {
        return RivalStep::Untouched;
    }
    let overlap = match boolean::intersect(&ctx.corridor, &shape, &ctx.tol) {
        Ok(o) => o,
        Err(e) => return RivalStep::Skipped(e),
    };
    if overlap.is_empty() {
        return RivalStep::Untouched;
    }
    match boolean::difference(&shape, &ctx.corridor, &ctx.tol) {
        Ok(rest) if rest.is_empty() => RivalStep::Consumed { area_taken: overlap.area() },
        Ok(rest) => RivalStep::Reduced {
            successor: Territory::from_shape(next_id, rival.owner, rival.route_id, &rest, &ctx.projection),
            area_taken: overlap.area(),
        },
        Err(e) => RivalStep::Skipped(e),
    }
}

/// Accumulated result of the conquest pass.
struct Settlement {
    next_id: TerritoryId,
    deleted: BTreeSet<TerritoryId>,
    updated: Vec<Territory>,
    conquests: Vec<Conquest>,
    warnings: Vec<GeometryWarning>,
    affected: BTreeSet<UserId>,
}

impl Settlement {
    fn new(next_id: TerritoryId) -> Self {
        Settlement {
            next_id,
            deleted: BTreeSet::new(),
            updated: Vec::new(),
            conquests: Vec::new(),
            warnings: Vec::new(),
            affected: BTreeSet::new(),
        }
    }

    fn record(mut self, rival: &Territory, step: RivalStep) -> Self {
        match step {
            RivalStep::Untouched => {}
            RivalStep::Consumed { area_taken } => {
                debug!(territory = %rival.id, owner = %rival.owner, area_taken, "rival territory fully conquered");
                self.deleted.insert(rival.id);
                self.affected.insert(rival.owner);
                self.conquests.push(Conquest {
                    territory_id: rival.id,
                    owner: rival.owner,
                    area_taken,
                    replacement: None,
                });
            }
            RivalStep::Reduced { successor, area_taken } => {
                debug!(
                    territory = %rival.id,
                    owner = %rival.owner,
                    successor = %successor.id,
                    area_taken,
                    remaining = successor.area,
                    "rival territory reduced"
                );
                self.deleted.insert(rival.id);
                self.affected.insert(rival.owner);
                self.conquests.push(Conquest {
                    territory_id: rival.id,
                    owner: rival.owner,
                    area_taken,
                    replacement: Some(successor.id),
                });
                self.next_id = self.next_id.next();
                self.updated.push(successor);
            }
            RivalStep::Skipped(e) => {
                warn!(territory = %rival.id, owner = %rival.owner, error = %e, "skipped conquest step");
                self.warnings.push(GeometryWarning {
                    step: WarningStep::Conquest { territory: rival.id, owner: rival.owner },
                    message: e.to_string(),
                });
            }
        }
        self
    }
}

// ── Merge pass ─────────────────────────────────────────────────────────

struct Merge {
    shape: Shape,
    consumed: Vec<TerritoryId>,
    warnings: Vec<GeometryWarning>,
}

impl Merge {
    fn new(corridor: Shape) -> Self {
        Merge { shape: corridor, consumed: Vec::new(), warnings: Vec::new() }
    }

    fn absorb(mut self, piece: &Territory, ctx: &Context) -> Self {
        let joined = geometry::validate_region(&piece.geometry)
            .and_then(|_| boolean::union(&self.shape, &piece.shape(&ctx.projection), &ctx.tol));
        match joined {
            Ok(shape) => {
                debug!(territory = %piece.id, parts = shape.parts(), "merged own territory");
                self.shape = shape;
                self.consumed.push(piece.id);
            }
            Err(e) => {
                warn!(territory = %piece.id, error = %e, "skipped merge step");
                self.warnings.push(GeometryWarning {
                    step: WarningStep::Merge { territory: piece.id },
                    message: e.to_string(),
                });
            }
        }
        self
    }
}
