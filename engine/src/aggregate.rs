// ═══════════════════════════════════════════════════════════════════════
// Area aggregator — per-user totals, always derived from scratch
//
// Totals are never patched with deltas. Every recompute sums the user's
// current territory areas, so rounding from many small conquests can't
// accumulate in the stored figure.
// ═══════════════════════════════════════════════════════════════════════

use crate::error::{EngineError, Result};
use crate::types::{Territory, UserId};
use std::collections::BTreeMap;

/// Sum of `area` over every territory owned by `user`.
pub fn recompute_total<'a, I>(user: UserId, territories: I) -> f64
where
    I: IntoIterator<Item = &'a Territory>,
{
    territories.into_iter()
        .filter(|t| t.owner == user)
        .map(|t| t.area)
        .sum()
}

/// Totals for every owner present in `territories`.
pub fn totals_by_user<'a, I>(territories: I) -> BTreeMap<UserId, f64>
where
    I: IntoIterator<Item = &'a Territory>,
{
    let mut totals: BTreeMap<UserId, f64> = BTreeMap::new();
    for t in territories {
        *totals.entry(t.owner).or_insert(0.0) += t.area;
    }
    totals
}

/// Check a stored total against the territory set. Returns the derived
/// total, or `InconsistentAggregate` for the caller to reconcile.
pub fn verify_total<'a, I>(user: UserId, stored: f64, territories: I, tolerance: f64) -> Result<f64>
where
    I: IntoIterator<Item = &'a Territory>,
{
    let derived = recompute_total(user, territories);
    if (derived - stored).abs() > tolerance {
        return Err(EngineError::InconsistentAggregate { user, stored, derived });
    }
    Ok(derived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Region, RouteId, TerritoryId};

    fn territory(id: u64, owner: u64, area: f64) -> Territory {
        Territory {
            id: TerritoryId(id),
            owner: UserId(owner),
            route_id: RouteId(id),
            geometry: Region::default(),
            area,
        }
    }

    #[test]
    fn totals_only_count_the_owner() {
        let ts = vec![territory(1, 1, 100.0), territory(2, 2, 50.0), territory(3, 1, 25.5)];
        assert_eq!(recompute_total(UserId(1), &ts), 125.5);
        assert_eq!(recompute_total(UserId(2), &ts), 50.0);
        assert_eq!(recompute_total(UserId(3), &ts), 0.0);

        let totals = totals_by_user(&ts);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[&UserId(1)], 125.5);
    }

    #[test]
    fn drifted_total_is_reported() {
        let ts = vec![territory(1, 7, 100.0)];
        assert_eq!(verify_total(UserId(7), 100.2, &ts, 0.5), Ok(100.0));
        assert_eq!(
            verify_total(UserId(7), 90.0, &ts, 0.5),
            Err(EngineError::InconsistentAggregate { user: UserId(7), stored: 90.0, derived: 100.0 })
        );
    }
}
