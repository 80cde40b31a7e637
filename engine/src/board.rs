// ═══════════════════════════════════════════════════════════════════════
// Board — the territory read set a resolution runs against
//
// The engine never owns persistent state. A Board is a snapshot handed in
// by the caller (or kept in memory for simulations and tests); the
// resolver reads it and returns a mutation set, and `apply` replays that
// set onto the snapshot.
// ═══════════════════════════════════════════════════════════════════════

use crate::aggregate;
use crate::conquest::ResolutionResult;
use crate::error::{EngineError, Result};
use crate::geometry::Shape;
use crate::projection::Projection;
use crate::types::*;
use std::collections::BTreeMap;

impl Territory {
    /// Build a territory from planar geometry. The cached area is taken
    /// from the same shape the boundary geometry is derived from.
    pub fn from_shape(id: TerritoryId, owner: UserId, route_id: RouteId, shape: &Shape, projection: &Projection) -> Self {
        Territory {
            id,
            owner,
            route_id,
            geometry: projection.region_from_shape(shape),
            area: shape.area(),
        }
    }

    /// Planar geometry of this territory.
    pub fn shape(&self, projection: &Projection) -> Shape {
        projection.shape_from_region(&self.geometry)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Board {
    territories: BTreeMap<TerritoryId, Territory>,
    next_territory_id: TerritoryId,
}

impl Board {
    pub fn new() -> Self {
        Board::default()
    }

    /// Snapshot from stored rows. New ids continue after the largest one.
    pub fn from_territories(territories: impl IntoIterator<Item = Territory>) -> Self {
        let mut board = Board::new();
        for t in territories {
            board.insert(t);
        }
        board
    }

    pub fn insert(&mut self, territory: Territory) {
        if territory.id >= self.next_territory_id {
            self.next_territory_id = territory.id.next();
        }
        self.territories.insert(territory.id, territory);
    }

    pub fn get(&self, id: TerritoryId) -> Option<&Territory> {
        self.territories.get(&id)
    }

    /// All territories in ascending id order.
    pub fn territories(&self) -> impl Iterator<Item = &Territory> {
        self.territories.values()
    }

    pub fn owned_by(&self, user: UserId) -> impl Iterator<Item = &Territory> {
        self.territories.values().filter(move |t| t.owner == user)
    }

    pub fn len(&self) -> usize {
        self.territories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.territories.is_empty()
    }

    pub fn next_territory_id(&self) -> TerritoryId {
        self.next_territory_id
    }

    /// Never hand out an id below `floor`.
    pub fn reserve_ids_from(&mut self, floor: TerritoryId) {
        if floor > self.next_territory_id {
            self.next_territory_id = floor;
        }
    }

    pub fn total_area(&self, user: UserId) -> f64 {
        aggregate::recompute_total(user, self.territories.values())
    }

    pub fn totals(&self) -> BTreeMap<UserId, f64> {
        aggregate::totals_by_user(self.territories.values())
    }

    /// Replay a resolution. Either every mutation lands or none does.
    pub fn apply(&mut self, result: &ResolutionResult) -> Result<()> {
        if let Some(missing) = result.deleted_territory_ids.iter().find(|id| !self.territories.contains_key(id)) {
            return Err(EngineError::UnknownTerritory(*missing));
        }
        for id in &result.deleted_territory_ids {
            self.territories.remove(id);
        }
        for t in result.updated_territories.iter().chain(result.created_territory.iter()) {
            self.insert(t.clone());
        }
        self.reserve_ids_from(result.next_territory_id);
        Ok(())
    }
}
