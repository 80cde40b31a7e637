// ═══════════════════════════════════════════════════════════════════════
// Map view — the public picture of the board that walkers plan against
//
// Walkers never get the raw Board. They see, per territory, who owns it,
// how big it is, roughly where it sits (centroid and bounding box), and
// every user's total. That is all the map screen shows a player too.
// ═══════════════════════════════════════════════════════════════════════

use crate::board::Board;
use crate::geometry;
use crate::projection::Projection;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerritorySummary {
    pub id: TerritoryId,
    pub owner: UserId,
    pub area: f64,
    pub centroid: Coordinate,
    /// South-west and north-east corners.
    pub bounds: (Coordinate, Coordinate),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapView {
    pub viewer: UserId,
    pub territories: Vec<TerritorySummary>,
    pub totals: BTreeMap<UserId, f64>,
    /// The engine's projection. Plans measured in it match the corridor
    /// the engine will build.
    pub projection: Projection,
}

impl MapView {
    pub fn new(board: &Board, viewer: UserId, projection: &Projection) -> Self {
        let territories = board.territories()
            .filter_map(|t| summarize(t, projection))
            .collect();
        MapView { viewer, territories, totals: board.totals(), projection: *projection }
    }

    pub fn mine(&self) -> impl Iterator<Item = &TerritorySummary> {
        self.territories.iter().filter(move |t| t.owner == self.viewer)
    }

    pub fn rivals(&self) -> impl Iterator<Item = &TerritorySummary> {
        self.territories.iter().filter(move |t| t.owner != self.viewer)
    }

    /// Largest rival territory, ties broken by lowest id.
    pub fn largest_rival(&self) -> Option<&TerritorySummary> {
        self.rivals().fold(None, |best: Option<&TerritorySummary>, t| match best {
            Some(b) if b.area >= t.area => Some(b),
            _ => Some(t),
        })
    }

    pub fn my_total(&self) -> f64 {
        self.totals.get(&self.viewer).copied().unwrap_or(0.0)
    }
}

fn summarize(t: &Territory, projection: &Projection) -> Option<TerritorySummary> {
    let shape = t.shape(projection);
    let centroid = geometry::centroid(&shape)?;
    let rect = shape.bounding_rect()?;
    Some(TerritorySummary {
        id: t.id,
        owner: t.owner,
        area: t.area,
        centroid: projection.unproject(centroid),
        bounds: (projection.unproject(rect.min()), projection.unproject(rect.max())),
    })
}
