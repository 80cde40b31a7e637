// ═══════════════════════════════════════════════════════════════════════
// Core types — identifiers, boundary coordinates, territories
//
// Everything in this module is the *boundary* representation: degrees,
// (lat, lng) order, rings implicitly closed. The planar metre-space
// geometry the engine actually computes on lives in geometry.rs.
// ═══════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};
use std::fmt;

// ── Identifiers ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct UserId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct RouteId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct TerritoryId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user#{}", self.0)
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "route#{}", self.0)
    }
}

impl fmt::Display for TerritoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "territory#{}", self.0)
    }
}

/// Ids start at 1; 0 is never handed out.
impl Default for TerritoryId {
    fn default() -> Self {
        TerritoryId(1)
    }
}

impl TerritoryId {
    pub fn next(self) -> TerritoryId {
        TerritoryId(self.0 + 1)
    }
}

// ── Coordinate ─────────────────────────────────────────────────────────

/// A GPS fix in degrees. Routes arrive on the wire as `[lat, lng]` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Coordinate { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Finite and inside the WGS84 degree ranges.
    pub fn in_range(&self) -> bool {
        self.is_finite() && (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from(pair: [f64; 2]) -> Self {
        Coordinate { lat: pair[0], lng: pair[1] }
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(c: Coordinate) -> Self {
        [c.lat, c.lng]
    }
}

// ── Boundary geometry ──────────────────────────────────────────────────

/// Implicitly closed ring: the last vertex connects back to the first and
/// is *not* repeated.
pub type Ring = Vec<Coordinate>;

/// One polygon: exactly one outer ring, plus any holes left behind when a
/// corridor loop is subtracted from the middle of it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PolygonRings {
    pub exterior: Ring,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub holes: Vec<Ring>,
}

impl PolygonRings {
    pub fn new(exterior: Ring) -> Self {
        PolygonRings { exterior, holes: Vec::new() }
    }
}

/// A (multi)polygon as exchanged with the outside world. Disjoint parts
/// sharing one owner are legal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Region {
    pub polygons: Vec<PolygonRings>,
}

impl Region {
    pub fn single(polygon: PolygonRings) -> Self {
        Region { polygons: vec![polygon] }
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn coordinates(&self) -> impl Iterator<Item = &Coordinate> {
        self.polygons.iter().flat_map(|p| {
            p.exterior.iter().chain(p.holes.iter().flatten())
        })
    }
}

// ── Territory ──────────────────────────────────────────────────────────

/// An owned region with its cached area in square metres.
///
/// Territories are values: settlement never edits one in place, it deletes
/// the old id and inserts a successor. Build them through
/// `Territory::from_shape` so the cached area always matches the geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Territory {
    pub id: TerritoryId,
    pub owner: UserId,
    /// The route that created or most recently extended this territory.
    pub route_id: RouteId,
    pub geometry: Region,
    pub area: f64,
}
