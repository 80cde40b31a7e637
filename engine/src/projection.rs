// ═══════════════════════════════════════════════════════════════════════
// Projection — degrees at the boundary, planar metres inside
//
// The engine treats a small operating area as flat. Internally every
// coordinate is (x = metres east, y = metres north) under a fixed
// equirectangular scale taken at the configured reference latitude.
// Conversion happens only here, at the edge.
// ═══════════════════════════════════════════════════════════════════════

use crate::geometry::Shape;
use crate::types::{Coordinate, PolygonRings, Region, Ring};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub meters_per_degree_lat: f64,
    pub meters_per_degree_lng: f64,
}

impl Projection {
    pub fn for_latitude(reference_latitude: f64, meters_per_degree: f64) -> Self {
        Projection {
            meters_per_degree_lat: meters_per_degree,
            meters_per_degree_lng: meters_per_degree * reference_latitude.to_radians().cos(),
        }
    }

    pub fn project(&self, c: Coordinate) -> Coord<f64> {
        Coord {
            x: c.lng * self.meters_per_degree_lng,
            y: c.lat * self.meters_per_degree_lat,
        }
    }

    pub fn unproject(&self, c: Coord<f64>) -> Coordinate {
        Coordinate {
            lat: c.y / self.meters_per_degree_lat,
            lng: c.x / self.meters_per_degree_lng,
        }
    }

    /// Move `origin` by a metre offset, east and north positive.
    pub fn shift(&self, origin: Coordinate, east_m: f64, north_m: f64) -> Coordinate {
        let p = self.project(origin);
        self.unproject(Coord { x: p.x + east_m, y: p.y + north_m })
    }

    /// Planar distance between two fixes.
    pub fn distance_m(&self, a: Coordinate, b: Coordinate) -> f64 {
        let (pa, pb) = (self.project(a), self.project(b));
        (pb.x - pa.x).hypot(pb.y - pa.y)
    }

    pub fn project_line(&self, coords: &[Coordinate]) -> Vec<Coord<f64>> {
        coords.iter().map(|&c| self.project(c)).collect()
    }

    pub fn shape_from_region(&self, region: &Region) -> Shape {
        let polygons = region.polygons.iter()
            .map(|p| {
                let exterior = LineString::new(self.project_line(&p.exterior));
                let holes = p.holes.iter()
                    .map(|h| LineString::new(self.project_line(h)))
                    .collect();
                // Polygon::new closes open rings
                Polygon::new(exterior, holes)
            })
            .collect();
        Shape::from_multi(MultiPolygon::new(polygons))
    }

    pub fn region_from_shape(&self, shape: &Shape) -> Region {
        let polygons = shape.polygons().iter()
            .map(|p| PolygonRings {
                exterior: self.open_ring(p.exterior()),
                holes: p.interiors().iter().map(|h| self.open_ring(h)).collect(),
            })
            .collect();
        Region { polygons }
    }

    /// Unproject a geo ring, dropping the repeated closing vertex.
    fn open_ring(&self, ring: &LineString<f64>) -> Ring {
        let coords = &ring.0;
        let len = match (coords.first(), coords.last()) {
            (Some(first), Some(last)) if coords.len() > 1 && first == last => coords.len() - 1,
            _ => coords.len(),
        };
        coords[..len].iter().map(|&c| self.unproject(c)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longitude_scale_shrinks_with_latitude() {
        let equator = Projection::for_latitude(0.0, 111_320.0);
        let madrid = Projection::for_latitude(40.4168, 111_320.0);
        assert!((equator.meters_per_degree_lng - 111_320.0).abs() < 1e-9);
        assert!(madrid.meters_per_degree_lng < 85_000.0);
        assert!(madrid.meters_per_degree_lng > 84_000.0);
    }

    #[test]
    fn shift_uses_the_configured_scale() {
        let origin = Coordinate::new(40.0, -3.0);
        let nominal = Projection::for_latitude(40.0, 111_320.0);
        let stretched = Projection::for_latitude(40.0, 120_000.0);
        let a = nominal.shift(origin, 0.0, 1_000.0);
        let b = stretched.shift(origin, 0.0, 1_000.0);
        assert!((nominal.distance_m(origin, a) - 1_000.0).abs() < 1e-6);
        assert!((stretched.distance_m(origin, b) - 1_000.0).abs() < 1e-6);
        assert!(b.lat < a.lat);
    }

    #[test]
    fn region_round_trip_strips_closing_vertex() {
        let proj = Projection::for_latitude(40.0, 111_320.0);
        let ring = vec![
            Coordinate::new(40.0, -3.0),
            Coordinate::new(40.0, -2.999),
            Coordinate::new(40.001, -2.999),
        ];
        let region = Region::single(PolygonRings::new(ring.clone()));
        let back = proj.region_from_shape(&proj.shape_from_region(&region));
        assert_eq!(back.polygons.len(), 1);
        assert_eq!(back.polygons[0].exterior.len(), 3);
        for (a, b) in ring.iter().zip(&back.polygons[0].exterior) {
            assert!((a.lat - b.lat).abs() < 1e-12);
            assert!((a.lng - b.lng).abs() < 1e-12);
        }
    }
}
