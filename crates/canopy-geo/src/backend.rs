//! Geometry capabilities the clustering engine and area aggregator depend on

use crate::footprint::footprint_of;
use crate::index::FootprintIndex;
use canopy_core::models::FootprintShape;
use geo::{unary_union, Area, Centroid, Coord, Intersects, MultiPolygon, Polygon};

/// Candidate lookup over a set of footprints
pub trait CandidateIndex {
    /// Ids whose bounding boxes meet the footprint's bounding box
    fn candidates(&self, footprint: &Polygon<f64>) -> Vec<usize>;

    /// Number of indexed footprints
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CandidateIndex for FootprintIndex {
    fn candidates(&self, footprint: &Polygon<f64>) -> Vec<usize> {
        self.query(footprint)
    }

    fn len(&self) -> usize {
        FootprintIndex::len(self)
    }
}

/// Planar geometry operations used by clustering and aggregation.
///
/// Implementations must treat touching boundaries as intersecting and must
/// tolerate multi-part unions.
pub trait GeometryBackend {
    type Index: CandidateIndex;

    /// Footprint polygon around a planar point
    fn buffer(&self, center: Coord<f64>, shape: &FootprintShape) -> Polygon<f64>;

    /// Build a candidate index over `(id, footprint)` pairs
    fn build_index<'a>(
        &self,
        footprints: impl IntoIterator<Item = (usize, &'a Polygon<f64>)>,
    ) -> Self::Index;

    fn query(&self, index: &Self::Index, footprint: &Polygon<f64>) -> Vec<usize> {
        index.candidates(footprint)
    }

    /// Exact test, boundary contact included
    fn intersects(&self, a: &Polygon<f64>, b: &Polygon<f64>) -> bool;

    /// Dissolve polygons into one (possibly multi-part) geometry
    fn union_polygons(&self, polygons: &[Polygon<f64>]) -> MultiPolygon<f64>;

    /// Planar area in square units of the CRS
    fn area(&self, geometry: &MultiPolygon<f64>) -> f64;

    fn centroid(&self, geometry: &MultiPolygon<f64>) -> Option<Coord<f64>>;
}

/// Default backend built on `geo` and `rstar`
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoBackend;

impl GeometryBackend for GeoBackend {
    type Index = FootprintIndex;

    fn buffer(&self, center: Coord<f64>, shape: &FootprintShape) -> Polygon<f64> {
        footprint_of(center, shape)
    }

    fn build_index<'a>(
        &self,
        footprints: impl IntoIterator<Item = (usize, &'a Polygon<f64>)>,
    ) -> Self::Index {
        FootprintIndex::build(footprints)
    }

    fn intersects(&self, a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
        a.intersects(b)
    }

    fn union_polygons(&self, polygons: &[Polygon<f64>]) -> MultiPolygon<f64> {
        match polygons {
            [] => MultiPolygon::new(vec![]),
            [single] => MultiPolygon::new(vec![single.clone()]),
            many => unary_union(many.iter()),
        }
    }

    fn area(&self, geometry: &MultiPolygon<f64>) -> f64 {
        geometry.unsigned_area()
    }

    fn centroid(&self, geometry: &MultiPolygon<f64>) -> Option<Coord<f64>> {
        geometry.centroid().map(|p| p.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Boolean ops snap vertices, so union results drift slightly
    const TOLERANCE: f64 = 1e-3;

    fn square(x: f64, y: f64) -> Polygon<f64> {
        GeoBackend.buffer(Coord { x, y }, &FootprintShape::square(11.2))
    }

    #[test]
    fn test_touching_squares_intersect() {
        let backend = GeoBackend;
        assert!(backend.intersects(&square(0.0, 0.0), &square(11.2, 0.0)));
        assert!(backend.intersects(&square(0.0, 0.0), &square(11.2, 11.2)));
        assert!(!backend.intersects(&square(0.0, 0.0), &square(11.3, 0.0)));
    }

    #[test]
    fn test_union_of_overlapping_squares() {
        let backend = GeoBackend;
        let union = backend.union_polygons(&[square(0.0, 0.0), square(5.0, 0.0)]);

        // 16.2 x 11.2
        assert!((backend.area(&union) - 181.44).abs() < TOLERANCE);
    }

    #[test]
    fn test_union_of_identical_squares() {
        let backend = GeoBackend;
        let union = backend.union_polygons(&[square(3.0, 3.0), square(3.0, 3.0)]);

        assert!((backend.area(&union) - 125.44).abs() < TOLERANCE);
    }

    #[test]
    fn test_union_tolerates_disjoint_parts() {
        let backend = GeoBackend;
        let union = backend.union_polygons(&[square(0.0, 0.0), square(100.0, 0.0)]);

        assert_eq!(union.0.len(), 2);
        assert!((backend.area(&union) - 250.88).abs() < TOLERANCE);
    }

    #[test]
    fn test_empty_union() {
        let backend = GeoBackend;
        let union = backend.union_polygons(&[]);

        assert_eq!(backend.area(&union), 0.0);
        assert!(backend.centroid(&union).is_none());
    }

    #[test]
    fn test_centroid_of_union() {
        let backend = GeoBackend;
        let union = backend.union_polygons(&[square(0.0, 0.0), square(10.0, 0.0)]);
        let centroid = backend.centroid(&union).unwrap();

        assert!((centroid.x - 5.0).abs() < TOLERANCE);
        assert!(centroid.y.abs() < TOLERANCE);
    }

    #[test]
    fn test_index_through_backend() {
        let backend = GeoBackend;
        let footprints = vec![square(0.0, 0.0), square(8.0, 0.0), square(50.0, 0.0)];
        let index = backend.build_index(footprints.iter().enumerate());

        assert_eq!(CandidateIndex::len(&index), 3);
        assert_eq!(backend.query(&index, &footprints[1]), vec![0, 1]);
    }
}
