use geo::{BoundingRect, Polygon};
use rstar::{RTree, RTreeObject, AABB};

/// Footprint envelope tagged with the input index of its point
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedFootprint {
    /// Position of the point in the clustering batch
    pub id: usize,

    /// Bounding box for spatial indexing
    envelope: AABB<[f64; 2]>,
}

impl IndexedFootprint {
    /// Envelope entry for a footprint, `None` when it has no bounding box
    pub fn new(id: usize, footprint: &Polygon<f64>) -> Option<Self> {
        compute_envelope(footprint).map(|envelope| Self { id, envelope })
    }
}

impl RTreeObject for IndexedFootprint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Compute the bounding box (envelope) for a footprint
fn compute_envelope(footprint: &Polygon<f64>) -> Option<AABB<[f64; 2]>> {
    let rect = footprint.bounding_rect()?;
    let min = rect.min();
    let max = rect.max();
    if ![min.x, min.y, max.x, max.y].iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(AABB::from_corners([min.x, min.y], [max.x, max.y]))
}

/// Read-only R-tree over footprint envelopes.
///
/// Queries return every footprint whose envelope meets the query envelope,
/// touching edges included, so exact-intersection filtering downstream never
/// misses a neighbour.
pub struct FootprintIndex {
    tree: RTree<IndexedFootprint>,
}

impl FootprintIndex {
    /// Bulk-load an index from `(id, footprint)` pairs.
    ///
    /// Footprints without a finite envelope are left out.
    pub fn build<'a>(footprints: impl IntoIterator<Item = (usize, &'a Polygon<f64>)>) -> Self {
        let indexed: Vec<IndexedFootprint> = footprints
            .into_iter()
            .filter_map(|(id, footprint)| IndexedFootprint::new(id, footprint))
            .collect();

        Self { tree: RTree::bulk_load(indexed) }
    }

    /// Candidate ids whose envelope meets the footprint's envelope
    pub fn query(&self, footprint: &Polygon<f64>) -> Vec<usize> {
        match compute_envelope(footprint) {
            Some(envelope) => self.query_envelope(&envelope),
            None => Vec::new(),
        }
    }

    fn query_envelope(&self, envelope: &AABB<[f64; 2]>) -> Vec<usize> {
        let mut ids: Vec<usize> =
            self.tree.locate_in_envelope_intersecting(envelope).map(|f| f.id).collect();
        // R-tree iteration order depends on the tree layout
        ids.sort_unstable();
        ids
    }

    /// Get the total number of footprints in the index
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
