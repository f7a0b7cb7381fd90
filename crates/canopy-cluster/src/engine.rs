//! Connected components of alert footprints under touch/overlap adjacency

use canopy_core::error::{CanopyError, Result};
use canopy_core::models::{render_scope, AlertRecord, ClusterId, FootprintShape, ScopeKey};
use canopy_geo::{validate_footprint, GeoBackend, GeometryBackend};
use geo::{Coord, Polygon};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::dsu::DisjointSet;

/// Clustering parameters
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClusterOptions {
    pub shape: FootprintShape,
    pub scope: ScopeKey,
}

/// One connected component
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: ClusterId,

    /// Input indices, ascending
    pub members: Vec<usize>,
}

/// Counters describing one clustering pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClusterStats {
    /// Envelope-intersecting pairs returned by the index
    pub candidate_pairs: usize,

    /// Candidate pairs confirmed by the exact intersection test
    pub verified_pairs: usize,

    pub index_overflows: usize,
    pub degenerate_footprints: usize,
}

/// Result of one clustering pass.
///
/// `labels[i]` is the position in `clusters` of point `i`'s cluster.
#[derive(Debug, Default)]
pub struct Clustering {
    pub labels: Vec<usize>,
    pub clusters: Vec<Cluster>,
    pub footprints: Vec<Polygon<f64>>,

    /// Non-fatal problems; every point still has a cluster
    pub warnings: Vec<CanopyError>,

    pub stats: ClusterStats,
}

impl Clustering {
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Cluster of input point `index`
    pub fn cluster_of(&self, index: usize) -> Option<&Cluster> {
        self.labels.get(index).and_then(|label| self.clusters.get(*label))
    }
}

/// Groups alert footprints into connected components.
///
/// Two points are adjacent when their footprints intersect (shared boundary
/// included) and, if a scope key is set, they share its value. Clusters are
/// the transitive closure of that relation.
pub struct ClusterEngine<B: GeometryBackend = GeoBackend> {
    options: ClusterOptions,
    backend: B,
}

impl ClusterEngine<GeoBackend> {
    pub fn new(options: ClusterOptions) -> Self {
        Self::with_backend(options, GeoBackend)
    }
}

impl<B: GeometryBackend> ClusterEngine<B> {
    pub fn with_backend(options: ClusterOptions, backend: B) -> Self {
        Self { options, backend }
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Cluster planar points.
    ///
    /// `points[i]` is the projected position of `records[i]`; records are
    /// only read for scope values. Fails only when the two slices disagree in
    /// length.
    pub fn cluster(&self, points: &[Coord<f64>], records: &[AlertRecord]) -> Result<Clustering> {
        if points.len() != records.len() {
            return Err(CanopyError::InvalidGeometry {
                feature_id: "batch".to_string(),
                reason: format!("{} planar points for {} records", points.len(), records.len()),
            });
        }
        if points.is_empty() {
            tracing::debug!("No points to cluster");
            return Ok(Clustering::default());
        }

        let mut stats = ClusterStats::default();
        let mut warnings = Vec::new();

        let footprints: Vec<Polygon<f64>> =
            points.iter().map(|p| self.backend.buffer(*p, &self.options.shape)).collect();

        let mut usable = vec![true; footprints.len()];
        for (index, footprint) in footprints.iter().enumerate() {
            let validation = validate_footprint(footprint);
            if !validation.is_valid {
                let reason = validation.summary().unwrap_or_else(|| "invalid footprint".to_string());
                tracing::warn!(index, %reason, "Degenerate footprint, point kept as a singleton");
                usable[index] = false;
                stats.degenerate_footprints += 1;
                warnings.push(CanopyError::DegenerateGeometry { index, reason });
            }
        }

        let groups = self.partition(records);
        let mut dsu = DisjointSet::new(points.len());

        for (scope, members) in &groups {
            let valid: Vec<usize> = members.iter().copied().filter(|i| usable[*i]).collect();
            let index = self.backend.build_index(valid.iter().map(|i| (*i, &footprints[*i])));

            for &i in &valid {
                let candidates = self.backend.query(&index, &footprints[i]);
                if candidates.len() > valid.len() {
                    tracing::warn!(
                        index = i,
                        scope = %render_scope(scope),
                        candidates = candidates.len(),
                        group_size = valid.len(),
                        "Index returned more candidates than the group holds"
                    );
                    stats.index_overflows += 1;
                }

                for j in candidates.into_iter().filter(|j| *j > i) {
                    stats.candidate_pairs += 1;
                    if self.backend.intersects(&footprints[i], &footprints[j]) {
                        stats.verified_pairs += 1;
                        dsu.union(i, j);
                    }
                }
            }
        }

        let (labels, clusters) = self.label(&mut dsu, records);

        tracing::info!(
            points = points.len(),
            clusters = clusters.len(),
            scopes = groups.len(),
            candidate_pairs = stats.candidate_pairs,
            verified_pairs = stats.verified_pairs,
            "Clustered alerts"
        );

        Ok(Clustering { labels, clusters, footprints, warnings, stats })
    }

    /// Input indices per scope. Unscoped runs form a single group.
    fn partition(&self, records: &[AlertRecord]) -> BTreeMap<Vec<String>, Vec<usize>> {
        let mut groups: BTreeMap<Vec<String>, Vec<usize>> = BTreeMap::new();
        for (i, record) in records.iter().enumerate() {
            let scope = self.options.scope.scope_of(record).unwrap_or_default();
            groups.entry(scope).or_default().push(i);
        }
        groups
    }

    /// Turn DSU components into labelled clusters, numbered in order of each
    /// cluster's lowest input index (per scope when scoped)
    fn label(&self, dsu: &mut DisjointSet, records: &[AlertRecord]) -> (Vec<usize>, Vec<Cluster>) {
        let components = dsu.components();
        let mut labels = vec![0usize; dsu.len()];
        let mut next_in_scope: HashMap<Vec<String>, u32> = HashMap::new();
        let mut clusters = Vec::with_capacity(components.len());

        for (position, members) in components.into_iter().enumerate() {
            let id = match self.options.scope.scope_of(&records[members[0]]) {
                None => ClusterId::Sequence(position as u32 + 1),
                Some(scope) => {
                    let counter = next_in_scope.entry(scope.clone()).or_insert(0);
                    *counter += 1;
                    ClusterId::Scoped { scope, sequence: *counter }
                }
            };

            for &m in &members {
                labels[m] = position;
            }
            clusters.push(Cluster { id, members });
        }

        (labels, clusters)
    }
}
