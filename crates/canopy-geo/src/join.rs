//! Area-of-interest clipping and point-in-polygon enrichment

use canopy_core::error::{CanopyError, Result};
use canopy_core::models::{AlertRecord, ClusterSummary};
use geo::{BoundingRect, Centroid, Coord, Intersects, LineString, MultiPolygon, Polygon};
use rstar::{RTree, RTreeObject, AABB};
use serde_json::Value;
use std::fmt;

/// Geographic polygon restricting which alerts are processed
#[derive(Debug, Clone)]
pub struct AreaOfInterest {
    polygon: Polygon<f64>,
}

impl AreaOfInterest {
    /// Build from a lon/lat ring. The ring is closed if it is not already.
    pub fn from_ring(ring: &[[f64; 2]]) -> Result<Self> {
        if ring.len() < 3 {
            return Err(CanopyError::ConfigInvalid {
                key: "aoi".to_string(),
                reason: format!("AOI ring needs at least 3 vertices, found {}", ring.len()),
            });
        }
        if ring.iter().flatten().any(|v| !v.is_finite()) {
            return Err(CanopyError::ConfigInvalid {
                key: "aoi".to_string(),
                reason: "AOI ring contains non-finite coordinates".to_string(),
            });
        }

        let exterior: LineString<f64> = ring.iter().map(|[x, y]| (*x, *y)).collect();
        Ok(Self { polygon: Polygon::new(exterior, vec![]) })
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Point-in-polygon test; points on the boundary are inside
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        self.polygon.intersects(&Coord { x: longitude, y: latitude })
    }

    /// Keep the records inside the AOI, preserving order
    pub fn clip(&self, records: Vec<AlertRecord>) -> Vec<AlertRecord> {
        let before = records.len();
        let kept: Vec<AlertRecord> =
            records.into_iter().filter(|r| self.contains(r.longitude, r.latitude)).collect();
        tracing::debug!(before, after = kept.len(), "Clipped alerts to AOI");
        kept
    }

    /// Longitude/latitude centroid, used to pick an automatic planar CRS
    pub fn centroid(&self) -> Option<Coord<f64>> {
        self.polygon.centroid().map(|p| p.0)
    }
}

/// One polygon of a reference layer with its attribute value
#[derive(Debug, Clone)]
pub struct ReferenceFeature {
    pub value: Value,
    pub geometry: MultiPolygon<f64>,
}

struct LayerEntry {
    position: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for LayerEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Polygon layer joined onto alert points by containment.
///
/// Read-only once built.
pub struct ReferenceLayer {
    /// Attribute name written onto records
    pub name: String,

    /// Source property the feature values came from
    pub field: String,

    features: Vec<ReferenceFeature>,
    tree: RTree<LayerEntry>,
}

impl fmt::Debug for ReferenceLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceLayer")
            .field("name", &self.name)
            .field("field", &self.field)
            .field("features", &self.features.len())
            .finish_non_exhaustive()
    }
}

impl ReferenceLayer {
    pub fn new(
        name: impl Into<String>,
        field: impl Into<String>,
        features: Vec<ReferenceFeature>,
    ) -> Self {
        let entries = features
            .iter()
            .enumerate()
            .filter_map(|(position, feature)| {
                let rect = feature.geometry.bounding_rect()?;
                let (min, max) = (rect.min(), rect.max());
                Some(LayerEntry {
                    position,
                    envelope: AABB::from_corners([min.x, min.y], [max.x, max.y]),
                })
            })
            .collect();

        Self { name: name.into(), field: field.into(), features, tree: RTree::bulk_load(entries) }
    }

    pub fn features(&self) -> &[ReferenceFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Value of the first feature (in layer order) containing the point
    pub fn lookup(&self, longitude: f64, latitude: f64) -> Option<&Value> {
        let point = Coord { x: longitude, y: latitude };
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&AABB::from_point([longitude, latitude]))
            .map(|entry| entry.position)
            .collect();
        hits.sort_unstable();

        hits.into_iter()
            .map(|position| &self.features[position])
            .find(|feature| feature.geometry.intersects(&point))
            .map(|feature| &feature.value)
    }
}

/// Write each layer's value onto the records as `attributes[layer.name]`.
///
/// Points outside every polygon of a layer get JSON null.
pub fn enrich(records: &mut [AlertRecord], layers: &[ReferenceLayer]) {
    for layer in layers {
        let mut matched = 0usize;
        for record in records.iter_mut() {
            let value = layer.lookup(record.longitude, record.latitude).cloned();
            if value.is_some() {
                matched += 1;
            }
            record.attributes.insert(layer.name.clone(), value.unwrap_or(Value::Null));
        }
        tracing::info!(layer = %layer.name, records = records.len(), matched, "Enriched alerts");
    }
}

/// Write `cluster_<layer.name>` onto every record from its cluster's centroid.
///
/// `labels[i]` is the position in `summaries` of record `i`'s cluster.
/// Clusters without a centroid get JSON null.
pub fn join_centroids(
    records: &mut [AlertRecord],
    labels: &[usize],
    summaries: &[ClusterSummary],
    layer: &ReferenceLayer,
) {
    let per_cluster: Vec<Value> = summaries
        .iter()
        .map(|summary| {
            summary
                .centroid
                .and_then(|[lon, lat]| layer.lookup(lon, lat).cloned())
                .unwrap_or(Value::Null)
        })
        .collect();

    let key = format!("cluster_{}", layer.name);
    for (record, label) in records.iter_mut().zip(labels) {
        let value = per_cluster.get(*label).cloned().unwrap_or(Value::Null);
        record.attributes.insert(key.clone(), value);
    }
}
