//! Per-cluster union area and the per-record output rows

use canopy_core::error::{CanopyError, Result};
use canopy_core::models::{AlertRecord, ClusterSummary, ClusteredRecord};
use canopy_geo::{from_planar, GeometryBackend, Projector};
use geo::{MultiPolygon, Polygon};
use std::collections::HashSet;

use crate::engine::Clustering;

const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;

/// Measure every cluster of a clustering pass.
///
/// Area is taken from the exact union of the member footprints, so overlap is
/// counted once; the naive per-footprint sum is kept alongside. Degenerate
/// footprints contribute nothing, and a cluster with no measurable union gets
/// an area of zero.
pub fn aggregate<B: GeometryBackend>(clustering: &Clustering, backend: &B) -> Vec<ClusterSummary> {
    let degenerate: HashSet<usize> = clustering
        .warnings
        .iter()
        .filter_map(|w| match w {
            CanopyError::DegenerateGeometry { index, .. } => Some(*index),
            _ => None,
        })
        .collect();

    let summaries: Vec<ClusterSummary> = clustering
        .clusters
        .iter()
        .map(|cluster| {
            let polygons: Vec<Polygon<f64>> = cluster
                .members
                .iter()
                .filter(|m| !degenerate.contains(*m))
                .filter_map(|m| clustering.footprints.get(*m).cloned())
                .collect();

            let naive: f64 = polygons
                .iter()
                .map(|p| backend.area(&MultiPolygon::new(vec![p.clone()])))
                .sum();

            let union = backend.union_polygons(&polygons);
            let mut area = backend.area(&union);
            if polygons.is_empty() || !area.is_finite() || area <= 0.0 {
                if !polygons.is_empty() {
                    tracing::warn!(cluster = %cluster.id, area, "Degenerate cluster union, area set to 0");
                }
                area = 0.0;
            }

            let area_m2 = round_hundredths(area);
            let naive_area_m2 = round_hundredths(naive);
            if naive_area_m2 > area_m2 {
                tracing::debug!(
                    cluster = %cluster.id,
                    area_m2,
                    naive_area_m2,
                    overlap_m2 = naive_area_m2 - area_m2,
                    "Footprint overlap removed by union"
                );
            }

            ClusterSummary {
                id: cluster.id.clone(),
                members: cluster.members.clone(),
                area_m2,
                area_ha: area_m2 / SQUARE_METERS_PER_HECTARE,
                naive_area_m2,
                planar_centroid: backend.centroid(&union).map(|c| [c.x, c.y]),
                centroid: None,
            }
        })
        .collect();

    let total: f64 = summaries.iter().map(|s| s.area_m2).sum();
    tracing::info!(clusters = summaries.len(), total_area_m2 = total, "Aggregated cluster areas");
    summaries
}

/// Pair every input record with its cluster's identity and measurements.
///
/// Output order and length match `records`.
pub fn attach(
    records: &[AlertRecord],
    clustering: &Clustering,
    summaries: &[ClusterSummary],
) -> Vec<ClusteredRecord> {
    records
        .iter()
        .zip(&clustering.labels)
        .filter_map(|(record, label)| {
            let summary = summaries.get(*label)?;
            Some(ClusteredRecord {
                record: record.clone(),
                cluster_id: summary.id.clone(),
                area_m2: summary.area_m2,
                area_ha: summary.area_ha,
                point_count_in_cluster: summary.point_count(),
            })
        })
        .collect()
}

/// Fill in each summary's longitude/latitude centroid from its planar one
pub fn centroids<P: Projector + ?Sized>(
    summaries: &mut [ClusterSummary],
    projector: &P,
) -> Result<()> {
    for summary in summaries.iter_mut() {
        if let Some([x, y]) = summary.planar_centroid {
            let geographic = from_planar(projector, geo::Coord { x, y })?;
            summary.centroid = Some([geographic.x, geographic.y]);
        }
    }
    Ok(())
}

fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
