//! Cluster command implementation
//!
//! Clusters a local batch of alerts without fetching or publishing. The whole
//! file is used; no AOI clipping is applied.

use crate::cli::ClusterArgs;
use crate::output::OutputWriter;
use crate::output_types::{ClusterOutput, ClusterRow};
use anyhow::{Context, Result};
use canopy_cluster::{aggregate, attach, centroids, ClusterEngine, ClusterOptions};
use canopy_core::models::AlertRecord;
use canopy_geo::{enrich, join_centroids, to_planar, AreaOfInterest, Projector};
use geo::Coord;
use std::fs;
use std::path::Path;

pub fn execute(args: ClusterArgs, output: &OutputWriter, config_path: Option<&Path>) -> Result<()> {
    let config = crate::config_loader::load_config_with_overrides(
        config_path,
        args.settings.into_overrides(),
    )?;

    let content = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let mut records: Vec<AlertRecord> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of alert records", args.input.display()))?;

    let options = ClusterOptions {
        shape: config.footprint().context("Invalid footprint settings")?,
        scope: config.scope_key.value.clone(),
    };

    // Phase 1: Enrichment
    let layers = super::load_layers(&args.layers)?;
    enrich(&mut records, &layers);

    // Phase 2: Projection, anchored on the batch itself in auto mode
    let anchor = batch_center(&records).or_else(|| {
        AreaOfInterest::from_ring(&config.aoi.value).ok().and_then(|aoi| aoi.centroid())
    });
    let projector = super::build_projector(&config, anchor)?;
    let planar = to_planar(&records, &projector)?;

    // Phase 3: Clustering and area
    let engine = ClusterEngine::new(options);
    let clustering = engine.cluster(&planar, &records)?;
    let mut summaries = aggregate(&clustering, engine.backend());
    centroids(&mut summaries, &projector)?;

    for layer in &layers {
        join_centroids(&mut records, &clustering.labels, &summaries, layer);
    }

    let rows = attach(&records, &clustering, &summaries);
    let clusters: Vec<ClusterRow> = summaries.iter().map(ClusterRow::from).collect();
    let total_area_m2: f64 = summaries.iter().map(|s| s.area_m2).sum();
    let warnings: Vec<String> = clustering.warnings.iter().map(|w| w.to_string()).collect();
    let planar_crs = projector.planar_crs().authority_code();

    if output.is_json() {
        output.result(ClusterOutput {
            input: args.input.display().to_string(),
            planar_crs,
            alerts: records.len(),
            total_area_m2,
            stats: clustering.stats,
            warnings,
            clusters,
            rows: args.rows.then_some(rows),
        })?;
        return Ok(());
    }

    for warning in &warnings {
        output.warning(warning);
    }

    output.section("Clustering");
    output.kv("Input", args.input.display());
    output.kv("Planar CRS", &planar_crs);
    output.kv("Alerts", records.len());
    output.kv("Clusters", summaries.len());
    output.kv(
        "Total area",
        format!("{:.2} m² ({:.4} ha)", total_area_m2, total_area_m2 / 10_000.0),
    );

    if args.rows {
        output.section("Rows");
        output.result(&rows)?;
    } else {
        output.section("Clusters");
        output.table(clusters);
    }

    Ok(())
}

/// Mean longitude/latitude of the batch
fn batch_center(records: &[AlertRecord]) -> Option<Coord<f64>> {
    if records.is_empty() {
        return None;
    }
    let n = records.len() as f64;
    let (lon, lat) = records
        .iter()
        .fold((0.0, 0.0), |(lon, lat), r| (lon + r.longitude, lat + r.latitude));
    Some(Coord { x: lon / n, y: lat / n })
}
