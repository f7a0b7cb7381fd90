//! Run command implementation

use crate::cli::RunArgs;
use crate::output::OutputWriter;
use crate::output_types::{ClusterRow, RunOutput};
use anyhow::{bail, Context, Result};
use canopy_cluster::{AlertPipeline, ClusterOptions, PipelineOptions, RunReport};
use canopy_core::config::LayeredConfig;
use canopy_core::models::AlertQuery;
use canopy_core::ports::{AlertSource, SheetBackend};
use canopy_geo::{AreaOfInterest, ProjProjector, Projector, ReferenceLayer};
use canopy_ingest::GfwAlertSource;
use canopy_publish::{GoogleSheets, MemorySheets, Publisher};
use std::path::Path;

pub async fn execute(args: RunArgs, output: &OutputWriter, config_path: Option<&Path>) -> Result<()> {
    if args.start > args.end {
        bail!("--start {} is after --end {}", args.start, args.end);
    }

    let config = crate::config_loader::load_config_with_overrides(
        config_path,
        args.settings.into_overrides(),
    )?;
    config.validate_aoi().context("Invalid area of interest")?;
    let api_key = LayeredConfig::require(&config.alerts_api_key, "alerts_api_key")
        .context("Set CANOPY_API_KEY to query the alerts API")?;

    let options = PipelineOptions {
        cluster: ClusterOptions {
            shape: config.footprint().context("Invalid footprint settings")?,
            scope: config.scope_key.value.clone(),
        },
        publish_mode: config.publish_mode.value,
        dedup: config.dedup.value,
    };

    let aoi = AreaOfInterest::from_ring(&config.aoi.value)?;
    let projector = super::build_projector(&config, aoi.centroid())?;
    let planar_crs = projector.planar_crs().authority_code();
    let layers = super::load_layers(&args.layers)?;

    let source = GfwAlertSource::new(
        config.alerts_api_url.value.as_str(),
        config.alerts_dataset.value.as_str(),
        api_key,
    );

    let query = AlertQuery { aoi: config.aoi.value.clone(), start: args.start, end: args.end };

    // Phase 1: Pick the sheet backend and run
    let report = if args.dry_run {
        let publisher = Publisher::new(
            MemorySheets::new(),
            config.sheet_name.value.as_str(),
            config.log_sheet_name.value.as_str(),
        );
        run_pipeline(source, publisher, projector, layers, options, &query).await?
    } else {
        let spreadsheet_id = LayeredConfig::require(&config.spreadsheet_id, "spreadsheet_id")
            .context("Set spreadsheet_id in canopy.toml, CANOPY_SPREADSHEET_ID or --spreadsheet-id")?;
        let token = LayeredConfig::require(&config.sheets_token, "sheets_token")
            .context("Set CANOPY_SHEETS_TOKEN to publish")?;
        let publisher = Publisher::new(
            GoogleSheets::new(spreadsheet_id, token),
            config.sheet_name.value.as_str(),
            config.log_sheet_name.value.as_str(),
        );
        run_pipeline(source, publisher, projector, layers, options, &query).await?
    };

    // Phase 2: Report
    let clusters: Vec<ClusterRow> = report.summaries.iter().map(ClusterRow::from).collect();

    if output.is_json() {
        output.result(RunOutput {
            dry_run: args.dry_run,
            start: args.start,
            end: args.end,
            planar_crs,
            fetched: report.fetched,
            in_aoi: report.in_aoi,
            total_area_m2: report.total_area_m2(),
            stats: report.stats,
            warnings: report.warnings.clone(),
            clusters,
            publish: report.publish.clone(),
        })?;
    } else {
        for warning in &report.warnings {
            output.warning(warning);
        }

        output.section("Run Summary");
        output.kv("Window", format!("{} to {}", args.start, args.end));
        output.kv("Planar CRS", &planar_crs);
        output.kv("Alerts fetched", report.fetched);
        output.kv("Inside AOI", report.in_aoi);
        output.kv("Clusters", report.summaries.len());
        let total = report.total_area_m2();
        output.kv("Total area", format!("{:.2} m² ({:.4} ha)", total, total / 10_000.0));

        match &report.publish {
            Some(publish) => {
                output.kv("Rows written", publish.rows_written);
                output.kv("Rows skipped", publish.rows_skipped);
                if args.dry_run {
                    output.info("Dry run: rows were published to an in-memory sheet only");
                } else {
                    output.success(format!("Published to sheet '{}'", config.sheet_name.value));
                }
            }
            None => output.info("No alerts inside the AOI, nothing published"),
        }

        output.section("Clusters");
        output.table(clusters);
    }

    Ok(())
}

async fn run_pipeline<S, B>(
    source: S,
    publisher: Publisher<B>,
    projector: ProjProjector,
    layers: Vec<ReferenceLayer>,
    options: PipelineOptions,
    query: &AlertQuery,
) -> Result<RunReport>
where
    S: AlertSource,
    B: SheetBackend,
{
    let pipeline = AlertPipeline::new(source, publisher, projector, layers, options);
    let report = pipeline.execute(query).await.context("Pipeline run failed")?;
    Ok(report)
}
