//! Command implementations

mod cluster;
mod config;
mod run;

use crate::cli::{Cli, Commands, LayerSpec};
use crate::output::OutputWriter;
use anyhow::{Context, Result};
use canopy_core::config::LayeredConfig;
use canopy_geo::{resolve_planar_crs, ProjProjector, ReferenceLayer};
use canopy_ingest::load_reference_layer;
use geo::Coord;

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run(args) => run::execute(args, &output, config_path).await,
        Commands::Cluster(args) => cluster::execute(args, &output, config_path),
        Commands::Config => config::execute(&output, config_path),
    }
}

/// Load every `--layer` in argument order
fn load_layers(specs: &[LayerSpec]) -> Result<Vec<ReferenceLayer>> {
    specs
        .iter()
        .map(|spec| {
            load_reference_layer(&spec.path, &spec.name, &spec.field)
                .with_context(|| format!("Failed to load layer '{}'", spec.name))
        })
        .collect()
}

/// Projector for the configured planar CRS, centred on `anchor` in auto mode
fn build_projector(config: &LayeredConfig, anchor: Option<Coord<f64>>) -> Result<ProjProjector> {
    let crs = resolve_planar_crs(config.planar_crs.value, anchor)
        .context("Failed to resolve planar CRS")?;
    tracing::debug!(crs = %crs.authority_code(), "Using planar CRS");
    let projector = ProjProjector::new(crs).context("Failed to initialise projection")?;
    Ok(projector)
}
