use canopy_core::config::{parse_publish_mode, parse_shape_kind, CliConfigOverrides};
use canopy_core::models::{PlanarCrsStrategy, PublishMode, ScopeKey, ShapeKind};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Canopy - Deforestation alert clustering
#[derive(Parser, Debug)]
#[command(name = "canopy")]
#[command(about = "Cluster deforestation alerts and publish their disturbed area", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to ./canopy.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch alerts, cluster them and publish the table
    Run(RunArgs),

    /// Cluster alerts from a local JSON file
    Cluster(ClusterArgs),

    /// Show the effective configuration and where each value came from
    Config,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// First alert date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub start: NaiveDate,

    /// Last alert date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub end: NaiveDate,

    /// Reference layer as name=path:field (repeatable)
    #[arg(long = "layer", value_parser = parse_layer_spec)]
    pub layers: Vec<LayerSpec>,

    /// Publish to an in-memory sheet instead of the spreadsheet
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

#[derive(Parser, Debug)]
pub struct ClusterArgs {
    /// JSON file holding an array of alert records
    pub input: PathBuf,

    /// Reference layer as name=path:field (repeatable)
    #[arg(long = "layer", value_parser = parse_layer_spec)]
    pub layers: Vec<LayerSpec>,

    /// Print one row per alert instead of one per cluster
    #[arg(long)]
    pub rows: bool,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

/// Overrides shared by the commands that cluster
#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    /// Planar CRS: "auto" or an EPSG code
    #[arg(long)]
    pub planar_crs: Option<PlanarCrsStrategy>,

    /// Footprint shape (square or circle)
    #[arg(long, value_parser = parse_shape_kind)]
    pub shape: Option<ShapeKind>,

    /// Footprint size in meters (side for squares, radius for circles)
    #[arg(long)]
    pub size: Option<f64>,

    /// Attribute(s) clusters must share, e.g. owner or owner+observed_at
    #[arg(long)]
    pub scope: Option<ScopeKey>,

    /// Target spreadsheet id
    #[arg(long)]
    pub spreadsheet_id: Option<String>,

    /// Target sheet name
    #[arg(long)]
    pub sheet: Option<String>,

    /// Publish mode (overwrite or append)
    #[arg(long, value_parser = parse_publish_mode)]
    pub mode: Option<PublishMode>,

    /// Skip rows already present in the sheet (append mode)
    #[arg(long)]
    pub dedup: bool,
}

impl SettingsArgs {
    pub fn into_overrides(self) -> CliConfigOverrides {
        CliConfigOverrides {
            planar_crs: self.planar_crs,
            footprint_shape: self.shape,
            footprint_size_m: self.size,
            scope_key: self.scope,
            spreadsheet_id: self.spreadsheet_id,
            sheet_name: self.sheet,
            publish_mode: self.mode,
            dedup: self.dedup.then_some(true),
        }
    }
}

/// A `--layer` argument
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    /// Attribute written onto each alert
    pub name: String,
    pub path: PathBuf,
    /// Feature property holding the value
    pub field: String,
}

fn parse_layer_spec(s: &str) -> Result<LayerSpec, String> {
    let (name, rest) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected name=path:field, found '{}'", s))?;
    // Split on the last colon so drive letters survive
    let (path, field) = rest
        .rsplit_once(':')
        .ok_or_else(|| format!("Missing :field in layer '{}'", s))?;

    if name.is_empty() || path.is_empty() || field.is_empty() {
        return Err(format!("Layer '{}' has an empty name, path or field", s));
    }

    Ok(LayerSpec { name: name.to_string(), path: PathBuf::from(path), field: field.to_string() })
}
