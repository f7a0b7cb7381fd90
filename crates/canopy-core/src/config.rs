use crate::error::{CanopyError, Result};
use crate::models::{FootprintShape, PlanarCrsStrategy, PublishMode, ScopeKey, ShapeKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Default area of interest: the monitored concession block in West Kalimantan
pub const DEFAULT_AOI: [[f64; 2]; 5] = [
    [110.15497, 0.67329],
    [110.38332, 0.67329],
    [110.38332, 0.91435],
    [110.15497, 0.91435],
    [110.15497, 0.67329],
];

/// Layered configuration for Canopy
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub planar_crs: ConfigValue<PlanarCrsStrategy>,
    pub footprint_shape: ConfigValue<ShapeKind>,
    pub footprint_size_m: ConfigValue<f64>,
    pub circle_segments: ConfigValue<usize>,
    pub scope_key: ConfigValue<ScopeKey>,
    pub aoi: ConfigValue<Vec<[f64; 2]>>,
    pub alerts_api_url: ConfigValue<String>,
    pub alerts_dataset: ConfigValue<String>,
    pub alerts_api_key: ConfigValue<Option<String>>,
    pub spreadsheet_id: ConfigValue<Option<String>>,
    pub sheets_token: ConfigValue<Option<String>>,
    pub sheet_name: ConfigValue<String>,
    pub log_sheet_name: ConfigValue<String>,
    pub publish_mode: ConfigValue<PublishMode>,
    pub dedup: ConfigValue<bool>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            planar_crs: ConfigValue::new(PlanarCrsStrategy::default(), ConfigSource::Default),
            footprint_shape: ConfigValue::new(ShapeKind::Square, ConfigSource::Default),
            footprint_size_m: ConfigValue::new(11.2, ConfigSource::Default),
            circle_segments: ConfigValue::new(
                FootprintShape::DEFAULT_SEGMENTS,
                ConfigSource::Default,
            ),
            scope_key: ConfigValue::new(ScopeKey::None, ConfigSource::Default),
            aoi: ConfigValue::new(DEFAULT_AOI.to_vec(), ConfigSource::Default),
            alerts_api_url: ConfigValue::new(
                "https://data-api.globalforestwatch.org".to_string(),
                ConfigSource::Default,
            ),
            alerts_dataset: ConfigValue::new(
                "wur_radd_alerts".to_string(),
                ConfigSource::Default,
            ),
            alerts_api_key: ConfigValue::new(None, ConfigSource::Default),
            spreadsheet_id: ConfigValue::new(None, ConfigSource::Default),
            sheets_token: ConfigValue::new(None, ConfigSource::Default),
            sheet_name: ConfigValue::new("Sheet1".to_string(), ConfigSource::Default),
            log_sheet_name: ConfigValue::new("log".to_string(), ConfigSource::Default),
            publish_mode: ConfigValue::new(PublishMode::Overwrite, ConfigSource::Default),
            dedup: ConfigValue::new(false, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| CanopyError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| CanopyError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(planar_crs) = file_config.planar_crs {
            self.planar_crs.update(planar_crs, ConfigSource::File);
        }
        if let Some(shape) = file_config.footprint_shape {
            self.footprint_shape.update(shape, ConfigSource::File);
        }
        if let Some(size) = file_config.footprint_size_m {
            self.footprint_size_m.update(size, ConfigSource::File);
        }
        if let Some(segments) = file_config.circle_segments {
            self.circle_segments.update(segments, ConfigSource::File);
        }
        if let Some(scope_key) = file_config.scope_key {
            self.scope_key.update(scope_key, ConfigSource::File);
        }
        if let Some(aoi) = file_config.aoi {
            self.aoi.update(aoi, ConfigSource::File);
        }
        if let Some(url) = file_config.alerts_api_url {
            self.alerts_api_url.update(url, ConfigSource::File);
        }
        if let Some(dataset) = file_config.alerts_dataset {
            self.alerts_dataset.update(dataset, ConfigSource::File);
        }
        if let Some(spreadsheet_id) = file_config.spreadsheet_id {
            self.spreadsheet_id.update(Some(spreadsheet_id), ConfigSource::File);
        }
        if let Some(sheet_name) = file_config.sheet_name {
            self.sheet_name.update(sheet_name, ConfigSource::File);
        }
        if let Some(log_sheet_name) = file_config.log_sheet_name {
            self.log_sheet_name.update(log_sheet_name, ConfigSource::File);
        }
        if let Some(mode) = file_config.publish_mode {
            self.publish_mode.update(mode, ConfigSource::File);
        }
        if let Some(dedup) = file_config.dedup {
            self.dedup.update(dedup, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        // CANOPY_PLANAR_CRS
        if let Ok(crs_str) = env::var("CANOPY_PLANAR_CRS") {
            match crs_str.parse::<PlanarCrsStrategy>() {
                Ok(crs) => self.planar_crs.update(crs, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid CANOPY_PLANAR_CRS value '{}': expected 'auto' or an EPSG code",
                    crs_str
                ),
            }
        }

        // CANOPY_FOOTPRINT_SHAPE
        if let Ok(shape_str) = env::var("CANOPY_FOOTPRINT_SHAPE") {
            match parse_shape_kind(&shape_str) {
                Ok(shape) => self.footprint_shape.update(shape, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid CANOPY_FOOTPRINT_SHAPE value '{}': expected square or circle",
                    shape_str
                ),
            }
        }

        // CANOPY_FOOTPRINT_SIZE_M
        if let Ok(size_str) = env::var("CANOPY_FOOTPRINT_SIZE_M") {
            match size_str.parse::<f64>() {
                Ok(size) => self.footprint_size_m.update(size, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid CANOPY_FOOTPRINT_SIZE_M value '{}': expected meters",
                    size_str
                ),
            }
        }

        // CANOPY_CIRCLE_SEGMENTS
        if let Ok(segments_str) = env::var("CANOPY_CIRCLE_SEGMENTS") {
            match segments_str.parse::<usize>() {
                Ok(segments) => self.circle_segments.update(segments, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid CANOPY_CIRCLE_SEGMENTS value '{}': expected integer",
                    segments_str
                ),
            }
        }

        // CANOPY_SCOPE_KEY
        if let Ok(scope_str) = env::var("CANOPY_SCOPE_KEY") {
            match scope_str.parse::<ScopeKey>() {
                Ok(scope) => self.scope_key.update(scope, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid CANOPY_SCOPE_KEY value '{}': expected none, an attribute, or a+b",
                    scope_str
                ),
            }
        }

        if let Ok(url) = env::var("CANOPY_API_URL") {
            self.alerts_api_url.update(url, ConfigSource::Environment);
        }

        if let Ok(dataset) = env::var("CANOPY_DATASET") {
            self.alerts_dataset.update(dataset, ConfigSource::Environment);
        }

        // Secrets are only ever read from the environment
        if let Ok(api_key) = env::var("CANOPY_API_KEY") {
            self.alerts_api_key.update(Some(api_key), ConfigSource::Environment);
        }

        if let Ok(token) = env::var("CANOPY_SHEETS_TOKEN") {
            self.sheets_token.update(Some(token), ConfigSource::Environment);
        }

        if let Ok(spreadsheet_id) = env::var("CANOPY_SPREADSHEET_ID") {
            self.spreadsheet_id.update(Some(spreadsheet_id), ConfigSource::Environment);
        }

        if let Ok(sheet_name) = env::var("CANOPY_SHEET_NAME") {
            self.sheet_name.update(sheet_name, ConfigSource::Environment);
        }

        if let Ok(log_sheet_name) = env::var("CANOPY_LOG_SHEET") {
            self.log_sheet_name.update(log_sheet_name, ConfigSource::Environment);
        }

        // CANOPY_PUBLISH_MODE
        if let Ok(mode_str) = env::var("CANOPY_PUBLISH_MODE") {
            match parse_publish_mode(&mode_str) {
                Ok(mode) => self.publish_mode.update(mode, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid CANOPY_PUBLISH_MODE value '{}': expected overwrite or append",
                    mode_str
                ),
            }
        }

        // CANOPY_DEDUP
        if let Ok(dedup_str) = env::var("CANOPY_DEDUP") {
            match parse_bool(&dedup_str) {
                Ok(dedup) => self.dedup.update(dedup, ConfigSource::Environment),
                Err(_) => {
                    tracing::warn!("Invalid CANOPY_DEDUP value '{}': expected true or false", dedup_str)
                }
            }
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(planar_crs) = overrides.planar_crs {
            self.planar_crs.update(planar_crs, ConfigSource::Cli);
        }

        if let Some(shape) = overrides.footprint_shape {
            self.footprint_shape.update(shape, ConfigSource::Cli);
        }

        if let Some(size) = overrides.footprint_size_m {
            self.footprint_size_m.update(size, ConfigSource::Cli);
        }

        if let Some(scope_key) = overrides.scope_key {
            self.scope_key.update(scope_key, ConfigSource::Cli);
        }

        if let Some(spreadsheet_id) = overrides.spreadsheet_id {
            self.spreadsheet_id.update(Some(spreadsheet_id), ConfigSource::Cli);
        }

        if let Some(sheet_name) = overrides.sheet_name {
            self.sheet_name.update(sheet_name, ConfigSource::Cli);
        }

        if let Some(mode) = overrides.publish_mode {
            self.publish_mode.update(mode, ConfigSource::Cli);
        }

        if let Some(dedup) = overrides.dedup {
            self.dedup.update(dedup, ConfigSource::Cli);
        }
    }

    /// Footprint shape assembled from the shape, size and segment settings
    pub fn footprint(&self) -> Result<FootprintShape> {
        let shape = FootprintShape::from_parts(
            self.footprint_shape.value,
            self.footprint_size_m.value,
            self.circle_segments.value,
        );
        shape.validate()?;
        Ok(shape)
    }

    /// Check that the area of interest is a closed ring of finite coordinates
    pub fn validate_aoi(&self) -> Result<()> {
        let ring = &self.aoi.value;
        if ring.len() < 4 {
            return Err(CanopyError::ConfigInvalid {
                key: "aoi".to_string(),
                reason: format!("AOI ring must have at least 4 points, found {}", ring.len()),
            });
        }
        if ring.first() != ring.last() {
            return Err(CanopyError::ConfigInvalid {
                key: "aoi".to_string(),
                reason: "AOI ring must be closed (first point == last point)".to_string(),
            });
        }
        if ring.iter().any(|c| !c[0].is_finite() || !c[1].is_finite()) {
            return Err(CanopyError::ConfigInvalid {
                key: "aoi".to_string(),
                reason: "AOI coordinates must be finite".to_string(),
            });
        }
        Ok(())
    }

    /// Require a setting that has no default
    pub fn require<'a>(value: &'a ConfigValue<Option<String>>, key: &str) -> Result<&'a str> {
        value.value.as_deref().ok_or_else(|| CanopyError::ConfigMissing { key: key.to_string() })
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "planar_crs".to_string(),
            (self.planar_crs.value.to_string(), self.planar_crs.source),
        );
        map.insert(
            "footprint_shape".to_string(),
            (format!("{:?}", self.footprint_shape.value), self.footprint_shape.source),
        );
        map.insert(
            "footprint_size_m".to_string(),
            (self.footprint_size_m.value.to_string(), self.footprint_size_m.source),
        );
        map.insert(
            "circle_segments".to_string(),
            (self.circle_segments.value.to_string(), self.circle_segments.source),
        );
        map.insert(
            "scope_key".to_string(),
            (self.scope_key.value.to_string(), self.scope_key.source),
        );
        map.insert(
            "aoi".to_string(),
            (format!("{} vertices", self.aoi.value.len()), self.aoi.source),
        );
        map.insert(
            "alerts_api_url".to_string(),
            (self.alerts_api_url.value.clone(), self.alerts_api_url.source),
        );
        map.insert(
            "alerts_dataset".to_string(),
            (self.alerts_dataset.value.clone(), self.alerts_dataset.source),
        );
        map.insert(
            "alerts_api_key".to_string(),
            (mask_secret(&self.alerts_api_key.value), self.alerts_api_key.source),
        );
        map.insert(
            "sheets_token".to_string(),
            (mask_secret(&self.sheets_token.value), self.sheets_token.source),
        );
        map.insert(
            "spreadsheet_id".to_string(),
            (
                self.spreadsheet_id.value.clone().unwrap_or_else(|| "(unset)".to_string()),
                self.spreadsheet_id.source,
            ),
        );
        map.insert(
            "sheet_name".to_string(),
            (self.sheet_name.value.clone(), self.sheet_name.source),
        );
        map.insert(
            "log_sheet_name".to_string(),
            (self.log_sheet_name.value.clone(), self.log_sheet_name.source),
        );
        map.insert(
            "publish_mode".to_string(),
            (format!("{:?}", self.publish_mode.value), self.publish_mode.source),
        );
        map.insert("dedup".to_string(), (self.dedup.value.to_string(), self.dedup.source));

        map
    }
}

fn mask_secret(value: &Option<String>) -> String {
    match value {
        Some(_) => "****".to_string(),
        None => "(unset)".to_string(),
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    planar_crs: Option<PlanarCrsStrategy>,
    footprint_shape: Option<ShapeKind>,
    footprint_size_m: Option<f64>,
    circle_segments: Option<usize>,
    scope_key: Option<ScopeKey>,
    aoi: Option<Vec<[f64; 2]>>,
    alerts_api_url: Option<String>,
    alerts_dataset: Option<String>,
    spreadsheet_id: Option<String>,
    sheet_name: Option<String>,
    log_sheet_name: Option<String>,
    publish_mode: Option<PublishMode>,
    dedup: Option<bool>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub planar_crs: Option<PlanarCrsStrategy>,
    pub footprint_shape: Option<ShapeKind>,
    pub footprint_size_m: Option<f64>,
    pub scope_key: Option<ScopeKey>,
    pub spreadsheet_id: Option<String>,
    pub sheet_name: Option<String>,
    pub publish_mode: Option<PublishMode>,
    pub dedup: Option<bool>,
}

/// Parse footprint shape from string
pub fn parse_shape_kind(s: &str) -> Result<ShapeKind> {
    match s.to_lowercase().as_str() {
        "square" | "box" => Ok(ShapeKind::Square),
        "circle" | "buffer" => Ok(ShapeKind::Circle),
        _ => Err(CanopyError::ConfigInvalid {
            key: "footprint_shape".to_string(),
            reason: format!("Invalid footprint shape: {}. Use square or circle", s),
        }),
    }
}

/// Parse publish mode from string
pub fn parse_publish_mode(s: &str) -> Result<PublishMode> {
    match s.to_lowercase().as_str() {
        "overwrite" | "replace" => Ok(PublishMode::Overwrite),
        "append" => Ok(PublishMode::Append),
        _ => Err(CanopyError::ConfigInvalid {
            key: "publish_mode".to_string(),
            reason: format!("Invalid publish mode: {}. Use overwrite or append", s),
        }),
    }
}

fn parse_bool(s: &str) -> Result<bool> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CanopyError::ConfigInvalid {
            key: "dedup".to_string(),
            reason: format!("Invalid boolean: {}", s),
        }),
    }
}
