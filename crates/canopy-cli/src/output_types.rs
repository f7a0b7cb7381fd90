use canopy_cluster::ClusterStats;
use canopy_core::config::ConfigSource;
use canopy_core::models::{ClusterSummary, ClusteredRecord, PublishReport};
use chrono::NaiveDate;
use serde::Serialize;
use tabled::Tabled;

/// One line of the cluster table
#[derive(Debug, Serialize, Tabled)]
pub struct ClusterRow {
    #[tabled(rename = "Cluster")]
    pub cluster_id: String,

    #[tabled(rename = "Points")]
    pub points: usize,

    #[tabled(rename = "Area (m²)")]
    pub area_m2: f64,

    #[tabled(rename = "Area (ha)", display_with = "format_hectares")]
    pub area_ha: f64,

    #[tabled(rename = "Overlap (m²)", display_with = "format_overlap")]
    pub overlap_m2: f64,

    #[tabled(rename = "Centroid", display_with = "format_centroid")]
    pub centroid: Option<[f64; 2]>,
}

impl From<&ClusterSummary> for ClusterRow {
    fn from(summary: &ClusterSummary) -> Self {
        Self {
            cluster_id: summary.id.to_string(),
            points: summary.point_count(),
            area_m2: summary.area_m2,
            area_ha: summary.area_ha,
            overlap_m2: summary.overlap_m2(),
            centroid: summary.centroid,
        }
    }
}

fn format_hectares(value: &f64) -> String {
    format!("{:.4}", value)
}

fn format_overlap(value: &f64) -> String {
    format!("{:.2}", value)
}

fn format_centroid(value: &Option<[f64; 2]>) -> String {
    match value {
        Some([lon, lat]) => format!("{:.5}, {:.5}", lon, lat),
        None => "-".to_string(),
    }
}

/// Output for run command
#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub dry_run: bool,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub planar_crs: String,
    pub fetched: usize,
    pub in_aoi: usize,
    pub total_area_m2: f64,
    pub stats: ClusterStats,
    pub warnings: Vec<String>,
    pub clusters: Vec<ClusterRow>,
    pub publish: Option<PublishReport>,
}

/// Output for cluster command
#[derive(Debug, Serialize)]
pub struct ClusterOutput {
    pub input: String,
    pub planar_crs: String,
    pub alerts: usize,
    pub total_area_m2: f64,
    pub stats: ClusterStats,
    pub warnings: Vec<String>,
    pub clusters: Vec<ClusterRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<ClusteredRecord>>,
}

/// One configuration entry
#[derive(Debug, Serialize, Tabled)]
pub struct ConfigEntry {
    #[tabled(rename = "Key")]
    pub key: String,

    #[tabled(rename = "Value")]
    pub value: String,

    #[tabled(rename = "Source", display_with = "format_source")]
    pub source: ConfigSource,
}

fn format_source(source: &ConfigSource) -> String {
    format!("{:?}", source)
}
