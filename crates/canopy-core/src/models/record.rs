//! Alert point records and their clustered form.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::cluster::ClusterId;

/// One deforestation alert cell as delivered by the alerts source.
///
/// Identity is positional within a batch. Everything besides the coordinates,
/// date and confidence travels in `attributes` and is never interpreted by the
/// clustering core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub longitude: f64,
    pub latitude: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,

    /// Opaque pass-through attributes (owner, administrative name, ...)
    #[serde(default, flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl AlertRecord {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
            observed_at: None,
            confidence: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.observed_at = Some(date);
        self
    }

    pub fn with_confidence(mut self, confidence: impl Into<String>) -> Self {
        self.confidence = Some(confidence.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Look up a named field as text.
    ///
    /// `observed_at` (alias `date`) and `confidence` address the typed fields;
    /// any other name addresses `attributes`. JSON null reads as absent.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "observed_at" | "date" => self.observed_at.map(|d| d.to_string()),
            "confidence" => self.confidence.clone(),
            "longitude" => Some(format_coordinate(self.longitude)),
            "latitude" => Some(format_coordinate(self.latitude)),
            other => self.attributes.get(other).and_then(value_as_text),
        }
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            longitude: format_coordinate(self.longitude),
            latitude: format_coordinate(self.latitude),
            observed_at: self.observed_at.map(|d| d.to_string()).unwrap_or_default(),
        }
    }
}

/// Dedup key `(longitude, latitude, observed_at)` used when appending to a
/// previously published sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NaturalKey {
    pub longitude: String,
    pub latitude: String,
    pub observed_at: String,
}

impl NaturalKey {
    /// Rebuild a key from cells read back from a sheet.
    ///
    /// Numeric cells may come back as JSON numbers or as text, so both are
    /// normalised through the same coordinate formatting used on write.
    pub fn from_cells(longitude: &Value, latitude: &Value, observed_at: &Value) -> Self {
        Self {
            longitude: normalize_coordinate_cell(longitude),
            latitude: normalize_coordinate_cell(latitude),
            observed_at: value_as_text(observed_at).unwrap_or_default(),
        }
    }
}

/// A record after clustering, carrying its cluster identity and area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusteredRecord {
    #[serde(flatten)]
    pub record: AlertRecord,
    pub cluster_id: ClusterId,
    pub area_m2: f64,
    pub area_ha: f64,
    pub point_count_in_cluster: usize,
}

/// Parameters of one fetch from the alerts source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertQuery {
    /// Area of interest as a closed lon/lat ring
    pub aoi: Vec<[f64; 2]>,
    /// Inclusive start date
    pub start: NaiveDate,
    /// Inclusive end date
    pub end: NaiveDate,
}

pub fn format_coordinate(value: f64) -> String {
    format!("{}", value)
}

fn normalize_coordinate_cell(value: &Value) -> String {
    match value {
        Value::Number(n) => n.as_f64().map(format_coordinate).unwrap_or_else(|| n.to_string()),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(v) => format_coordinate(v),
            Err(_) => s.trim().to_string(),
        },
        other => value_as_text(other).unwrap_or_default(),
    }
}

pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
