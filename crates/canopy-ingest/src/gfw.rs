//! Global Forest Watch data API client

use async_trait::async_trait;
use canopy_core::error::{CanopyError, Result};
use canopy_core::models::record::value_as_text;
use canopy_core::models::{AlertQuery, AlertRecord};
use canopy_core::ports::AlertSource;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Alert source backed by `POST {base}/dataset/{dataset}/latest/query`
pub struct GfwAlertSource {
    /// Base URL for the data API (e.g., "https://data-api.globalforestwatch.org")
    base_url: String,

    /// Dataset name, also the prefix of its date and confidence columns
    dataset: String,

    api_key: String,

    /// HTTP client
    client: reqwest::Client,
}

impl GfwAlertSource {
    pub fn new(base_url: impl Into<String>, dataset: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            dataset: dataset.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn query_url(&self) -> String {
        format!("{}/dataset/{}/latest/query", self.base_url.trim_end_matches('/'), self.dataset)
    }

    fn date_column(&self) -> String {
        format!("{}__date", self.dataset)
    }

    fn confidence_column(&self) -> String {
        format!("{}__confidence", self.dataset)
    }

    /// SQL selecting alert points between the inclusive date bounds
    pub fn build_sql(&self, start: NaiveDate, end: NaiveDate) -> String {
        let date = self.date_column();
        format!(
            "SELECT longitude, latitude, {date}, {confidence} FROM results \
             WHERE {date} >= '{start}' AND {date} <= '{end}'",
            date = date,
            confidence = self.confidence_column(),
            start = start.format("%Y-%m-%d"),
            end = end.format("%Y-%m-%d"),
        )
    }

    /// Request body: the AOI as a GeoJSON polygon plus the SQL
    pub fn build_body(&self, query: &AlertQuery) -> Result<QueryBody> {
        if query.start > query.end {
            return Err(CanopyError::Source {
                reason: format!("Start date {} is after end date {}", query.start, query.end),
            });
        }

        let mut ring: Vec<Vec<f64>> = query.aoi.iter().map(|[x, y]| vec![*x, *y]).collect();
        if ring.first() != ring.last() {
            if let Some(first) = ring.first().cloned() {
                ring.push(first);
            }
        }

        Ok(QueryBody {
            geometry: geojson::Geometry::new(geojson::Value::Polygon(vec![ring])),
            sql: self.build_sql(query.start, query.end),
        })
    }

    /// Convert one `data` row into a record.
    ///
    /// Returns `None` when the coordinates are missing or not numeric.
    fn parse_row(&self, mut row: Map<String, Value>) -> Option<AlertRecord> {
        let longitude = row.remove("longitude").as_ref().and_then(number)?;
        let latitude = row.remove("latitude").as_ref().and_then(number)?;

        let mut record = AlertRecord::new(longitude, latitude);
        record.observed_at = row.remove(&self.date_column()).as_ref().and_then(parse_date);
        record.confidence = row.remove(&self.confidence_column()).as_ref().and_then(value_as_text);
        record.attributes.extend(row);
        Some(record)
    }
}

#[async_trait]
impl AlertSource for GfwAlertSource {
    async fn fetch(&self, query: &AlertQuery) -> Result<Vec<AlertRecord>> {
        let body = self.build_body(query)?;

        let response = self
            .client
            .post(self.query_url())
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CanopyError::Source {
                reason: format!("Failed to reach alerts API at {}: {}", self.base_url, e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CanopyError::Source {
                reason: format!("Alerts API error ({}): {}", status, error_text),
            });
        }

        let payload: QueryResponse = response.json().await.map_err(|e| CanopyError::Source {
            reason: format!("Failed to parse alerts API response: {}", e),
        })?;

        let rows = payload.data.len();
        let records: Vec<AlertRecord> =
            payload.data.into_iter().filter_map(|row| self.parse_row(row)).collect();
        if records.len() < rows {
            tracing::warn!(skipped = rows - records.len(), "Dropped alert rows without usable coordinates");
        }

        tracing::info!(
            dataset = %self.dataset,
            start = %query.start,
            end = %query.end,
            alerts = records.len(),
            "Fetched alerts"
        );
        Ok(records)
    }

    fn dataset(&self) -> &str {
        &self.dataset
    }
}

/// Body of a data API query
#[derive(Debug, Clone, Serialize)]
pub struct QueryBody {
    pub geometry: geojson::Geometry,
    pub sql: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: Vec<Map<String, Value>>,
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?;
    // Timestamps carry a time part after the date
    let day = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> GfwAlertSource {
        GfwAlertSource::new("https://data-api.globalforestwatch.org/", "wur_radd_alerts", "key")
    }

    fn query() -> AlertQuery {
        AlertQuery {
            aoi: vec![[110.15497, 0.67329], [110.38332, 0.67329], [110.38332, 0.91435], [110.15497, 0.91435]],
            start: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
        }
    }

    #[test]
    fn test_query_url() {
        assert_eq!(
            source().query_url(),
            "https://data-api.globalforestwatch.org/dataset/wur_radd_alerts/latest/query"
        );
    }

    #[test]
    fn test_build_sql() {
        let q = query();
        assert_eq!(
            source().build_sql(q.start, q.end),
            "SELECT longitude, latitude, wur_radd_alerts__date, wur_radd_alerts__confidence \
             FROM results WHERE wur_radd_alerts__date >= '2025-07-01' \
             AND wur_radd_alerts__date <= '2025-10-01'"
        );
    }

    #[test]
    fn test_body_closes_ring() {
        let body = source().build_body(&query()).unwrap();
        let value = serde_json::to_value(&body).unwrap();

        let ring = value["geometry"]["coordinates"][0].as_array().unwrap();
        assert_eq!(value["geometry"]["type"], "Polygon");
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[4]);
    }

    #[test]
    fn test_inverted_dates_are_rejected() {
        let mut q = query();
        std::mem::swap(&mut q.start, &mut q.end);
        assert!(source().build_body(&q).is_err());
    }

    #[test]
    fn test_parse_row() {
        let row = json!({
            "longitude": 110.2,
            "latitude": "0.7",
            "wur_radd_alerts__date": "2025-07-14",
            "wur_radd_alerts__confidence": "high",
            "gfw_plantation__type": null
        });
        let Value::Object(map) = row else { unreachable!() };

        let record = source().parse_row(map).unwrap();
        assert_eq!(record.longitude, 110.2);
        assert_eq!(record.latitude, 0.7);
        assert_eq!(record.observed_at, NaiveDate::from_ymd_opt(2025, 7, 14));
        assert_eq!(record.confidence.as_deref(), Some("high"));
        assert_eq!(record.attributes.get("gfw_plantation__type"), Some(&Value::Null));
    }

    #[test]
    fn test_parse_row_without_coordinates() {
        let Value::Object(map) = json!({"latitude": 0.7}) else { unreachable!() };
        assert!(source().parse_row(map).is_none());
    }

    #[test]
    fn test_empty_response() {
        let payload: QueryResponse = serde_json::from_value(json!({"status": "success"})).unwrap();
        assert!(payload.data.is_empty());
    }

    #[test]
    fn test_timestamp_dates() {
        assert_eq!(
            parse_date(&json!("2025-07-14T00:00:00")),
            NaiveDate::from_ymd_opt(2025, 7, 14)
        );
        assert_eq!(parse_date(&json!(20250714)), None);
    }
}
