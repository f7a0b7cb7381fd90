use async_trait::async_trait;
use canopy_core::error::{CanopyError, Result};
use canopy_core::ports::{Row, SheetBackend};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Google Sheets REST v4 values API.
///
/// Authorization is a ready-made OAuth bearer token; obtaining it is up to the
/// caller.
pub struct GoogleSheets {
    /// Base URL of the Sheets API (e.g., "https://sheets.googleapis.com")
    base_url: String,

    spreadsheet_id: String,

    token: String,

    /// HTTP client
    client: reqwest::Client,
}

impl GoogleSheets {
    pub fn new(spreadsheet_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_base_url("https://sheets.googleapis.com", spreadsheet_id, token)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            spreadsheet_id: spreadsheet_id.into(),
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    /// `{base}/v4/spreadsheets/{id}/values/{range}{action}` with every
    /// segment percent-encoded
    fn values_url(&self, range: &str, action: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| CanopyError::Publish {
            reason: format!("Invalid Sheets API URL {}: {}", self.base_url, e),
        })?;
        let target = format!("{}{}", range, action);
        url.path_segments_mut()
            .map_err(|_| CanopyError::Publish {
                reason: format!("Sheets API URL {} cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", target.as_str()]);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = request.bearer_auth(&self.token).send().await.map_err(|e| {
            CanopyError::Publish { reason: format!("Failed to reach Sheets API ({}): {}", what, e) }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CanopyError::Publish {
                reason: format!("Sheets API error during {} ({}): {}", what, status, error_text),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl SheetBackend for GoogleSheets {
    async fn read(&self, sheet: &str) -> Result<Vec<Row>> {
        let url = self.values_url(sheet, "")?;
        let request = self.client.get(url).query(&[("valueRenderOption", "UNFORMATTED_VALUE")]);
        let response = self.send(request, "read").await?;

        let range: ValueRange = response.json().await.map_err(|e| CanopyError::Publish {
            reason: format!("Failed to parse Sheets API response: {}", e),
        })?;
        Ok(range.values)
    }

    async fn clear(&self, sheet: &str) -> Result<()> {
        let url = self.values_url(sheet, ":clear")?;
        self.send(self.client.post(url).json(&serde_json::json!({})), "clear").await?;
        Ok(())
    }

    async fn write(&self, sheet: &str, rows: &[Row]) -> Result<()> {
        let range = a1_origin(sheet);
        let url = self.values_url(&range, "")?;
        let body = ValueRange { range: Some(range), major_dimension: Some("ROWS".into()), values: rows.to_vec() };
        let request = self.client.put(url).query(&[("valueInputOption", "RAW")]).json(&body);
        self.send(request, "write").await?;
        tracing::debug!(sheet, rows = rows.len(), "Wrote rows to sheet");
        Ok(())
    }

    async fn append(&self, sheet: &str, rows: &[Row]) -> Result<()> {
        let range = a1_origin(sheet);
        let url = self.values_url(&range, ":append")?;
        let body = ValueRange { range: Some(range), major_dimension: Some("ROWS".into()), values: rows.to_vec() };
        let request = self
            .client
            .post(url)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&body);
        self.send(request, "append").await?;
        tracing::debug!(sheet, rows = rows.len(), "Appended rows to sheet");
        Ok(())
    }
}

fn a1_origin(sheet: &str) -> String {
    format!("{}!A1", sheet)
}

/// Sheets API ValueRange body
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    range: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    major_dimension: Option<String>,

    /// Absent from responses for an empty sheet
    #[serde(default)]
    values: Vec<Row>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_values_url_encodes_sheet_name() {
        let sheets = GoogleSheets::new("abc123", "token");
        let url = sheets.values_url("Alert Log!A1", ":append").unwrap();

        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/Alert%20Log!A1:append"
        );
    }

    #[test]
    fn test_custom_base_url() {
        let sheets = GoogleSheets::with_base_url("http://localhost:8080/", "id", "token");
        let url = sheets.values_url("Sheet1", "").unwrap();

        assert_eq!(url.as_str(), "http://localhost:8080/v4/spreadsheets/id/values/Sheet1");
    }

    #[test]
    fn test_value_range_without_values() {
        let range: ValueRange =
            serde_json::from_value(json!({"range": "Sheet1!A1:Z1000", "majorDimension": "ROWS"})).unwrap();
        assert!(range.values.is_empty());
    }

    #[test]
    fn test_value_range_body() {
        let body = ValueRange {
            range: Some(a1_origin("log")),
            major_dimension: Some("ROWS".into()),
            values: vec![vec![json!("2025-10-01T06:00:00+00:00"), json!(3), json!(0)]],
        };

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "range": "log!A1",
                "majorDimension": "ROWS",
                "values": [["2025-10-01T06:00:00+00:00", 3, 0]]
            })
        );
    }
}
