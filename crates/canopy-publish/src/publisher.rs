use canopy_core::error::Result;
use canopy_core::models::record::value_as_text;
use canopy_core::models::{ClusteredRecord, NaturalKey, PublishMode, PublishReport};
use canopy_core::ports::{Row, SheetBackend};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

use crate::table::Table;

/// Writes clustered alerts to a data sheet and records each run in a log sheet
pub struct Publisher<B: SheetBackend> {
    backend: B,
    sheet: String,
    log_sheet: String,
}

impl<B: SheetBackend> Publisher<B> {
    pub fn new(backend: B, sheet: impl Into<String>, log_sheet: impl Into<String>) -> Self {
        Self { backend, sheet: sheet.into(), log_sheet: log_sheet.into() }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Publish clustered records.
    ///
    /// `Overwrite` clears the sheet and writes header plus rows. `Append`
    /// writes a header only into an empty sheet, otherwise lays rows out under
    /// the existing header; with `dedup` it skips rows whose
    /// `(longitude, latitude, observed_at)` is already present.
    pub async fn publish(
        &self,
        records: &[ClusteredRecord],
        mode: PublishMode,
        dedup: bool,
    ) -> Result<PublishReport> {
        let table = Table::from_records(records);

        let (rows_written, rows_skipped) = match mode {
            PublishMode::Overwrite => {
                let mut output = Vec::with_capacity(table.len() + 1);
                output.push(table.header_row());
                output.extend(table.rows.iter().cloned());

                self.backend.clear(&self.sheet).await?;
                self.backend.write(&self.sheet, &output).await?;
                (table.len(), 0)
            }
            PublishMode::Append => self.append(&table, dedup).await?,
        };

        let report = PublishReport {
            run_id: Uuid::new_v4(),
            mode,
            rows_written,
            rows_skipped,
            published_at: Utc::now(),
        };

        tracing::info!(
            sheet = %self.sheet,
            mode = ?mode,
            rows_written,
            rows_skipped,
            "Published alerts"
        );
        Ok(report)
    }

    async fn append(&self, table: &Table, dedup: bool) -> Result<(usize, usize)> {
        let existing = self.backend.read(&self.sheet).await?;

        let Some(existing_header) = existing.first().filter(|row| !row.is_empty()) else {
            let mut output = Vec::with_capacity(table.len() + 1);
            output.push(table.header_row());
            output.extend(table.rows.iter().cloned());
            self.backend.write(&self.sheet, &output).await?;
            return Ok((table.len(), 0));
        };

        let header: Vec<String> =
            existing_header.iter().map(|c| value_as_text(c).unwrap_or_default()).collect();

        let dropped: Vec<&String> = table.header.iter().filter(|c| !header.contains(*c)).collect();
        if !dropped.is_empty() {
            tracing::warn!(sheet = %self.sheet, columns = ?dropped, "Columns missing from sheet header are not written");
        }

        let published = if dedup { existing_keys(&header, &existing[1..]) } else { HashSet::new() };

        let mut rows: Vec<Row> = Vec::with_capacity(table.len());
        let mut skipped = 0usize;
        for (i, key) in table.keys.iter().enumerate() {
            if dedup && published.contains(key) {
                skipped += 1;
                continue;
            }
            rows.push(table.aligned_row(i, &header));
        }

        if !rows.is_empty() {
            self.backend.append(&self.sheet, &rows).await?;
        }
        Ok((rows.len(), skipped))
    }

    /// Append `[timestamp, rows_written, rows_skipped]` to the log sheet
    pub async fn log_run(&self, report: &PublishReport, at: DateTime<Utc>) -> Result<()> {
        let row = vec![
            Value::from(at.to_rfc3339()),
            Value::from(report.rows_written),
            Value::from(report.rows_skipped),
        ];
        self.backend.append(&self.log_sheet, &[row]).await?;
        tracing::debug!(sheet = %self.log_sheet, run_id = %report.run_id, "Logged publish run");
        Ok(())
    }
}

/// Natural keys of rows already on the sheet
fn existing_keys(header: &[String], rows: &[Row]) -> HashSet<NaturalKey> {
    let position = |name: &str| header.iter().position(|h| h == name);
    let (Some(lon), Some(lat)) = (position("longitude"), position("latitude")) else {
        tracing::warn!("Sheet header has no longitude/latitude columns, dedup disabled");
        return HashSet::new();
    };
    let date = position("observed_at");

    let blank = Value::from("");
    rows.iter()
        .map(|row| {
            let get = |i: Option<usize>| i.and_then(|i| row.get(i)).unwrap_or(&blank);
            NaturalKey::from_cells(get(Some(lon)), get(Some(lat)), get(date))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySheets;
    use canopy_core::models::{AlertRecord, ClusterId};
    use chrono::NaiveDate;
    use serde_json::json;

    fn row(lon: f64, lat: f64, day: u32) -> ClusteredRecord {
        ClusteredRecord {
            record: AlertRecord::new(lon, lat)
                .with_date(NaiveDate::from_ymd_opt(2025, 7, day).unwrap())
                .with_confidence("high"),
            cluster_id: ClusterId::Sequence(1),
            area_m2: 125.44,
            area_ha: 0.012544,
            point_count_in_cluster: 1,
        }
    }

    fn publisher() -> Publisher<MemorySheets> {
        Publisher::new(MemorySheets::new(), "alerts", "log")
    }

    #[tokio::test]
    async fn test_overwrite_replaces_sheet() {
        let publisher = publisher();
        publisher.backend().seed("alerts", vec![vec![json!("old")]; 5]);

        let report =
            publisher.publish(&[row(110.2, 0.7, 1)], PublishMode::Overwrite, false).await.unwrap();

        let rows = publisher.backend().rows("alerts");
        assert_eq!(report.rows_written, 1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], json!("longitude"));
        assert_eq!(rows[1][0], json!(110.2));
    }

    #[tokio::test]
    async fn test_append_writes_header_once() {
        let publisher = publisher();
        publisher.publish(&[row(110.2, 0.7, 1)], PublishMode::Append, false).await.unwrap();
        publisher.publish(&[row(110.3, 0.8, 2)], PublishMode::Append, false).await.unwrap();

        let rows = publisher.backend().rows("alerts");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], json!("longitude"));
        assert_eq!(rows[2][0], json!(110.3));
    }

    #[tokio::test]
    async fn test_append_dedup_skips_published_keys() {
        let publisher = publisher();
        publisher.publish(&[row(110.2, 0.7, 1)], PublishMode::Append, true).await.unwrap();

        let report = publisher
            .publish(&[row(110.2, 0.7, 1), row(110.2, 0.7, 2)], PublishMode::Append, true)
            .await
            .unwrap();

        assert_eq!(report.rows_written, 1);
        assert_eq!(report.rows_skipped, 1);
        assert_eq!(publisher.backend().rows("alerts").len(), 3);
    }

    #[tokio::test]
    async fn test_dedup_matches_text_cells() {
        let publisher = publisher();
        publisher.backend().seed(
            "alerts",
            vec![
                vec![json!("longitude"), json!("latitude"), json!("observed_at")],
                vec![json!("110.2"), json!("0.7"), json!("2025-07-01")],
            ],
        );

        let report =
            publisher.publish(&[row(110.2, 0.7, 1)], PublishMode::Append, true).await.unwrap();

        assert_eq!(report.rows_written, 0);
        assert_eq!(report.rows_skipped, 1);
    }

    #[tokio::test]
    async fn test_append_aligns_to_existing_header() {
        let publisher = publisher();
        publisher.backend().seed(
            "alerts",
            vec![vec![json!("cluster_id"), json!("longitude"), json!("owner")]],
        );

        publisher.publish(&[row(110.2, 0.7, 1)], PublishMode::Append, false).await.unwrap();

        let rows = publisher.backend().rows("alerts");
        assert_eq!(rows[1], vec![json!("1"), json!(110.2), json!("")]);
    }

    #[tokio::test]
    async fn test_log_run() {
        let publisher = publisher();
        let report = publisher.publish(&[row(110.2, 0.7, 1)], PublishMode::Overwrite, false).await.unwrap();
        let at = DateTime::parse_from_rfc3339("2025-10-01T06:00:00Z").unwrap().with_timezone(&Utc);

        publisher.log_run(&report, at).await.unwrap();

        let log = publisher.backend().rows("log");
        assert_eq!(log, vec![vec![json!("2025-10-01T06:00:00+00:00"), json!(1), json!(0)]]);
    }
}
