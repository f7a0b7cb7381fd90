//! Flat table layout of clustered records

use canopy_core::models::{ClusteredRecord, NaturalKey};
use canopy_core::ports::Row;
use serde_json::Value;
use std::collections::BTreeSet;

const LEADING_COLUMNS: [&str; 4] = ["longitude", "latitude", "observed_at", "confidence"];
const TRAILING_COLUMNS: [&str; 4] = ["cluster_id", "area_m2", "area_ha", "point_count_in_cluster"];

/// Header plus one row per record, with each row's natural key
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Row>,
    pub keys: Vec<NaturalKey>,
}

impl Table {
    /// Lay out records as `longitude, latitude, observed_at, confidence`,
    /// then every attribute name seen (sorted), then the cluster columns.
    pub fn from_records(records: &[ClusteredRecord]) -> Self {
        let attributes: BTreeSet<&str> = records
            .iter()
            .flat_map(|r| r.record.attributes.keys().map(String::as_str))
            .filter(|name| !LEADING_COLUMNS.contains(name) && !TRAILING_COLUMNS.contains(name))
            .collect();

        let header: Vec<String> = LEADING_COLUMNS
            .iter()
            .copied()
            .chain(attributes)
            .chain(TRAILING_COLUMNS.iter().copied())
            .map(String::from)
            .collect();

        let rows = records.iter().map(|r| header.iter().map(|c| cell(r, c)).collect()).collect();
        let keys = records.iter().map(|r| r.record.natural_key()).collect();

        Self { header, rows, keys }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn header_row(&self) -> Row {
        self.header.iter().map(|h| Value::from(h.as_str())).collect()
    }

    /// Reorder row `index` to match another header.
    ///
    /// Columns this table lacks are left blank.
    pub fn aligned_row(&self, index: usize, target: &[String]) -> Row {
        target
            .iter()
            .map(|name| {
                self.header
                    .iter()
                    .position(|h| h == name)
                    .and_then(|pos| self.rows[index].get(pos).cloned())
                    .unwrap_or_else(|| Value::from(""))
            })
            .collect()
    }
}

fn cell(row: &ClusteredRecord, column: &str) -> Value {
    let record = &row.record;
    match column {
        "longitude" => Value::from(record.longitude),
        "latitude" => Value::from(record.latitude),
        "observed_at" => Value::from(record.observed_at.map(|d| d.to_string()).unwrap_or_default()),
        "confidence" => Value::from(record.confidence.clone().unwrap_or_default()),
        "cluster_id" => Value::from(row.cluster_id.to_string()),
        "area_m2" => Value::from(row.area_m2),
        "area_ha" => Value::from(row.area_ha),
        "point_count_in_cluster" => Value::from(row.point_count_in_cluster),
        other => match record.attributes.get(other) {
            None | Some(Value::Null) => Value::from(""),
            Some(value) => value.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::models::{AlertRecord, ClusterId};
    use chrono::NaiveDate;

    fn clustered(record: AlertRecord, id: u32) -> ClusteredRecord {
        ClusteredRecord {
            record,
            cluster_id: ClusterId::Sequence(id),
            area_m2: 125.44,
            area_ha: 0.012544,
            point_count_in_cluster: 1,
        }
    }

    #[test]
    fn test_column_order() {
        let records = vec![
            clustered(AlertRecord::new(110.2, 0.7).with_attribute("owner", "A"), 1),
            clustered(AlertRecord::new(110.3, 0.8).with_attribute("district", "Sanggau"), 2),
        ];
        let table = Table::from_records(&records);

        assert_eq!(
            table.header,
            vec![
                "longitude",
                "latitude",
                "observed_at",
                "confidence",
                "district",
                "owner",
                "cluster_id",
                "area_m2",
                "area_ha",
                "point_count_in_cluster"
            ]
        );
        assert_eq!(table.rows[0][4], Value::from(""));
        assert_eq!(table.rows[0][5], Value::from("A"));
        assert_eq!(table.rows[1][6], Value::from("2"));
    }

    #[test]
    fn test_cells_and_keys() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 14).unwrap();
        let records = vec![clustered(
            AlertRecord::new(110.25, 0.75).with_date(date).with_confidence("high"),
            1,
        )];
        let table = Table::from_records(&records);

        assert_eq!(table.rows[0][0], Value::from(110.25));
        assert_eq!(table.rows[0][2], Value::from("2025-07-14"));
        assert_eq!(table.rows[0][3], Value::from("high"));
        assert_eq!(table.keys[0].observed_at, "2025-07-14");
    }

    #[test]
    fn test_aligned_row() {
        let records = vec![clustered(AlertRecord::new(1.0, 2.0), 3)];
        let table = Table::from_records(&records);
        let target = vec!["cluster_id".to_string(), "extra".to_string(), "longitude".to_string()];

        assert_eq!(
            table.aligned_row(0, &target),
            vec![Value::from("3"), Value::from(""), Value::from(1.0)]
        );
    }

    #[test]
    fn test_empty_table_still_has_header() {
        let table = Table::from_records(&[]);
        assert!(table.is_empty());
        assert_eq!(table.header.len(), 8);
    }
}
