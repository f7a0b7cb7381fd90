//! In-memory spreadsheet for dry runs and tests.
//!
//! Uses `RwLock::unwrap()` intentionally. Lock poisoning only occurs when
//! another thread panicked while holding the lock, which is an unrecoverable
//! state.

use async_trait::async_trait;
use canopy_core::error::Result;
use canopy_core::ports::{Row, SheetBackend};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Sheets held in a map, keyed by sheet name
#[derive(Debug, Clone, Default)]
pub struct MemorySheets {
    sheets: Arc<RwLock<HashMap<String, Vec<Row>>>>,
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a sheet's rows
    pub fn rows(&self, sheet: &str) -> Vec<Row> {
        self.sheets.read().unwrap().get(sheet).cloned().unwrap_or_default()
    }

    /// Seed a sheet with rows, replacing its content
    pub fn seed(&self, sheet: &str, rows: Vec<Row>) {
        self.sheets.write().unwrap().insert(sheet.to_string(), rows);
    }
}

#[async_trait]
impl SheetBackend for MemorySheets {
    async fn read(&self, sheet: &str) -> Result<Vec<Row>> {
        Ok(self.rows(sheet))
    }

    async fn clear(&self, sheet: &str) -> Result<()> {
        self.sheets.write().unwrap().remove(sheet);
        Ok(())
    }

    async fn write(&self, sheet: &str, rows: &[Row]) -> Result<()> {
        let mut sheets = self.sheets.write().unwrap();
        let target = sheets.entry(sheet.to_string()).or_default();
        // Overwrites from the top-left cell; rows below the write survive
        for (i, row) in rows.iter().enumerate() {
            if i < target.len() {
                target[i] = row.clone();
            } else {
                target.push(row.clone());
            }
        }
        Ok(())
    }

    async fn append(&self, sheet: &str, rows: &[Row]) -> Result<()> {
        self.sheets.write().unwrap().entry(sheet.to_string()).or_default().extend_from_slice(rows);
        Ok(())
    }
}
