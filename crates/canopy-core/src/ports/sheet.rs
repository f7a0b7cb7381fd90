use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// One spreadsheet row, cells as JSON values
pub type Row = Vec<Value>;

/// Port for a spreadsheet holding the published table
#[async_trait]
pub trait SheetBackend: Send + Sync {
    /// Read every populated row of a sheet, header included
    async fn read(&self, sheet: &str) -> Result<Vec<Row>>;

    /// Remove all values from a sheet
    async fn clear(&self, sheet: &str) -> Result<()>;

    /// Write rows starting at the top-left cell
    async fn write(&self, sheet: &str, rows: &[Row]) -> Result<()>;

    /// Append rows below the last populated row
    async fn append(&self, sheet: &str, rows: &[Row]) -> Result<()>;
}
