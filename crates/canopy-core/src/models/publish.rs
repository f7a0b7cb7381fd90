//! Publishing modes and run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How rows reach the target sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    /// Clear the sheet and write the full table
    #[default]
    Overwrite,
    /// Keep existing rows and append below them
    Append,
}

/// Outcome of one publish call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReport {
    pub run_id: Uuid,
    pub mode: PublishMode,
    pub rows_written: usize,
    /// Rows dropped because their natural key was already published
    pub rows_skipped: usize,
    pub published_at: DateTime<Utc>,
}
