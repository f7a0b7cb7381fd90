use async_trait::async_trait;

use crate::error::Result;
use crate::models::{AlertQuery, AlertRecord};

/// Port for the remote alerts dataset
#[async_trait]
pub trait AlertSource: Send + Sync {
    /// Fetch all alerts inside the query's area and date range.
    ///
    /// An empty result is not an error.
    async fn fetch(&self, query: &AlertQuery) -> Result<Vec<AlertRecord>>;

    /// Human-readable name of the dataset
    fn dataset(&self) -> &str;
}
