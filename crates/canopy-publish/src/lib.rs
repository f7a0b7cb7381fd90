//! Canopy Publish - Spreadsheet output for clustered alerts
//!
//! [`Publisher`] turns clustered records into a flat table and writes it
//! through a [`SheetBackend`](canopy_core::ports::SheetBackend), either
//! replacing the sheet or appending to it with optional deduplication.

pub mod google;
pub mod memory;
pub mod publisher;
pub mod table;

pub use google::GoogleSheets;
pub use memory::MemorySheets;
pub use publisher::Publisher;
pub use table::Table;
