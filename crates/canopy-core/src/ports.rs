//! Port trait definitions
//!
//! These traits define the interfaces the fetch and publish adapters implement.

pub mod sheet;
pub mod source;

pub use sheet::{Row, SheetBackend};
pub use source::AlertSource;
