//! Canopy Ingest - Inputs to a clustering run
//!
//! Fetches alert points from the Global Forest Watch data API and loads
//! GeoJSON reference layers used for enrichment.

pub mod gfw;
pub mod layers;

pub use gfw::GfwAlertSource;
pub use layers::load_reference_layer;
