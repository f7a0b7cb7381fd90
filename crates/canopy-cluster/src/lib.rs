//! Canopy Cluster - Adjacency clustering, area aggregation and the run pipeline
//!
//! Alert footprints that touch or overlap are grouped into connected
//! components; each component's footprints are dissolved and measured in a
//! planar CRS. [`pipeline::AlertPipeline`] wires this core between the alerts
//! source, reference-layer enrichment and the spreadsheet publisher.

pub mod area;
pub mod dsu;
pub mod engine;
pub mod pipeline;

pub use area::{aggregate, attach, centroids};
pub use dsu::DisjointSet;
pub use engine::{Cluster, ClusterEngine, ClusterOptions, ClusterStats, Clustering};
pub use pipeline::{AlertPipeline, PipelineOptions, RunReport};
