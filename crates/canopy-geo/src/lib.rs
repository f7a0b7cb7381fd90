//! Canopy Geo - Projection, footprints, spatial indexing and joins
//!
//! This crate holds every geometric operation the clustering core relies on:
//! reprojection into a meters-based CRS, alert footprints, the R-tree used for
//! adjacency candidates, and the point-in-polygon joins used for enrichment.

pub mod backend;
pub mod footprint;
pub mod index;
pub mod join;
pub mod transform;
pub mod validation;

pub use backend::{CandidateIndex, GeoBackend, GeometryBackend};
pub use footprint::footprint_of;
pub use index::{FootprintIndex, IndexedFootprint};
pub use join::{enrich, join_centroids, AreaOfInterest, ReferenceFeature, ReferenceLayer};
pub use transform::{from_planar, resolve_planar_crs, to_planar, utm_crs_for, ProjProjector, Projector};
pub use validation::{validate_footprint, ValidationError, ValidationResult};
