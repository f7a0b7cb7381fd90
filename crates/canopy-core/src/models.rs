pub mod cluster;
pub mod geometry;
pub mod publish;
pub mod record;

pub use cluster::{render_scope, ClusterId, ClusterSummary, ScopeKey};
pub use geometry::{Crs, FootprintShape, PlanarCrsStrategy, ShapeKind};
pub use publish::{PublishMode, PublishReport};
pub use record::{AlertQuery, AlertRecord, ClusteredRecord, NaturalKey};
