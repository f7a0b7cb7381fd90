//! Error types for Canopy

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanopyError {
    // Geometry errors
    #[error("Projection failed for point {index}: {reason}")]
    ProjectionFailure { index: usize, reason: String },

    #[error("Degenerate geometry at point {index}: {reason}")]
    DegenerateGeometry { index: usize, reason: String },

    #[error("Invalid geometry at feature {feature_id}: {reason}")]
    InvalidGeometry { feature_id: String, reason: String },

    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // Collaborator errors
    #[error("Alert source error: {reason}")]
    Source { reason: String },

    #[error("Publish failed: {reason}")]
    Publish { reason: String },

    #[error("Failed to load reference layer {path}: {reason}")]
    LayerLoad { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CanopyError {
    /// Whether the error aborts the whole run rather than a single point
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CanopyError::DegenerateGeometry { .. })
    }
}

pub type Result<T> = std::result::Result<T, CanopyError>;
