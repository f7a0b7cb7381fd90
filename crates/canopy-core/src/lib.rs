//! Canopy Core - Domain models, configuration, and port definitions
//!
//! This crate contains the alert record model, cluster identities, the layered
//! configuration, and the ports implemented by the fetch and publish adapters.

pub mod config;
pub mod error;
pub mod models;
pub mod ports;

pub use error::{CanopyError, Result};
