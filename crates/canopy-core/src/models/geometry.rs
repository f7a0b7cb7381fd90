//! Coordinate reference systems and footprint shapes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CanopyError, Result};

/// Coordinate Reference System identified by EPSG code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crs {
    pub epsg: u32,
    pub name: String,
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl Crs {
    pub fn new(epsg: u32, name: impl Into<String>) -> Self {
        Self { epsg, name: name.into() }
    }

    /// WGS 84 (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::new(4326, "WGS 84")
    }

    /// WGS 84 / UTM zone, EPSG 326zz in the north and 327zz in the south
    pub fn utm(zone: u8, north: bool) -> Self {
        let base = if north { 32600 } else { 32700 };
        let hemisphere = if north { 'N' } else { 'S' };
        Self::new(base + zone as u32, format!("WGS 84 / UTM zone {}{}", zone, hemisphere))
    }

    pub fn from_epsg(epsg: u32) -> Self {
        match epsg {
            4326 => Self::wgs84(),
            32601..=32660 => Self::utm((epsg - 32600) as u8, true),
            32701..=32760 => Self::utm((epsg - 32700) as u8, false),
            other => Self::new(other, format!("EPSG:{}", other)),
        }
    }

    pub fn authority_code(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

/// How the planar (meters-based) CRS for adjacency and area is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PlanarCrsStrategy {
    /// Always use this EPSG code
    Fixed(u32),
    /// Pick the UTM zone containing the area of interest
    AutoUtm,
}

impl Default for PlanarCrsStrategy {
    fn default() -> Self {
        PlanarCrsStrategy::Fixed(32749)
    }
}

impl fmt::Display for PlanarCrsStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanarCrsStrategy::Fixed(epsg) => write!(f, "EPSG:{}", epsg),
            PlanarCrsStrategy::AutoUtm => write!(f, "auto"),
        }
    }
}

impl std::str::FromStr for PlanarCrsStrategy {
    type Err = CanopyError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("auto") || trimmed.eq_ignore_ascii_case("utm") {
            return Ok(PlanarCrsStrategy::AutoUtm);
        }
        let code = trimmed
            .strip_prefix("EPSG:")
            .or_else(|| trimmed.strip_prefix("epsg:"))
            .unwrap_or(trimmed);
        code.parse::<u32>().map(PlanarCrsStrategy::Fixed).map_err(|_| {
            CanopyError::ConfigInvalid {
                key: "planar_crs".to_string(),
                reason: format!("Expected 'auto' or an EPSG code, found '{}'", s),
            }
        })
    }
}

impl TryFrom<String> for PlanarCrsStrategy {
    type Error = CanopyError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PlanarCrsStrategy> for String {
    fn from(strategy: PlanarCrsStrategy) -> Self {
        strategy.to_string()
    }
}

/// Footprint shape family, independent of size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    #[default]
    Square,
    Circle,
}

/// Ground coverage of a single alert cell in planar coordinates.
///
/// The size sets the adjacency radius: two squares of side `s` merge when
/// their centers are within `s` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum FootprintShape {
    /// Axis-aligned square of the given side length
    Square { side_m: f64 },
    /// Disk of the given radius, approximated by a regular polygon
    Circle { radius_m: f64, segments: usize },
}

impl Default for FootprintShape {
    fn default() -> Self {
        FootprintShape::Square { side_m: 11.2 }
    }
}

impl FootprintShape {
    pub const DEFAULT_SEGMENTS: usize = 32;

    pub fn square(side_m: f64) -> Self {
        FootprintShape::Square { side_m }
    }

    pub fn circle(radius_m: f64) -> Self {
        FootprintShape::Circle { radius_m, segments: Self::DEFAULT_SEGMENTS }
    }

    pub fn from_parts(kind: ShapeKind, size_m: f64, segments: usize) -> Self {
        match kind {
            ShapeKind::Square => FootprintShape::Square { side_m: size_m },
            ShapeKind::Circle => FootprintShape::Circle { radius_m: size_m, segments },
        }
    }

    /// Distance from the center to the edge of the bounding box
    pub fn half_extent(&self) -> f64 {
        match self {
            FootprintShape::Square { side_m } => side_m / 2.0,
            FootprintShape::Circle { radius_m, .. } => *radius_m,
        }
    }

    /// Area of one footprint polygon as constructed (m²)
    pub fn nominal_area(&self) -> f64 {
        match self {
            FootprintShape::Square { side_m } => side_m * side_m,
            FootprintShape::Circle { radius_m, segments } => {
                let n = *segments as f64;
                0.5 * n * radius_m * radius_m * (2.0 * std::f64::consts::PI / n).sin()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let size = match self {
            FootprintShape::Square { side_m } => *side_m,
            FootprintShape::Circle { radius_m, segments } => {
                if *segments < 3 {
                    return Err(CanopyError::ConfigInvalid {
                        key: "circle_segments".to_string(),
                        reason: format!("A circle needs at least 3 segments, found {}", segments),
                    });
                }
                *radius_m
            }
        };

        if !size.is_finite() || size <= 0.0 {
            return Err(CanopyError::ConfigInvalid {
                key: "footprint_size_m".to_string(),
                reason: format!("Footprint size must be a positive number of meters, found {}", size),
            });
        }
        Ok(())
    }
}

impl fmt::Display for FootprintShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FootprintShape::Square { side_m } => write!(f, "square {} m", side_m),
            FootprintShape::Circle { radius_m, segments } => {
                write!(f, "circle r={} m ({} segments)", radius_m, segments)
            }
        }
    }
}
