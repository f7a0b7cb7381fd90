//! CRS selection and reprojection between geographic and planar coordinates

use canopy_core::error::{CanopyError, Result};
use canopy_core::models::{AlertRecord, Crs, PlanarCrsStrategy};
use geo::Coord;
use proj::Proj;

/// Reprojection between WGS 84 longitude/latitude and a meters-based CRS
pub trait Projector {
    /// The planar CRS points are projected into
    fn planar_crs(&self) -> &Crs;

    /// Longitude/latitude to planar meters
    fn forward(&self, longitude: f64, latitude: f64) -> Result<Coord<f64>>;

    /// Planar meters to longitude/latitude
    fn inverse(&self, planar: Coord<f64>) -> Result<Coord<f64>>;
}

/// [`Projector`] backed by PROJ
pub struct ProjProjector {
    crs: Crs,
    forward: Proj,
    inverse: Proj,
}

impl ProjProjector {
    /// Build forward and inverse transforms between EPSG:4326 and `planar`
    pub fn new(planar: Crs) -> Result<Self> {
        let geographic = Crs::wgs84().authority_code();
        let target = planar.authority_code();

        let forward = Proj::new_known_crs(&geographic, &target, None).map_err(|e| {
            CanopyError::ConfigInvalid {
                key: "planar_crs".to_string(),
                reason: format!("Failed to create projection from {} to {}: {}", geographic, target, e),
            }
        })?;
        let inverse = Proj::new_known_crs(&target, &geographic, None).map_err(|e| {
            CanopyError::ConfigInvalid {
                key: "planar_crs".to_string(),
                reason: format!("Failed to create projection from {} to {}: {}", target, geographic, e),
            }
        })?;

        Ok(Self { crs: planar, forward, inverse })
    }
}

impl Projector for ProjProjector {
    fn planar_crs(&self) -> &Crs {
        &self.crs
    }

    fn forward(&self, longitude: f64, latitude: f64) -> Result<Coord<f64>> {
        let (x, y) = self.forward.convert((longitude, latitude)).map_err(|e| {
            CanopyError::ProjectionFailure { index: 0, reason: format!("Projection failed: {}", e) }
        })?;
        Ok(Coord { x, y })
    }

    fn inverse(&self, planar: Coord<f64>) -> Result<Coord<f64>> {
        let (x, y) = self.inverse.convert((planar.x, planar.y)).map_err(|e| {
            CanopyError::ProjectionFailure { index: 0, reason: format!("Projection failed: {}", e) }
        })?;
        Ok(Coord { x, y })
    }
}

/// WGS 84 / UTM zone containing a longitude/latitude.
///
/// Uses the regular 6° grid; the Norway and Svalbard exceptions are ignored.
pub fn utm_crs_for(longitude: f64, latitude: f64) -> Crs {
    let zone = (((longitude + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u8;
    Crs::utm(zone, latitude >= 0.0)
}

/// Resolve the planar CRS for a run.
///
/// `anchor` is the longitude/latitude the automatic strategy centres on,
/// normally the AOI centroid.
pub fn resolve_planar_crs(strategy: PlanarCrsStrategy, anchor: Option<Coord<f64>>) -> Result<Crs> {
    match strategy {
        PlanarCrsStrategy::Fixed(epsg) => Ok(Crs::from_epsg(epsg)),
        PlanarCrsStrategy::AutoUtm => {
            let anchor = anchor.ok_or_else(|| CanopyError::ConfigMissing { key: "aoi".to_string() })?;
            if !anchor.x.is_finite() || !anchor.y.is_finite() {
                return Err(CanopyError::ConfigInvalid {
                    key: "aoi".to_string(),
                    reason: "AOI centroid is not finite".to_string(),
                });
            }
            let crs = utm_crs_for(anchor.x, anchor.y);
            tracing::debug!(epsg = crs.epsg, name = %crs.name, "Selected planar CRS from AOI");
            Ok(crs)
        }
    }
}

/// Reproject every record into planar coordinates.
///
/// Fails on the first point whose projection errors or yields a non-finite
/// coordinate; no partial output is returned.
pub fn to_planar<P: Projector + ?Sized>(
    records: &[AlertRecord],
    projector: &P,
) -> Result<Vec<Coord<f64>>> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            if !record.longitude.is_finite() || !record.latitude.is_finite() {
                return Err(CanopyError::ProjectionFailure {
                    index,
                    reason: format!(
                        "Input coordinates ({}, {}) are not finite",
                        record.longitude, record.latitude
                    ),
                });
            }

            let planar = projector
                .forward(record.longitude, record.latitude)
                .map_err(|e| at_index(e, index))?;

            if !planar.x.is_finite() || !planar.y.is_finite() {
                return Err(CanopyError::ProjectionFailure {
                    index,
                    reason: format!(
                        "Projection to {} produced ({}, {})",
                        projector.planar_crs().authority_code(),
                        planar.x,
                        planar.y
                    ),
                });
            }
            Ok(planar)
        })
        .collect()
}

fn at_index(error: CanopyError, index: usize) -> CanopyError {
    match error {
        CanopyError::ProjectionFailure { reason, .. } => CanopyError::ProjectionFailure { index, reason },
        other => CanopyError::ProjectionFailure { index, reason: other.to_string() },
    }
}

/// Reproject a planar coordinate back to longitude/latitude
pub fn from_planar<P: Projector + ?Sized>(projector: &P, planar: Coord<f64>) -> Result<Coord<f64>> {
    let geographic = projector.inverse(planar)?;
    if !geographic.x.is_finite() || !geographic.y.is_finite() {
        return Err(CanopyError::ProjectionFailure {
            index: 0,
            reason: format!("Inverse projection of ({}, {}) is not finite", planar.x, planar.y),
        });
    }
    Ok(geographic)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Toy projection so adapter logic is testable without PROJ
    struct ScaleProjector {
        crs: Crs,
    }

    impl Projector for ScaleProjector {
        fn planar_crs(&self) -> &Crs {
            &self.crs
        }

        fn forward(&self, longitude: f64, latitude: f64) -> Result<Coord<f64>> {
            Ok(Coord { x: longitude * 1000.0, y: latitude.ln() })
        }

        fn inverse(&self, planar: Coord<f64>) -> Result<Coord<f64>> {
            Ok(Coord { x: planar.x / 1000.0, y: planar.y.exp() })
        }
    }

    #[test]
    fn test_utm_zone_selection() {
        assert_eq!(utm_crs_for(110.27, 0.79).epsg, 32649);
        assert_eq!(utm_crs_for(110.27, -0.79).epsg, 32749);
        assert_eq!(utm_crs_for(-180.0, 10.0).epsg, 32601);
        assert_eq!(utm_crs_for(180.0, -10.0).epsg, 32760);
    }

    #[test]
    fn test_resolve_fixed_and_auto() {
        let fixed = resolve_planar_crs(PlanarCrsStrategy::Fixed(32749), None).unwrap();
        assert_eq!(fixed.epsg, 32749);

        let auto = resolve_planar_crs(
            PlanarCrsStrategy::AutoUtm,
            Some(Coord { x: 110.27, y: 0.79 }),
        )
        .unwrap();
        assert_eq!(auto.epsg, 32649);

        assert!(resolve_planar_crs(PlanarCrsStrategy::AutoUtm, None).is_err());
    }

    #[test]
    fn test_to_planar_fails_loudly_on_nan() {
        let projector = ScaleProjector { crs: Crs::utm(49, false) };
        let records = vec![
            AlertRecord::new(110.0, 1.0),
            // ln of a negative latitude is NaN
            AlertRecord::new(110.0, -1.0),
        ];

        let err = to_planar(&records, &projector).unwrap_err();
        assert!(matches!(err, CanopyError::ProjectionFailure { index: 1, .. }));
    }

    #[test]
    fn test_to_planar_rejects_non_finite_input() {
        let projector = ScaleProjector { crs: Crs::utm(49, false) };
        let records = vec![AlertRecord::new(f64::INFINITY, 1.0)];

        let err = to_planar(&records, &projector).unwrap_err();
        assert!(matches!(err, CanopyError::ProjectionFailure { index: 0, .. }));
    }

    #[test]
    fn test_planar_roundtrip() {
        let projector = ScaleProjector { crs: Crs::utm(49, false) };
        let records = vec![AlertRecord::new(110.5, 2.0)];

        let planar = to_planar(&records, &projector).unwrap();
        let back = from_planar(&projector, planar[0]).unwrap();
        assert!((back.x - 110.5).abs() < 1e-9);
        assert!((back.y - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input_projects_to_nothing() {
        let projector = ScaleProjector { crs: Crs::utm(49, false) };
        assert!(to_planar(&[], &projector).unwrap().is_empty());
    }
}
