//! GeoJSON reference layers for point-in-polygon enrichment

use canopy_core::error::{CanopyError, Result};
use canopy_geo::{ReferenceFeature, ReferenceLayer};
use geo::{Geometry, MultiPolygon};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Load a polygon layer from a GeoJSON file.
///
/// `name` becomes the attribute written onto alerts and `property` selects the
/// feature property carrying the value. Features that are not (multi)polygons
/// are skipped. Coordinates must be longitude/latitude.
pub fn load_reference_layer(path: &Path, name: &str, property: &str) -> Result<ReferenceLayer> {
    let layer_error = |reason: String| CanopyError::LayerLoad { path: path.to_path_buf(), reason };

    let content = fs::read_to_string(path)?;
    let geojson: geojson::GeoJson =
        content.parse().map_err(|e| layer_error(format!("Failed to parse GeoJSON: {}", e)))?;

    let collection = match geojson {
        geojson::GeoJson::FeatureCollection(fc) => fc,
        geojson::GeoJson::Feature(feature) => geojson::FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        },
        geojson::GeoJson::Geometry(_) => {
            return Err(layer_error("Expected a Feature or FeatureCollection".to_string()))
        }
    };

    if let Some(epsg) = collection
        .foreign_members
        .as_ref()
        .and_then(|fm| fm.get("crs"))
        .and_then(extract_epsg_from_crs)
    {
        if epsg != 4326 {
            return Err(layer_error(format!("Layer CRS is EPSG:{}, expected EPSG:4326", epsg)));
        }
    }

    let mut features = Vec::with_capacity(collection.features.len());
    let mut skipped = 0usize;
    for (idx, feature) in collection.features.iter().enumerate() {
        let Some(geometry) = feature.geometry.as_ref() else {
            skipped += 1;
            continue;
        };

        let polygons = match Geometry::<f64>::try_from(&geometry.value) {
            Ok(Geometry::Polygon(polygon)) => MultiPolygon::new(vec![polygon]),
            Ok(Geometry::MultiPolygon(multi)) => multi,
            Ok(_) => {
                skipped += 1;
                continue;
            }
            Err(e) => return Err(layer_error(format!("Feature {}: {}", idx, e))),
        };

        let value = feature.property(property).cloned().unwrap_or(Value::Null);
        features.push(ReferenceFeature { value, geometry: polygons });
    }

    if skipped > 0 {
        tracing::warn!(path = %path.display(), skipped, "Skipped non-polygon features");
    }
    tracing::info!(layer = name, property, features = features.len(), "Loaded reference layer");

    Ok(ReferenceLayer::new(name, property, features))
}

/// EPSG code from a legacy GeoJSON `crs` member
fn extract_epsg_from_crs(crs: &Value) -> Option<u32> {
    let name = crs.get("properties")?.get("name")?.as_str()?;
    // "EPSG:4326" or "urn:ogc:def:crs:EPSG::4326"
    if name.ends_with("CRS84") {
        return Some(4326);
    }
    name.rsplit(':').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_layer(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_polygons_and_multipolygons() {
        let file = write_layer(
            r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"NAME_3": "Sanggau"},
                    "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}
                },
                {
                    "type": "Feature",
                    "properties": {"NAME_3": "Sekadau"},
                    "geometry": {"type": "MultiPolygon", "coordinates": [[[[2,0],[3,0],[3,1],[2,1],[2,0]]]]}
                },
                {
                    "type": "Feature",
                    "properties": {"NAME_3": "Point"},
                    "geometry": {"type": "Point", "coordinates": [5, 5]}
                }
            ]
        }"#,
        );

        let layer = load_reference_layer(file.path(), "district", "NAME_3").unwrap();

        assert_eq!(layer.len(), 2);
        assert_eq!(layer.name, "district");
        assert_eq!(layer.field, "NAME_3");
        assert_eq!(layer.lookup(0.5, 0.5), Some(&Value::from("Sanggau")));
        assert_eq!(layer.lookup(2.5, 0.5), Some(&Value::from("Sekadau")));
    }

    #[test]
    fn test_missing_property_is_null() {
        let file = write_layer(
            r#"{
            "type": "Feature",
            "properties": {},
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}
        }"#,
        );

        let layer = load_reference_layer(file.path(), "owner", "OWNER").unwrap();
        assert_eq!(layer.features()[0].value, Value::Null);
    }

    #[test]
    fn test_projected_layer_is_rejected() {
        let file = write_layer(
            r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32749"}},
            "features": []
        }"#,
        );

        let err = load_reference_layer(file.path(), "block", "BLOCK").unwrap_err();
        assert!(matches!(err, CanopyError::LayerLoad { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let file = write_layer("{not geojson");
        assert!(load_reference_layer(file.path(), "block", "BLOCK").is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = load_reference_layer(Path::new("/nonexistent/layer.geojson"), "a", "b");
        assert!(matches!(result, Err(CanopyError::Io(_))));
    }
}
