//! Per-point footprint polygons in planar coordinates

use canopy_core::models::FootprintShape;
use geo::{Coord, LineString, Polygon};
use std::f64::consts::PI;

/// Build the footprint polygon centred on a planar point.
///
/// Squares are axis-aligned; circles are regular polygons with the configured
/// number of segments, vertices on the circle. Rings are closed and
/// counter-clockwise.
pub fn footprint_of(center: Coord<f64>, shape: &FootprintShape) -> Polygon<f64> {
    match shape {
        FootprintShape::Square { side_m } => {
            let h = side_m / 2.0;
            Polygon::new(
                LineString::from(vec![
                    (center.x - h, center.y - h),
                    (center.x + h, center.y - h),
                    (center.x + h, center.y + h),
                    (center.x - h, center.y + h),
                    (center.x - h, center.y - h),
                ]),
                vec![],
            )
        }
        FootprintShape::Circle { radius_m, segments } => {
            let n = (*segments).max(3);
            let mut ring: Vec<Coord<f64>> = (0..n)
                .map(|k| {
                    let angle = 2.0 * PI * k as f64 / n as f64;
                    Coord { x: center.x + radius_m * angle.cos(), y: center.y + radius_m * angle.sin() }
                })
                .collect();
            ring.push(ring[0]);
            Polygon::new(LineString::from(ring), vec![])
        }
    }
}
