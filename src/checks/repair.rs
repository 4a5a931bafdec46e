//! Repair of invalid polygon geometries
//!
//! All rings of a feature are noded together and the faces of the
//! resulting planar graph are kept or dropped by the even-odd rule. The
//! traced boundary of the kept faces is the repaired geometry.

use geo_types::{LineString, MultiPolygon, Polygon};

use super::overlay::{covers, geometry_segments, overlay};
use super::validity::geometry_issues;
use crate::layer::Layer;

/// Replace every invalid geometry by a valid one
///
/// Valid features are returned untouched, so repairing an already repaired
/// layer changes nothing.
pub fn repair(layer: &Layer) -> Layer {
    let mut repaired = 0usize;
    let result = layer.map_geometries(|index, feature| {
        if geometry_issues(&feature.geometry).is_empty() {
            feature.geometry.clone()
        } else {
            repaired += 1;
            tracing::debug!("Repairing feature {} of {}", index, layer.name);
            make_valid(&feature.geometry)
        }
    });
    tracing::info!("Repaired {} invalid geometries in {}", repaired, layer.name);
    result
}

/// Closest valid multipolygon covering the same area by the even-odd rule
///
/// A point belongs to the result when it lies inside a member's shell and
/// outside all of that member's holes, counting every ring by parity.
/// Non-finite points are dropped first.
pub fn make_valid(geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    let finite = finite_only(geometry);
    overlay(geometry_segments(&finite), |p| covers(&finite, p))
}

fn finite_only(geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    let ring = |r: &LineString<f64>| -> LineString<f64> {
        r.0.iter()
            .copied()
            .filter(|c| c.x.is_finite() && c.y.is_finite())
            .collect()
    };
    MultiPolygon::new(
        geometry
            .0
            .iter()
            .map(|p| Polygon::new(ring(p.exterior()), p.interiors().iter().map(ring).collect()))
            .collect(),
    )
}
