//! Gaps: uncovered area inside the convex hull of a layer

use geo::{Area, BoundingRect, ConvexHull, Intersects};
use geo_types::{MultiPolygon, Polygon};

use super::overlay::{covers, geometry_segments, overlay};
use crate::layer::Layer;

/// Hull of the union minus the union
///
/// Components with area at or below `min_gap_area` are dropped; with the
/// default of 0 only degenerate slivers disappear. An empty layer has no
/// gaps.
pub fn find_gaps(layer: &Layer, min_gap_area: f64) -> MultiPolygon<f64> {
    let covered: Vec<(&MultiPolygon<f64>, _)> = layer
        .geometries()
        .filter_map(|g| g.bounding_rect().map(|rect| (g, rect)))
        .collect();
    if covered.is_empty() {
        return MultiPolygon::new(Vec::new());
    }

    let all: Vec<Polygon<f64>> = covered.iter().flat_map(|(g, _)| g.0.iter().cloned()).collect();
    let hull = MultiPolygon::new(vec![MultiPolygon::new(all).convex_hull()]);

    let mut segments = geometry_segments(&hull);
    for (g, _) in &covered {
        segments.extend(geometry_segments(g));
    }
    let gaps = overlay(segments, |p| {
        covers(&hull, p) && !covered.iter().any(|(g, rect)| rect.intersects(&p) && covers(g, p))
    });

    let kept: Vec<_> = gaps
        .0
        .into_iter()
        .filter(|p| p.unsigned_area() > min_gap_area)
        .collect();

    tracing::debug!("{}: {} gap components", layer.name, kept.len());
    MultiPolygon::new(kept)
}
