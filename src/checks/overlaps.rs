//! Overlap detection within a layer and between two layers

use geo::{Area, BoundingRect, Intersects};
use geo_types::{MultiPolygon, Rect};

use super::candidates::CandidatePairs;
use super::overlay::intersection;
use crate::layer::Layer;

/// Two features of one layer whose interiors intersect
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapPair {
    pub first: usize,
    pub second: usize,
    /// Region covered by both
    pub shared: MultiPolygon<f64>,
}

/// Intersection of a feature of the left layer with one of the right layer
#[derive(Debug, Clone, PartialEq)]
pub struct CrossOverlap {
    pub left: usize,
    pub right: usize,
    pub shared: MultiPolygon<f64>,
}

/// Interiors intersect: the geometries meet and do not merely touch
///
/// For polygons this is the same as sharing some area.
pub fn interiors_intersect(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> bool {
    !intersection(a, b).0.is_empty()
}

/// Every pair `(i, j)`, `i < j`, of overlapping features
///
/// Pairs sharing only boundary are not reported.
pub fn find_overlaps(layer: &Layer, pairs: &dyn CandidatePairs) -> Vec<OverlapPair> {
    let boxes = bounding_boxes(layer);
    let candidates = pairs.candidates(&boxes);
    tracing::debug!(
        "{}: {} candidate pairs out of {}",
        layer.name,
        candidates.len(),
        layer.len() * layer.len().saturating_sub(1) / 2
    );

    candidates
        .into_iter()
        .filter_map(|(first, second)| {
            let shared = intersection(&layer.features[first].geometry, &layer.features[second].geometry);
            (!shared.0.is_empty()).then_some(OverlapPair { first, second, shared })
        })
        .collect()
}

/// Pairwise intersection of two layers
///
/// Pairs whose intersection is empty or has no area are left out, so two
/// layers meeting along a border have no cross overlap.
pub fn cross_overlaps(left: &Layer, right: &Layer) -> Vec<CrossOverlap> {
    let right_boxes = bounding_boxes(right);
    let mut found = Vec::new();

    for (i, feature) in left.features.iter().enumerate() {
        let Some(left_box) = feature.bounding_rect() else {
            continue;
        };
        for (j, right_box) in right_boxes.iter().enumerate() {
            let Some(right_box) = right_box else { continue };
            if !left_box.intersects(right_box) {
                continue;
            }

            let shared = intersection(&feature.geometry, &right.features[j].geometry);
            if shared.unsigned_area() > 0.0 {
                found.push(CrossOverlap {
                    left: i,
                    right: j,
                    shared,
                });
            }
        }
    }

    tracing::debug!("{} x {}: {} intersecting pairs", left.name, right.name, found.len());
    found
}

fn bounding_boxes(layer: &Layer) -> Vec<Option<Rect<f64>>> {
    layer.geometries().map(|g| g.bounding_rect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::candidates::{AllPairs, GridPairs};
    use crate::crs::Crs;
    use geo_types::polygon;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]])
    }

    #[test]
    fn test_overlapping_pair_is_flagged() {
        let layer = Layer::from_geometries("l", Crs::Wgs84, [rect(0.0, 0.0, 2.0, 2.0), rect(1.0, 1.0, 3.0, 3.0)]);
        let found = find_overlaps(&layer, &AllPairs);

        assert_eq!(found.len(), 1);
        assert_eq!((found[0].first, found[0].second), (0, 1));
        assert!((found[0].shared.unsigned_area() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_shared_edge_is_not_an_overlap() {
        let layer = Layer::from_geometries("l", Crs::Wgs84, [rect(0.0, 0.0, 2.0, 2.0), rect(2.0, 0.0, 4.0, 2.0)]);
        assert!(find_overlaps(&layer, &AllPairs).is_empty());
        assert!(find_overlaps(&layer, &GridPairs::new(0.5)).is_empty());
    }

    #[test]
    fn test_containment_is_an_overlap() {
        let layer = Layer::from_geometries("l", Crs::Wgs84, [rect(0.0, 0.0, 4.0, 4.0), rect(1.0, 1.0, 2.0, 2.0)]);
        assert_eq!(find_overlaps(&layer, &GridPairs::new(1.0)).len(), 1);
    }

    #[test]
    fn test_grid_and_naive_agree() {
        let layer = Layer::from_geometries(
            "l",
            Crs::Wgs84,
            [
                rect(0.0, 0.0, 2.0, 2.0),
                rect(1.0, 1.0, 3.0, 3.0),
                rect(2.0, 2.0, 4.0, 4.0),
                rect(10.0, 10.0, 11.0, 11.0),
                rect(0.5, 0.5, 10.5, 10.5),
            ],
        );
        let naive: Vec<_> = find_overlaps(&layer, &AllPairs).iter().map(|p| (p.first, p.second)).collect();
        let grid: Vec<_> = find_overlaps(&layer, &GridPairs::new(0.7)).iter().map(|p| (p.first, p.second)).collect();
        assert_eq!(naive, grid);
        assert!(!naive.contains(&(0, 2)));
    }

    #[test]
    fn test_degenerate_features_share_nothing() {
        let crossed = MultiPolygon::new(vec![polygon![(x: 3.0, y: 0.0), (x: 3.0, y: 4.0), (x: 0.0, y: 0.0), (x: 3.0, y: 3.0)]]);
        let flat = MultiPolygon::new(vec![polygon![(x: 0.0, y: 0.0), (x: 0.0, y: 0.0), (x: 3.0, y: 3.0), (x: 0.0, y: 0.0)]]);
        let layer = Layer::from_geometries("l", Crs::Wgs84, [crossed, flat]);

        assert!(find_overlaps(&layer, &AllPairs).is_empty());
    }

    #[test]
    fn test_cross_overlaps() {
        let left = Layer::from_geometries("a", Crs::Wgs84, [rect(0.0, 0.0, 2.0, 2.0), rect(5.0, 5.0, 6.0, 6.0)]);
        let right = Layer::from_geometries("b", Crs::Wgs84, [rect(1.0, 0.0, 3.0, 2.0), rect(6.0, 5.0, 7.0, 6.0)]);

        let found = cross_overlaps(&left, &right);
        assert_eq!(found.len(), 1);
        assert_eq!((found[0].left, found[0].right), (0, 0));
        assert!((found[0].shared.unsigned_area() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_layers_have_no_cross_overlap() {
        let left = Layer::from_geometries("a", Crs::Wgs84, [rect(0.0, 0.0, 1.0, 1.0)]);
        let right = Layer::from_geometries("b", Crs::Wgs84, [rect(5.0, 5.0, 6.0, 6.0)]);
        assert!(cross_overlaps(&left, &right).is_empty());
    }
}
