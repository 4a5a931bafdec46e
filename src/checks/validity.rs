//! Geometric validity: OGC simple-feature rules for polygons

use ahash::AHashMap;
use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::coordinate_position::{CoordPos, CoordinatePosition};
use geo::{Area, BoundingRect, Intersects};
use geo_types::{Coord, Line, LineString, MultiPolygon, Polygon};
use ordered_float::OrderedFloat;
use serde::Serialize;

use super::overlay::intersection;
use crate::layer::Layer;

/// Why a geometry fails the validity predicate
///
/// `polygon` is the member index inside the multipolygon, `ring` is 0 for
/// the exterior and 1.. for the holes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidityIssue {
    NonFiniteCoordinate { polygon: usize },
    TooFewPoints { polygon: usize, ring: usize, count: usize },
    SelfIntersection { polygon: usize, ring: usize, at: [f64; 2] },
    ZeroArea { polygon: usize, ring: usize },
    HoleOutsideShell { polygon: usize, ring: usize },
    NestedHoles { polygon: usize, ring: usize },
    RingsCross { polygon: usize, rings: [usize; 2], at: [f64; 2] },
    DisconnectedInterior { polygon: usize, at: [f64; 2] },
    OverlappingPolygons { first: usize, second: usize },
}

impl ValidityIssue {
    pub fn describe(&self) -> String {
        match self {
            ValidityIssue::NonFiniteCoordinate { polygon } => {
                format!("polygon {polygon} has a non-finite coordinate")
            }
            ValidityIssue::TooFewPoints { polygon, ring, count } => {
                format!("polygon {polygon} ring {ring} has only {count} distinct points")
            }
            ValidityIssue::SelfIntersection { polygon, ring, at } => {
                format!("polygon {polygon} ring {ring} self-intersects at ({}, {})", at[0], at[1])
            }
            ValidityIssue::ZeroArea { polygon, ring } => {
                format!("polygon {polygon} ring {ring} encloses no area")
            }
            ValidityIssue::HoleOutsideShell { polygon, ring } => {
                format!("polygon {polygon} hole {ring} lies outside its shell")
            }
            ValidityIssue::NestedHoles { polygon, ring } => {
                format!("polygon {polygon} hole {ring} lies inside another hole")
            }
            ValidityIssue::RingsCross { polygon, rings, at } => format!(
                "polygon {polygon} rings {} and {} cross at ({}, {})",
                rings[0], rings[1], at[0], at[1]
            ),
            ValidityIssue::DisconnectedInterior { polygon, at } => format!(
                "polygon {polygon} interior is split where its rings touch at ({}, {})",
                at[0], at[1]
            ),
            ValidityIssue::OverlappingPolygons { first, second } => {
                format!("member polygons {first} and {second} overlap")
            }
        }
    }
}

/// A feature that failed the validity predicate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidFeature {
    pub index: usize,
    pub issues: Vec<ValidityIssue>,
}

/// Find every invalid feature in the layer
pub fn check_validity(layer: &Layer) -> Vec<InvalidFeature> {
    layer
        .features
        .iter()
        .enumerate()
        .filter_map(|(index, feature)| {
            let issues = geometry_issues(&feature.geometry);
            (!issues.is_empty()).then_some(InvalidFeature { index, issues })
        })
        .collect()
}

pub fn is_valid(geometry: &MultiPolygon<f64>) -> bool {
    geometry_issues(geometry).is_empty()
}

/// All validity issues of a multipolygon; empty means valid
pub fn geometry_issues(geometry: &MultiPolygon<f64>) -> Vec<ValidityIssue> {
    let mut issues = Vec::new();
    let mut clean_members = Vec::new();

    for (index, polygon) in geometry.0.iter().enumerate() {
        let before = issues.len();
        polygon_issues(index, polygon, &mut issues);
        if issues.len() == before && !is_empty_polygon(polygon) {
            clean_members.push(index);
        }
    }

    // Member overlap is only meaningful between individually valid members
    for (a, &i) in clean_members.iter().enumerate() {
        for &j in &clean_members[a + 1..] {
            let (p, q) = (&geometry.0[i], &geometry.0[j]);
            if !boxes_intersect(p, q) {
                continue;
            }
            let shared = intersection(
                &MultiPolygon::new(vec![p.clone()]),
                &MultiPolygon::new(vec![q.clone()]),
            );
            if !shared.0.is_empty() {
                issues.push(ValidityIssue::OverlappingPolygons { first: i, second: j });
            }
        }
    }

    issues
}

fn is_empty_polygon(polygon: &Polygon<f64>) -> bool {
    polygon.exterior().0.is_empty() && polygon.interiors().is_empty()
}

fn boxes_intersect(p: &Polygon<f64>, q: &Polygon<f64>) -> bool {
    match (p.bounding_rect(), q.bounding_rect()) {
        (Some(a), Some(b)) => a.intersects(&b),
        _ => false,
    }
}

fn polygon_issues(index: usize, polygon: &Polygon<f64>, issues: &mut Vec<ValidityIssue>) {
    if is_empty_polygon(polygon) {
        return;
    }

    let rings: Vec<&LineString<f64>> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .collect();

    if rings.iter().flat_map(|r| r.0.iter()).any(|c| !is_finite(c)) {
        issues.push(ValidityIssue::NonFiniteCoordinate { polygon: index });
        return;
    }

    let before = issues.len();
    let cleaned: Vec<Vec<Coord<f64>>> = rings.iter().map(|r| dedup_ring(&r.0)).collect();

    for (ring, coords) in cleaned.iter().enumerate() {
        let distinct = coords.len().saturating_sub(1);
        if distinct < 3 {
            issues.push(ValidityIssue::TooFewPoints {
                polygon: index,
                ring,
                count: distinct,
            });
            continue;
        }

        if let Some(at) = ring_self_intersection(coords) {
            issues.push(ValidityIssue::SelfIntersection {
                polygon: index,
                ring,
                at: [at.x, at.y],
            });
        } else if ring_area(coords) == 0.0 {
            issues.push(ValidityIssue::ZeroArea { polygon: index, ring });
        }
    }

    // Ring relationships need every ring to be simple on its own
    if issues.len() > before {
        return;
    }

    let shell = Polygon::new(LineString::new(cleaned[0].clone()), vec![]);
    let holes: Vec<Polygon<f64>> = cleaned[1..]
        .iter()
        .map(|c| Polygon::new(LineString::new(c.clone()), vec![]))
        .collect();

    for (h, hole) in holes.iter().enumerate() {
        let ring = h + 1;
        if hole
            .exterior()
            .0
            .iter()
            .any(|c| shell.coordinate_position(c) == CoordPos::Outside)
        {
            issues.push(ValidityIssue::HoleOutsideShell { polygon: index, ring });
            continue;
        }

        let nested = holes.iter().enumerate().any(|(o, other)| {
            o != h
                && hole
                    .exterior()
                    .0
                    .iter()
                    .map(|c| other.coordinate_position(c))
                    .find(|pos| *pos != CoordPos::OnBoundary)
                    == Some(CoordPos::Inside)
        });
        if nested {
            issues.push(ValidityIssue::NestedHoles { polygon: index, ring });
        }
    }

    let before = issues.len();
    for a in 0..cleaned.len() {
        for b in a + 1..cleaned.len() {
            if let Some(at) = rings_cross(&cleaned[a], &cleaned[b]) {
                issues.push(ValidityIssue::RingsCross {
                    polygon: index,
                    rings: [a, b],
                    at: [at.x, at.y],
                });
            }
        }
    }

    if issues.len() == before {
        if let Some(at) = disconnecting_touch(&cleaned) {
            issues.push(ValidityIssue::DisconnectedInterior {
                polygon: index,
                at: [at.x, at.y],
            });
        }
    }
}

fn is_finite(c: &Coord<f64>) -> bool {
    c.x.is_finite() && c.y.is_finite()
}

/// Drop consecutive repeated points and make sure the ring is closed
fn dedup_ring(coords: &[Coord<f64>]) -> Vec<Coord<f64>> {
    let mut out: Vec<Coord<f64>> = Vec::with_capacity(coords.len() + 1);
    for c in coords {
        if out.last() != Some(c) {
            out.push(*c);
        }
    }
    if out.len() > 1 && out.first() != out.last() {
        out.push(out[0]);
    }
    out
}

fn ring_segments(coords: &[Coord<f64>]) -> Vec<Line<f64>> {
    coords.windows(2).map(|w| Line::new(w[0], w[1])).collect()
}

/// Unsigned area by the shoelace formula
fn ring_area(coords: &[Coord<f64>]) -> f64 {
    let ring = Polygon::new(LineString::new(coords.to_vec()), vec![]);
    ring.unsigned_area()
}

/// First point where a closed, deduplicated ring touches itself
///
/// Adjacent edges may only share their common vertex; a collinear overlap
/// between them is a spike. Non-adjacent edges may not meet at all.
fn ring_self_intersection(coords: &[Coord<f64>]) -> Option<Coord<f64>> {
    let segments = ring_segments(coords);
    let n = segments.len();

    for i in 0..n {
        for j in i + 1..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(segments[i], segments[j]) {
                None => {}
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(LineIntersection::SinglePoint { intersection, .. }) => return Some(intersection),
                Some(LineIntersection::Collinear { intersection }) => return Some(intersection.start),
            }
        }
    }
    None
}

/// First point where two rings of one polygon cross or share an edge
fn rings_cross(a: &[Coord<f64>], b: &[Coord<f64>]) -> Option<Coord<f64>> {
    let sa = ring_segments(a);
    let sb = ring_segments(b);

    for s in &sa {
        for t in &sb {
            match line_intersection(*s, *t) {
                Some(LineIntersection::SinglePoint {
                    intersection,
                    is_proper: true,
                }) => return Some(intersection),
                Some(LineIntersection::Collinear { intersection })
                    if intersection.start != intersection.end =>
                {
                    return Some(intersection.start)
                }
                _ => {}
            }
        }
    }
    None
}

/// Point where touching rings close a loop and cut the interior in two
///
/// Rings and touch points form a graph, each ring linked to the points it
/// passes through. The interior is connected as long as that graph has no
/// cycle. Expects simple rings that do not cross.
fn disconnecting_touch(rings: &[Vec<Coord<f64>>]) -> Option<Coord<f64>> {
    let mut points: AHashMap<(OrderedFloat<f64>, OrderedFloat<f64>), usize> = AHashMap::new();
    let mut links: Vec<(usize, Coord<f64>, usize)> = Vec::new();

    for a in 0..rings.len() {
        for b in a + 1..rings.len() {
            for at in touch_points(&rings[a], &rings[b]) {
                let next = rings.len() + points.len();
                let id = *points.entry((OrderedFloat(at.x + 0.0), OrderedFloat(at.y + 0.0))).or_insert(next);
                links.push((a, at, id));
                links.push((b, at, id));
            }
        }
    }
    links.sort_by_key(|&(ring, _, id)| (ring, id));
    links.dedup_by_key(|&mut (ring, _, id)| (ring, id));

    let mut parent: Vec<usize> = (0..rings.len() + points.len()).collect();
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }
    for (ring, at, id) in links {
        let (r, p) = (find(&mut parent, ring), find(&mut parent, id));
        if r == p {
            return Some(at);
        }
        parent[r] = p;
    }
    None
}

/// Distinct points where two rings meet without crossing
fn touch_points(a: &[Coord<f64>], b: &[Coord<f64>]) -> Vec<Coord<f64>> {
    let mut found: Vec<Coord<f64>> = Vec::new();
    for s in ring_segments(a) {
        for t in ring_segments(b) {
            let at = match line_intersection(s, t) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => intersection,
                Some(LineIntersection::Collinear { intersection }) => intersection.start,
                None => continue,
            };
            if !found.contains(&at) {
                found.push(at);
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    fn mp(p: Polygon<f64>) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![p])
    }

    #[test]
    fn test_valid_square() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)];
        assert!(is_valid(&mp(square)));
    }

    #[test]
    fn test_bowtie_self_intersects() {
        let bowtie = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 2.0), (x: 2.0, y: 0.0), (x: 0.0, y: 2.0)];
        let issues = geometry_issues(&mp(bowtie));
        assert_eq!(issues.len(), 1);
        match &issues[0] {
            ValidityIssue::SelfIntersection { ring: 0, at, .. } => {
                assert!((at[0] - 1.0).abs() < 1e-12 && (at[1] - 1.0).abs() < 1e-12);
            }
            other => panic!("unexpected issue {other:?}"),
        }
    }

    #[test]
    fn test_spike_is_invalid() {
        let spike = polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 3.0, y: 2.0),
            (x: 2.0, y: 2.0),
            (x: 0.0, y: 2.0),
        ];
        assert!(matches!(
            geometry_issues(&mp(spike))[0],
            ValidityIssue::SelfIntersection { .. }
        ));
    }

    #[test]
    fn test_repeated_points_are_fine() {
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 0.0, y: 2.0),
        ];
        assert!(is_valid(&mp(square)));
    }

    #[test]
    fn test_too_few_points() {
        let sliver = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
        assert!(matches!(
            geometry_issues(&mp(sliver))[0],
            ValidityIssue::TooFewPoints { count: 2, .. }
        ));
    }

    #[test]
    fn test_collinear_ring_has_zero_area() {
        let flat = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 3.0, y: 0.0)];
        let issues = geometry_issues(&mp(flat));
        assert!(!issues.is_empty());
    }

    #[test]
    fn test_non_finite_coordinate() {
        let bad = polygon![(x: 0.0, y: 0.0), (x: f64::NAN, y: 0.0), (x: 1.0, y: 1.0)];
        assert_eq!(
            geometry_issues(&mp(bad)),
            vec![ValidityIssue::NonFiniteCoordinate { polygon: 0 }]
        );
    }

    #[test]
    fn test_hole_inside_is_valid_and_outside_is_not() {
        let with_hole = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [[(x: 2.0, y: 2.0), (x: 4.0, y: 2.0), (x: 4.0, y: 4.0), (x: 2.0, y: 4.0)]],
        );
        assert!(is_valid(&mp(with_hole)));

        let stray_hole = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [[(x: 20.0, y: 2.0), (x: 24.0, y: 2.0), (x: 24.0, y: 4.0), (x: 20.0, y: 4.0)]],
        );
        assert!(geometry_issues(&mp(stray_hole))
            .iter()
            .any(|i| matches!(i, ValidityIssue::HoleOutsideShell { ring: 1, .. })));
    }

    #[test]
    fn test_hole_crossing_shell() {
        let crossing = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [[(x: 8.0, y: 2.0), (x: 12.0, y: 2.0), (x: 12.0, y: 4.0), (x: 8.0, y: 4.0)]],
        );
        let issues = geometry_issues(&mp(crossing));
        assert!(issues.iter().any(|i| matches!(i, ValidityIssue::HoleOutsideShell { .. })));
        assert!(issues.iter().any(|i| matches!(i, ValidityIssue::RingsCross { rings: [0, 1], .. })));
    }

    #[test]
    fn test_nested_holes() {
        let nested = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [
                [(x: 1.0, y: 1.0), (x: 9.0, y: 1.0), (x: 9.0, y: 9.0), (x: 1.0, y: 9.0)],
                [(x: 3.0, y: 3.0), (x: 5.0, y: 3.0), (x: 5.0, y: 5.0), (x: 3.0, y: 5.0)],
            ],
        );
        assert!(geometry_issues(&mp(nested))
            .iter()
            .any(|i| matches!(i, ValidityIssue::NestedHoles { ring: 2, .. })));
    }

    #[test]
    fn test_hole_touching_shell_once_is_valid() {
        let notch = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)],
            interiors: [[(x: 2.0, y: 0.0), (x: 3.0, y: 1.0), (x: 1.0, y: 1.0)]],
        );
        assert!(is_valid(&mp(notch)));
    }

    #[test]
    fn test_hole_splitting_the_interior() {
        let diamond = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)],
            interiors: [[(x: 2.0, y: 0.0), (x: 4.0, y: 2.0), (x: 2.0, y: 4.0), (x: 0.0, y: 2.0)]],
        );
        let issues = geometry_issues(&mp(diamond));
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0], ValidityIssue::DisconnectedInterior { polygon: 0, .. }));
    }

    #[test]
    fn test_holes_chained_across_the_shell() {
        // Two holes touching each other and opposite sides of the shell
        let cut = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)],
            interiors: [
                [(x: 2.0, y: 0.0), (x: 3.0, y: 1.0), (x: 2.0, y: 2.0), (x: 1.0, y: 1.0)],
                [(x: 2.0, y: 2.0), (x: 3.0, y: 3.0), (x: 2.0, y: 4.0), (x: 1.0, y: 3.0)],
            ],
        );
        assert!(geometry_issues(&mp(cut))
            .iter()
            .any(|i| matches!(i, ValidityIssue::DisconnectedInterior { .. })));

        // Three rings meeting at one point leave the interior whole
        let star = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)],
            interiors: [
                [(x: 2.0, y: 0.0), (x: 3.0, y: 1.0), (x: 3.0, y: 2.0)],
                [(x: 2.0, y: 0.0), (x: 1.0, y: 2.0), (x: 1.0, y: 1.0)],
            ],
        );
        assert!(is_valid(&mp(star.clone())), "{:?}", geometry_issues(&mp(star)));
    }

    #[test]
    fn test_overlapping_members() {
        let a = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)];
        let b = polygon![(x: 1.0, y: 1.0), (x: 3.0, y: 1.0), (x: 3.0, y: 3.0), (x: 1.0, y: 3.0)];
        let c = polygon![(x: 2.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: -2.0)];

        let issues = geometry_issues(&MultiPolygon::new(vec![a.clone(), b]));
        assert_eq!(issues, vec![ValidityIssue::OverlappingPolygons { first: 0, second: 1 }]);

        // Members touching at a single vertex are fine
        assert!(is_valid(&MultiPolygon::new(vec![a, c])));
    }

    #[test]
    fn test_empty_geometry_is_valid() {
        assert!(is_valid(&MultiPolygon::new(vec![])));
    }

    #[test]
    fn test_check_validity_reports_indices() {
        let good = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        let bowtie = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 2.0), (x: 2.0, y: 0.0), (x: 0.0, y: 2.0)];
        let layer = Layer::from_geometries(
            "l",
            crate::crs::Crs::Wgs84,
            [mp(good.clone()), mp(bowtie), mp(good)],
        );

        let invalid = check_validity(&layer);
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].index, 1);
    }
}
