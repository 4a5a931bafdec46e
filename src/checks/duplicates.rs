//! Exact duplicate detection

use ahash::AHashMap;
use geo_types::MultiPolygon;
use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::layer::Layer;

/// A feature whose geometry repeats an earlier one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Duplicate {
    pub index: usize,
    /// First feature with the same geometry
    pub original: usize,
}

/// Coordinate sequence with ring structure; equal keys mean equal geometry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GeometryKey(Vec<RingKey>);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RingKey {
    Exterior(Vec<(OrderedFloat<f64>, OrderedFloat<f64>)>),
    Interior(Vec<(OrderedFloat<f64>, OrderedFloat<f64>)>),
}

impl GeometryKey {
    fn of(geometry: &MultiPolygon<f64>) -> Self {
        let coords = |ring: &geo_types::LineString<f64>| {
            ring.0
                .iter()
                .map(|c| (OrderedFloat(normalize(c.x)), OrderedFloat(normalize(c.y))))
                .collect::<Vec<_>>()
        };

        let mut rings = Vec::new();
        for polygon in &geometry.0 {
            rings.push(RingKey::Exterior(coords(polygon.exterior())));
            rings.extend(polygon.interiors().iter().map(|r| RingKey::Interior(coords(r))));
        }
        Self(rings)
    }
}

/// -0.0 and 0.0 are the same coordinate
fn normalize(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

/// Every feature whose geometry exactly equals an earlier feature's
///
/// The first occurrence of a geometry is never reported.
pub fn find_duplicates(layer: &Layer) -> Vec<Duplicate> {
    let mut seen: AHashMap<GeometryKey, usize> = AHashMap::with_capacity(layer.len());
    let mut duplicates = Vec::new();

    for (index, geometry) in layer.geometries().enumerate() {
        let key = GeometryKey::of(geometry);
        match seen.get(&key) {
            Some(&original) => duplicates.push(Duplicate { index, original }),
            None => {
                seen.insert(key, index);
            }
        }
    }

    tracing::debug!("{}: {} duplicate geometries", layer.name, duplicates.len());
    duplicates
}
