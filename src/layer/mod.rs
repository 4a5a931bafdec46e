//! Layers: ordered collections of polygon features sharing one frame

use geo::BoundingRect;
use geo_types::{MultiPolygon, Rect};
use serde::Serialize;

use crate::crs::Crs;

/// Attribute row carried alongside a geometry
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Where a feature came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    /// File name the feature was loaded from
    pub source: String,
    /// Zero-based row in that file
    pub row: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: MultiPolygon<f64>,
    pub attributes: Attributes,
    pub provenance: Provenance,
}

impl Feature {
    pub fn new(geometry: MultiPolygon<f64>, attributes: Attributes, provenance: Provenance) -> Self {
        Self {
            geometry,
            attributes,
            provenance,
        }
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }
}

/// A named collection of features in a single reference frame
///
/// Features are addressed by position; every rule result refers to
/// features by their index in the layer it was computed on.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub crs: Crs,
    pub features: Vec<Feature>,
}

impl Layer {
    pub fn new(name: impl Into<String>, crs: Crs) -> Self {
        Self {
            name: name.into(),
            crs,
            features: Vec::new(),
        }
    }

    /// Build a layer from bare geometries, numbering rows from zero
    pub fn from_geometries(
        name: impl Into<String>,
        crs: Crs,
        geometries: impl IntoIterator<Item = MultiPolygon<f64>>,
    ) -> Self {
        let mut layer = Self::new(name, crs);
        for geometry in geometries {
            layer.push(geometry, Attributes::new());
        }
        layer
    }

    /// Append a feature whose provenance is the next row of this layer
    pub fn push(&mut self, geometry: MultiPolygon<f64>, attributes: Attributes) {
        let provenance = Provenance {
            source: self.name.clone(),
            row: self.features.len(),
        };
        self.features.push(Feature::new(geometry, attributes, provenance));
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn geometries(&self) -> impl Iterator<Item = &MultiPolygon<f64>> + '_ {
        self.features.iter().map(|f| &f.geometry)
    }

    /// Bounding box of all features, `None` when every geometry is empty
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.features
            .iter()
            .filter_map(Feature::bounding_rect)
            .reduce(|acc, r| {
                Rect::new(
                    (acc.min().x.min(r.min().x), acc.min().y.min(r.min().y)),
                    (acc.max().x.max(r.max().x), acc.max().y.max(r.max().y)),
                )
            })
    }

    /// Return a copy of this layer with every geometry replaced by `f`
    pub fn map_geometries(&self, mut f: impl FnMut(usize, &Feature) -> MultiPolygon<f64>) -> Self {
        let features = self
            .features
            .iter()
            .enumerate()
            .map(|(i, feature)| Feature {
                geometry: f(i, feature),
                attributes: feature.attributes.clone(),
                provenance: feature.provenance.clone(),
            })
            .collect();
        Self {
            name: self.name.clone(),
            crs: self.crs,
            features,
        }
    }
}

/// Concatenate layers in order into one working layer
///
/// Provenance of each feature is kept, so rows can still be traced back
/// to the file they were loaded from. All layers must share a frame; the
/// loader guarantees this by reprojecting at load time.
pub fn merge(name: impl Into<String>, layers: &[Layer]) -> Layer {
    let crs = layers.first().map(|l| l.crs).unwrap_or_default();
    debug_assert!(layers.iter().all(|l| l.crs == crs));

    Layer {
        name: name.into(),
        crs,
        features: layers
            .iter()
            .flat_map(|l| l.features.iter().cloned())
            .collect(),
    }
}
