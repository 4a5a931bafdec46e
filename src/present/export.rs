//! GeoJSON export of a layer
//!
//! Output follows RFC 7946, so geometries are always written in WGS84
//! whatever frame the layer was checked in.

use std::path::Path;

use geo_types::MultiPolygon;

use crate::core::error::Result;
use crate::crs::{reproject, Crs};
use crate::layer::{Attributes, Layer};

/// Default file name of the cleaned layer
pub const DEFAULT_OUTPUT: &str = "cleaned_polygons.geojson";

/// The layer as a GeoJSON FeatureCollection string
pub fn export_geojson(layer: &Layer) -> Result<String> {
    Ok(serde_json::to_string(&feature_collection(layer))?)
}

pub fn write_geojson(layer: &Layer, path: &Path) -> Result<()> {
    std::fs::write(path, export_geojson(layer)?)?;
    tracing::info!("Wrote {} features to {}", layer.len(), path.display());
    Ok(())
}

/// Every feature with its attributes as properties
pub fn feature_collection(layer: &Layer) -> geojson::FeatureCollection {
    let features = layer
        .features
        .iter()
        .map(|f| geojson_feature(&to_wgs84(&f.geometry, layer.crs), f.attributes.clone()))
        .collect();

    geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

pub(crate) fn to_wgs84(geometry: &MultiPolygon<f64>, crs: Crs) -> MultiPolygon<f64> {
    reproject(geometry, crs, Crs::Wgs84)
}

pub(crate) fn geojson_feature(geometry: &MultiPolygon<f64>, properties: Attributes) -> geojson::Feature {
    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(geometry))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}
