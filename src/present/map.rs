//! Map overlay document
//!
//! A JSON document any web map widget can load: a center and zoom, the
//! base "Polygons" layer and one colored overlay per failing rule. Styling
//! uses the simplestyle property names (`stroke`, `fill`, ...).

use std::path::Path;

use serde::Serialize;

use super::colors::{configured_color, Color, BASE};
use super::export::{geojson_feature, to_wgs84};
use crate::checks::RuleResult;
use crate::core::config::MapConfig;
use crate::core::error::Result;
use crate::layer::{Attributes, Layer};
use crate::session::Report;

/// Name of the layer holding every feature
pub const BASE_LAYER: &str = "Polygons";

#[derive(Debug, Clone, Serialize)]
pub struct MapView {
    /// [lat, lon]
    pub center: [f64; 2],
    pub zoom: u8,
    pub layers: Vec<MapLayer>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapLayer {
    pub name: String,
    pub color: String,
    pub data: geojson::FeatureCollection,
}

impl MapView {
    pub fn from_report(report: &Report, layer: &Layer, config: &MapConfig) -> Self {
        let mut layers = vec![base_layer(layer)];
        layers.extend(
            report
                .results
                .iter()
                .filter(|r| !r.passed())
                .map(|r| overlay(r, layer, config)),
        );

        let center = data_center(layer).unwrap_or(config.center);
        Self {
            center,
            zoom: config.zoom,
            layers,
        }
    }

    pub fn layer(&self, name: &str) -> Option<&MapLayer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        tracing::info!("Wrote map with {} layers to {}", self.layers.len(), path.display());
        Ok(())
    }
}

fn style(properties: &mut Attributes, color: Color) {
    properties.insert("stroke".into(), color.darken(0.8).to_hex().into());
    properties.insert("stroke-width".into(), 2.into());
    properties.insert("fill".into(), color.to_hex().into());
    properties.insert("fill-opacity".into(), 0.4.into());
}

fn base_layer(layer: &Layer) -> MapLayer {
    let features = layer
        .features
        .iter()
        .enumerate()
        .map(|(index, f)| {
            let mut properties = f.attributes.clone();
            properties.insert("index".into(), index.into());
            properties.insert("source".into(), f.provenance.source.clone().into());
            properties.insert("row".into(), f.provenance.row.into());
            style(&mut properties, BASE);
            geojson_feature(&to_wgs84(&f.geometry, layer.crs), properties)
        })
        .collect();

    MapLayer {
        name: BASE_LAYER.to_string(),
        color: BASE.to_hex(),
        data: collection(features),
    }
}

fn overlay(result: &RuleResult, layer: &Layer, config: &MapConfig) -> MapLayer {
    let color = configured_color(result.rule, config);
    let features = result
        .findings
        .iter()
        .map(|finding| {
            let mut properties = Attributes::new();
            properties.insert("rule".into(), result.rule.key().into());
            properties.insert("features".into(), finding.features.clone().into());
            properties.insert("detail".into(), finding.detail.clone().into());
            style(&mut properties, color);
            geojson_feature(&to_wgs84(&finding.geometry, layer.crs), properties)
        })
        .collect();

    let name = if result.layer == layer.name {
        result.rule.label().to_string()
    } else {
        format!("{} ({})", result.rule.label(), result.layer)
    };

    MapLayer {
        name,
        color: color.to_hex(),
        data: collection(features),
    }
}

fn collection(features: Vec<geojson::Feature>) -> geojson::FeatureCollection {
    geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Center of the layer's extent as [lat, lon]
fn data_center(layer: &Layer) -> Option<[f64; 2]> {
    let rect = layer
        .map_geometries(|_, f| to_wgs84(&f.geometry, layer.crs))
        .bounding_rect()?;
    let center = rect.center();
    Some([center.y, center.x])
}
