//! KML reader
//!
//! KML coordinates are always WGS84 longitude/latitude. Altitudes are
//! dropped during conversion. Every Placemark becomes a feature carrying
//! its `name`, `description` and `ExtendedData` values as attributes.

use kml::types::{Element, Placemark};
use kml::Kml;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::{RawDataset, RawFeature};
use crate::core::error::{CheckError, Result};
use crate::crs::Crs;
use crate::layer::Attributes;

pub fn read(content: &str, file: &str) -> Result<RawDataset> {
    check_well_formed(content, file)?;
    let document: Kml<f64> = content.parse().map_err(|e| CheckError::format(file, e))?;

    let mut placemarks = Vec::new();
    collect_placemarks(document, &mut placemarks);

    let features = placemarks
        .into_iter()
        .map(|placemark| feature(placemark, file))
        .collect::<Result<Vec<_>>>()?;

    Ok(RawDataset {
        crs: Some(Crs::Wgs84),
        features,
    })
}

/// The KML parser loops forever on unterminated elements, so the document
/// is scanned once with a plain XML reader first
fn check_well_formed(content: &str, file: &str) -> Result<()> {
    let mut reader = Reader::from_str(content);
    let mut depth = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) if depth == 0 => return Ok(()),
            Ok(Event::Eof) => {
                return Err(CheckError::format(file, format!("{depth} unclosed elements at end of file")))
            }
            Ok(_) => {}
            Err(e) => return Err(CheckError::format(file, e)),
        }
    }
}

fn collect_placemarks(node: Kml<f64>, out: &mut Vec<Placemark<f64>>) {
    match node {
        Kml::KmlDocument(document) => {
            for element in document.elements {
                collect_placemarks(element, out);
            }
        }
        Kml::Document { elements, .. } | Kml::Folder { elements, .. } => {
            for element in elements {
                collect_placemarks(element, out);
            }
        }
        Kml::Placemark(placemark) => out.push(placemark),
        _ => {}
    }
}

fn feature(placemark: Placemark<f64>, file: &str) -> Result<RawFeature> {
    let mut attributes = Attributes::new();
    if let Some(name) = placemark.name {
        attributes.insert("name".into(), name.trim().into());
    }
    if let Some(description) = placemark.description {
        attributes.insert("description".into(), description.trim().into());
    }
    for data in placemark.children.iter().filter(|e| e.name == "ExtendedData") {
        extended_data(data, &mut attributes);
    }

    let geometry = placemark
        .geometry
        .map(geo_types::Geometry::try_from)
        .transpose()
        .map_err(|e| CheckError::format(file, e))?;

    Ok(RawFeature { geometry, attributes })
}

/// `<Data name><value>` pairs and `<SchemaData><SimpleData name>` values
fn extended_data(element: &Element, attributes: &mut Attributes) {
    for child in &element.children {
        match child.name.as_str() {
            "Data" => {
                let value = child
                    .children
                    .iter()
                    .find(|c| c.name == "value")
                    .and_then(|c| c.content.as_deref());
                if let (Some(name), Some(value)) = (child.attrs.get("name"), value) {
                    attributes.insert(name.clone(), value.trim().into());
                }
            }
            "SimpleData" => {
                if let (Some(name), Some(value)) = (child.attrs.get("name"), child.content.as_deref()) {
                    attributes.insert(name.clone(), value.trim().into());
                }
            }
            "SchemaData" => extended_data(child, attributes),
            _ => {}
        }
    }
}
