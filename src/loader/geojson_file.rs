//! GeoJSON reader
//!
//! RFC 7946 data is always WGS84; older files may still carry a `crs`
//! member naming another frame, which is honoured.

use geojson::{FeatureCollection, GeoJson, JsonObject};

use super::{RawDataset, RawFeature};
use crate::core::error::{CheckError, Result};
use crate::crs::Crs;
use crate::layer::Attributes;

pub fn read(content: &str, file: &str) -> Result<RawDataset> {
    let document: GeoJson = content.parse().map_err(|e| CheckError::format(file, e))?;

    match document {
        GeoJson::FeatureCollection(collection) => read_collection(collection, file),
        GeoJson::Feature(feature) => {
            let crs = declared_crs(feature.foreign_members.as_ref())?;
            Ok(RawDataset {
                crs,
                features: vec![to_raw(feature.geometry, feature.properties, file)?],
            })
        }
        GeoJson::Geometry(geometry) => Ok(RawDataset {
            crs: declared_crs(geometry.foreign_members.as_ref())?,
            features: vec![to_raw(Some(geometry), None, file)?],
        }),
    }
}

fn read_collection(collection: FeatureCollection, file: &str) -> Result<RawDataset> {
    let crs = declared_crs(collection.foreign_members.as_ref())?;
    let features = collection
        .features
        .into_iter()
        .map(|f| to_raw(f.geometry, f.properties, file))
        .collect::<Result<Vec<_>>>()?;
    Ok(RawDataset { crs, features })
}

fn to_raw(
    geometry: Option<geojson::Geometry>,
    properties: Option<JsonObject>,
    file: &str,
) -> Result<RawFeature> {
    let geometry = geometry
        .map(|g| geo_types::Geometry::<f64>::try_from(g).map_err(|e| CheckError::format(file, e)))
        .transpose()?;
    Ok(RawFeature {
        geometry,
        attributes: properties.unwrap_or_else(Attributes::new),
    })
}

/// Read a legacy `"crs": {"type": "name", "properties": {"name": ...}}` member
fn declared_crs(foreign: Option<&JsonObject>) -> Result<Option<Crs>> {
    let name = foreign
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.get("properties"))
        .and_then(|props| props.get("name"))
        .and_then(|name| name.as_str());

    name.map(Crs::from_name).transpose()
}
