//! Zipped shapefile reader
//!
//! The bundle must contain one `.shp`; the `.dbf` with the same stem
//! supplies attributes and the `.prj` the frame. Everything is read in
//! memory, nothing is extracted to disk.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use shapefile::dbase::{FieldValue, Record};
use shapefile::Shape;
use zip::ZipArchive;

use super::{RawDataset, RawFeature};
use crate::core::error::{CheckError, Result};
use crate::crs::Crs;
use crate::layer::Attributes;

/// The members of a shapefile bundle
#[derive(Debug, Default)]
pub struct Bundle {
    pub shp: Vec<u8>,
    pub dbf: Option<Vec<u8>>,
    pub prj: Option<String>,
}

pub fn read_zip(bytes: &[u8], file: &str) -> Result<RawDataset> {
    let bundle = unpack(bytes, file)?;

    let crs = bundle.prj.as_deref().map(Crs::from_wkt).transpose()?;
    let shape_reader =
        shapefile::ShapeReader::new(Cursor::new(bundle.shp)).map_err(|e| CheckError::format(file, e))?;

    let mut features = Vec::new();
    match bundle.dbf {
        Some(dbf) => {
            let dbase_reader = shapefile::dbase::Reader::new(Cursor::new(dbf))
                .map_err(|e| CheckError::format(file, e))?;
            let mut reader = shapefile::Reader::new(shape_reader, dbase_reader);
            for result in reader.iter_shapes_and_records() {
                let (shape, record) = result.map_err(|e| CheckError::format(file, e))?;
                features.push(RawFeature {
                    geometry: to_geometry(shape, file)?,
                    attributes: record_attributes(record),
                });
            }
        }
        None => {
            tracing::warn!("{}: no .dbf in bundle, attributes will be empty", file);
            for shape in shape_reader.read().map_err(|e| CheckError::format(file, e))? {
                features.push(RawFeature {
                    geometry: to_geometry(shape, file)?,
                    attributes: Attributes::new(),
                });
            }
        }
    }

    Ok(RawDataset { crs, features })
}

/// Pull the shapefile members out of a zip archive
pub fn unpack(bytes: &[u8], file: &str) -> Result<Bundle> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let mut members: HashMap<String, String> = HashMap::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        if entry.is_dir() || name.starts_with("__MACOSX/") {
            continue;
        }
        if let Some((_, ext)) = name.rsplit_once('.') {
            members.insert(name.clone(), ext.to_ascii_lowercase());
        }
    }

    let mut shp_names: Vec<&String> = members
        .iter()
        .filter(|(_, ext)| ext.as_str() == "shp")
        .map(|(name, _)| name)
        .collect();
    shp_names.sort();

    let shp_name = shp_names
        .first()
        .map(|n| n.to_string())
        .ok_or_else(|| CheckError::format(file, "no .shp file in the archive"))?;
    if shp_names.len() > 1 {
        tracing::warn!("{}: {} shapefiles in bundle, using {}", file, shp_names.len(), shp_name);
    }

    let stem = &shp_name[..shp_name.len() - 4];
    let sibling = |wanted: &str| {
        members
            .iter()
            .find(|(name, ext)| ext.as_str() == wanted && name[..name.len() - ext.len() - 1] == *stem)
            .map(|(name, _)| name.clone())
    };
    let dbf_name = sibling("dbf");
    let prj_name = sibling("prj");

    let mut read_member = |name: &str| -> Result<Vec<u8>> {
        let mut entry = archive.by_name(name)?;
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        Ok(buf)
    };

    let shp = read_member(&shp_name)?;
    let dbf = dbf_name.map(|n| read_member(&n)).transpose()?;
    let prj = prj_name
        .map(|n| read_member(&n))
        .transpose()?
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());

    Ok(Bundle { shp, dbf, prj })
}

fn to_geometry(shape: Shape, file: &str) -> Result<Option<geo_types::Geometry<f64>>> {
    if let Shape::NullShape = shape {
        return Ok(None);
    }
    geo_types::Geometry::<f64>::try_from(shape)
        .map(Some)
        .map_err(|e| CheckError::format(file, format!("{e:?}")))
}

fn record_attributes(record: Record) -> Attributes {
    let fields: HashMap<String, FieldValue> = record.into();
    fields
        .into_iter()
        .map(|(name, value)| (name, field_to_json(value)))
        .collect()
}

fn field_to_json(value: FieldValue) -> serde_json::Value {
    use serde_json::Value;

    match value {
        FieldValue::Character(Some(s)) => Value::String(s.trim_end().to_string()),
        FieldValue::Memo(s) => Value::String(s),
        FieldValue::Numeric(Some(n)) | FieldValue::Double(n) | FieldValue::Currency(n) => {
            serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
        }
        FieldValue::Float(Some(n)) => serde_json::Number::from_f64(n as f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Integer(n) => Value::from(n),
        FieldValue::Logical(Some(b)) => Value::Bool(b),
        _ => Value::Null,
    }
}
