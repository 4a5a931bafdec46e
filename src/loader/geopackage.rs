//! GeoPackage reader
//!
//! Reads the first feature table listed in `gpkg_contents`. The frame comes
//! from the table's entry in `gpkg_geometry_columns`.

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension};

use super::{wkb, RawDataset, RawFeature};
use crate::core::error::{CheckError, Result};
use crate::crs::Crs;
use crate::layer::Attributes;

struct FeatureTable {
    name: String,
    geometry_column: String,
    srs_id: i64,
}

pub fn read(conn: &Connection, file: &str) -> Result<RawDataset> {
    let tables = feature_tables(conn)?;
    let table = tables
        .into_iter()
        .next()
        .ok_or_else(|| CheckError::format(file, "no feature table in GeoPackage"))?;

    let crs = table_crs(conn, table.srs_id)?;
    tracing::debug!(
        "{}: reading table {} (geometry column {}, srs {})",
        file,
        table.name,
        table.geometry_column,
        table.srs_id
    );

    let sql = format!("SELECT * FROM {}", quote_identifier(&table.name));
    let mut stmt = conn.prepare(&sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let geometry_index = columns
        .iter()
        .position(|c| c.eq_ignore_ascii_case(&table.geometry_column))
        .ok_or_else(|| {
            CheckError::format(file, format!("geometry column {} missing", table.geometry_column))
        })?;

    let mut features = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut attributes = Attributes::new();
        let mut geometry = None;

        for (i, column) in columns.iter().enumerate() {
            let value = row.get_ref(i)?;
            if i == geometry_index {
                if let ValueRef::Blob(blob) = value {
                    match wkb::gpkg_srs_id(blob) {
                        Some(srs) if srs > 0 && i64::from(srs) != table.srs_id => tracing::warn!(
                            "{}: geometry with srs {} in a table declared as {}",
                            file,
                            srs,
                            table.srs_id
                        ),
                        _ => {}
                    }
                    geometry = wkb::decode_gpkg(blob)?;
                }
                continue;
            }
            attributes.insert(column.clone(), value_to_json(value));
        }

        features.push(RawFeature {
            geometry,
            attributes,
        });
    }

    Ok(RawDataset { crs, features })
}

fn feature_tables(conn: &Connection) -> Result<Vec<FeatureTable>> {
    let mut stmt = conn.prepare(
        "SELECT c.table_name, g.column_name, g.srs_id
         FROM gpkg_contents c
         JOIN gpkg_geometry_columns g ON c.table_name = g.table_name
         WHERE c.data_type = 'features'
         ORDER BY c.table_name",
    )?;
    let tables = stmt
        .query_map([], |row| {
            Ok(FeatureTable {
                name: row.get(0)?,
                geometry_column: row.get(1)?,
                srs_id: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    if tables.len() > 1 {
        tracing::warn!(
            "GeoPackage has {} feature tables, only {} is checked",
            tables.len(),
            tables[0].name
        );
    }
    Ok(tables)
}

/// Resolve an srs_id; 0 and -1 are the "undefined" frames of the standard
fn table_crs(conn: &Connection, srs_id: i64) -> Result<Option<Crs>> {
    if srs_id <= 0 {
        return Ok(None);
    }

    let entry: Option<(String, i64, String)> = conn
        .query_row(
            "SELECT organization, organization_coordsys_id, definition
             FROM gpkg_spatial_ref_sys WHERE srs_id = ?1",
            [srs_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    match entry {
        Some((org, code, _)) if org.eq_ignore_ascii_case("EPSG") => {
            Crs::from_epsg(epsg_code(code)?).map(Some)
        }
        Some((_, _, definition)) => Crs::from_wkt(&definition).map(Some),
        None => Crs::from_epsg(epsg_code(srs_id)?).map(Some),
    }
}

fn epsg_code(code: i64) -> Result<u32> {
    u32::try_from(code).map_err(|_| CheckError::UnsupportedCrs(format!("EPSG:{}", code)))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
    use serde_json::Value;

    match value {
        ValueRef::Null | ValueRef::Blob(_) => Value::Null,
        ValueRef::Integer(n) => Value::from(n),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}
