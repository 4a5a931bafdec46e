//! Load polygon datasets from disk into layers
//!
//! `DatasetLoader` picks a reader by file extension, converts every feature
//! to a multipolygon and reprojects it into the loader's target frame, so
//! that all layers it produces can be merged and compared directly.

pub mod geojson_file;
pub mod geopackage;
pub mod kml_file;
pub mod shapefile_zip;
pub mod wkb;

use std::fs;
use std::path::{Path, PathBuf};

use geo::Geometry;
use geo_types::MultiPolygon;
use rusqlite::{Connection, OpenFlags};

use crate::core::error::{CheckError, Result};
use crate::crs::{reproject, Crs};
use crate::layer::{Attributes, Feature, Layer, Provenance};

/// Supported container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    GeoJson,
    Kml,
    /// A zip archive holding `.shp`, `.dbf` and optionally `.prj`
    ShapefileZip,
    GeoPackage,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "geojson" | "json" => Ok(SourceFormat::GeoJson),
            "kml" => Ok(SourceFormat::Kml),
            "zip" => Ok(SourceFormat::ShapefileZip),
            "gpkg" => Ok(SourceFormat::GeoPackage),
            _ => Err(CheckError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// One feature as read from a file, before polygon conversion
#[derive(Debug, Clone)]
pub struct RawFeature {
    pub geometry: Option<Geometry<f64>>,
    pub attributes: Attributes,
}

/// Everything a format reader extracts from a file
#[derive(Debug, Clone, Default)]
pub struct RawDataset {
    /// Declared frame, `None` when the file does not say
    pub crs: Option<Crs>,
    pub features: Vec<RawFeature>,
}

/// Loader that turns files into layers in a common frame
pub struct DatasetLoader {
    target: Crs,
}

impl DatasetLoader {
    pub fn new(target: Crs) -> Self {
        Self { target }
    }

    pub fn target(&self) -> Crs {
        self.target
    }

    /// Load a single file; its layer is named after the file
    pub fn load_path(&self, path: &Path) -> Result<Layer> {
        let format = SourceFormat::from_path(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let raw = match format {
            SourceFormat::GeoJson => geojson_file::read(&fs::read_to_string(path)?, &name)?,
            SourceFormat::Kml => kml_file::read(&fs::read_to_string(path)?, &name)?,
            SourceFormat::ShapefileZip => shapefile_zip::read_zip(&fs::read(path)?, &name)?,
            SourceFormat::GeoPackage => {
                let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
                geopackage::read(&conn, &name)?
            }
        };

        let layer = self.layer_from_raw(&name, raw)?;
        tracing::info!("Loaded {} features from {} ({:?})", layer.len(), name, format);
        Ok(layer)
    }

    /// Load every file in order, stopping at the first failure
    pub fn load_all(&self, paths: &[PathBuf]) -> Result<Vec<Layer>> {
        paths.iter().map(|p| self.load_path(p)).collect()
    }

    /// Convert reader output into a layer in the target frame
    pub fn layer_from_raw(&self, name: &str, raw: RawDataset) -> Result<Layer> {
        let source_crs = raw.crs.unwrap_or(Crs::Wgs84);
        if source_crs != self.target {
            tracing::debug!("Reprojecting {} from {} to {}", name, source_crs, self.target);
        }

        let mut layer = Layer::new(name, self.target);
        for (row, feature) in raw.features.into_iter().enumerate() {
            let Some(geometry) = feature.geometry else {
                tracing::warn!("{} row {}: feature has no geometry, skipped", name, row);
                continue;
            };

            let polygons = to_multipolygon(geometry, name, row)?;
            layer.features.push(Feature::new(
                reproject(&polygons, source_crs, self.target),
                feature.attributes,
                Provenance {
                    source: name.to_string(),
                    row,
                },
            ));
        }

        Ok(layer)
    }
}

/// Convert a polygonal geometry into a multipolygon
///
/// Collections are accepted when every member is polygonal.
pub fn to_multipolygon(geometry: Geometry<f64>, file: &str, row: usize) -> Result<MultiPolygon<f64>> {
    let mut polygons = Vec::new();
    collect_polygons(geometry, &mut polygons).map_err(|kind| CheckError::NonPolygonal {
        file: file.to_string(),
        row,
        kind: kind.to_string(),
    })?;
    Ok(MultiPolygon::new(polygons))
}

fn collect_polygons(
    geometry: Geometry<f64>,
    out: &mut Vec<geo_types::Polygon<f64>>,
) -> std::result::Result<(), &'static str> {
    match geometry {
        Geometry::Polygon(p) => out.push(p),
        Geometry::MultiPolygon(mp) => out.extend(mp.0),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for member in gc.0 {
                collect_polygons(member, out)?;
            }
        }
        Geometry::Point(_) => return Err("Point"),
        Geometry::MultiPoint(_) => return Err("MultiPoint"),
        Geometry::Line(_) => return Err("Line"),
        Geometry::LineString(_) => return Err("LineString"),
        Geometry::MultiLineString(_) => return Err("MultiLineString"),
    }
    Ok(())
}
