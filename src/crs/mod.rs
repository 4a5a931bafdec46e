//! Coordinate reference systems and reprojection
//!
//! Only the frames that polygon datasets are commonly delivered in are
//! understood: geographic WGS84, Web Mercator and the WGS84 UTM zones.
//! Anything else is reported as unsupported rather than guessed.

pub mod transform;

use std::fmt;

use geo::MapCoords;
use geo_types::{Coord, MultiPolygon};

use crate::core::error::{CheckError, Result};

/// A supported coordinate reference system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Crs {
    /// Geographic longitude/latitude on WGS84 (EPSG:4326, OGC CRS84)
    #[default]
    Wgs84,
    /// Spherical Web Mercator (EPSG:3857)
    WebMercator,
    /// Universal Transverse Mercator on WGS84 (EPSG:326zz / 327zz)
    Utm { zone: u8, north: bool },
}

impl Crs {
    pub fn from_epsg(code: u32) -> Result<Self> {
        match code {
            4326 => Ok(Crs::Wgs84),
            3857 | 900913 | 3785 | 102100 | 102113 => Ok(Crs::WebMercator),
            32601..=32660 => Ok(Crs::Utm {
                zone: (code - 32600) as u8,
                north: true,
            }),
            32701..=32760 => Ok(Crs::Utm {
                zone: (code - 32700) as u8,
                north: false,
            }),
            _ => Err(CheckError::UnsupportedCrs(format!("EPSG:{code}"))),
        }
    }

    pub fn epsg(&self) -> u32 {
        match *self {
            Crs::Wgs84 => 4326,
            Crs::WebMercator => 3857,
            Crs::Utm { zone, north: true } => 32600 + zone as u32,
            Crs::Utm { zone, north: false } => 32700 + zone as u32,
        }
    }

    /// Parse a CRS name as found in GeoJSON `crs` members and OGC URIs
    pub fn from_name(name: &str) -> Result<Self> {
        let trimmed = name.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper.ends_with("CRS84") || upper.ends_with("CRS:84") {
            return Ok(Crs::Wgs84);
        }

        // EPSG:4326, urn:ogc:def:crs:EPSG::4326, urn:ogc:def:crs:EPSG:6.6:4326,
        // http://www.opengis.net/def/crs/EPSG/0/4326
        if upper.contains("EPSG") {
            let code = upper
                .rsplit(|c: char| c == ':' || c == '/')
                .next()
                .and_then(|tail| tail.parse::<u32>().ok())
                .ok_or_else(|| CheckError::UnsupportedCrs(trimmed.to_string()))?;
            return Self::from_epsg(code);
        }

        Err(CheckError::UnsupportedCrs(trimmed.to_string()))
    }

    /// Recognise the frame described by a WKT string (shapefile `.prj`)
    pub fn from_wkt(wkt: &str) -> Result<Self> {
        const AUTHORITY: &str = "AUTHORITY[\"EPSG\",\"";

        let compact: String = wkt.split_whitespace().collect::<Vec<_>>().join(" ");

        // The outermost AUTHORITY is written last
        if let Some(pos) = compact.rfind(AUTHORITY) {
            let rest = &compact[pos + AUTHORITY.len()..];
            if let Some(code) = rest.split('"').next().and_then(|c| c.parse::<u32>().ok()) {
                return Self::from_epsg(code);
            }
        }

        let upper = compact.to_ascii_uppercase();
        if upper.starts_with("PROJCS") {
            let name = upper
                .split('"')
                .nth(1)
                .unwrap_or_default()
                .replace([' ', '-'], "_");

            if name.contains("WEB_MERCATOR") || name.contains("PSEUDO_MERCATOR") {
                return Ok(Crs::WebMercator);
            }

            if name.contains("WGS") {
                if let Some(zone_part) = name.split("UTM_ZONE_").nth(1) {
                    let digits: String = zone_part.chars().take_while(|c| c.is_ascii_digit()).collect();
                    let hemisphere = zone_part[digits.len()..].chars().next();
                    if let (Ok(zone), Some(h)) = (digits.parse::<u8>(), hemisphere) {
                        if (1..=60).contains(&zone) && (h == 'N' || h == 'S') {
                            return Ok(Crs::Utm {
                                zone,
                                north: h == 'N',
                            });
                        }
                    }
                }
            }
        } else if upper.starts_with("GEOGCS")
            && (upper.contains("WGS_1984") || upper.contains("WGS 84") || upper.contains("WGS84"))
        {
            return Ok(Crs::Wgs84);
        }

        Err(CheckError::UnsupportedCrs(
            compact.chars().take(80).collect::<String>(),
        ))
    }

    fn unproject(self, c: Coord<f64>) -> Coord<f64> {
        let (x, y) = match self {
            Crs::Wgs84 => (c.x, c.y),
            Crs::WebMercator => transform::mercator_inverse(c.x, c.y),
            Crs::Utm { zone, north } => transform::utm_inverse(c.x, c.y, zone, north),
        };
        Coord { x, y }
    }

    fn project(self, c: Coord<f64>) -> Coord<f64> {
        let (x, y) = match self {
            Crs::Wgs84 => (c.x, c.y),
            Crs::WebMercator => transform::mercator_forward(c.x, c.y),
            Crs::Utm { zone, north } => transform::utm_forward(c.x, c.y, zone, north),
        };
        Coord { x, y }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// Transform every coordinate of `geometry` from `from` into `to`
pub fn reproject(geometry: &MultiPolygon<f64>, from: Crs, to: Crs) -> MultiPolygon<f64> {
    if from == to {
        return geometry.clone();
    }
    geometry.map_coords(|c| to.project(from.unproject(c)))
}
