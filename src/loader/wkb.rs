//! WKB and GeoPackage geometry blob decoding
//!
//! Handles ISO WKB (Z/M/ZM type offsets) and extended WKB (high bit flags,
//! embedded SRID), in either byte order. Only X and Y are kept.

use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use nom::bytes::complete::take;
use nom::number::complete::{be_f64, be_i32, be_u32, le_f64, le_i32, le_u32, u8 as byte};
use nom::{IResult, Parser};

use crate::core::error::{CheckError, Result};

const EWKB_Z: u32 = 0x8000_0000;
const EWKB_M: u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;

/// Deepest nesting of geometry collections accepted
const MAX_NESTING: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Big,
    Little,
}

/// Decode a GeoPackage geometry blob (`GP` header followed by WKB)
///
/// Returns `None` for blobs flagged empty. Blobs without the `GP` magic are
/// decoded as plain WKB.
pub fn decode_gpkg(blob: &[u8]) -> Result<Option<Geometry<f64>>> {
    if blob.len() < 8 || &blob[..2] != b"GP" {
        return decode(blob).map(Some);
    }

    let flags = blob[3];
    let envelope_len = match (flags >> 1) & 0x07 {
        0 => 0,
        1 => 32,
        2 | 3 => 48,
        4 => 64,
        code => return Err(CheckError::WkbError(format!("invalid envelope code {code}"))),
    };
    if flags & 0x10 != 0 {
        return Ok(None);
    }

    let body_start = 8 + envelope_len;
    if blob.len() < body_start {
        return Err(CheckError::WkbError("truncated GeoPackage header".into()));
    }
    decode(&blob[body_start..]).map(Some)
}

/// SRID stored in a GeoPackage blob header
pub fn gpkg_srs_id(blob: &[u8]) -> Option<i32> {
    if blob.len() < 8 || &blob[..2] != b"GP" {
        return None;
    }
    let order = if blob[3] & 0x01 == 1 {
        ByteOrder::Little
    } else {
        ByteOrder::Big
    };
    int(&blob[4..8], order).ok().map(|(_, v)| v)
}

/// Decode a single WKB geometry
pub fn decode(input: &[u8]) -> Result<Geometry<f64>> {
    let (_, geometry) = geometry(input, 0).map_err(|e| match e {
        nom::Err::Incomplete(_) => CheckError::WkbError("truncated geometry".into()),
        nom::Err::Error(e) | nom::Err::Failure(e) => CheckError::WkbError(format!(
            "{:?} at byte {}",
            e.code,
            input.len() - e.input.len()
        )),
    })?;
    Ok(geometry)
}

fn uint(input: &[u8], order: ByteOrder) -> IResult<&[u8], u32> {
    match order {
        ByteOrder::Little => le_u32(input),
        ByteOrder::Big => be_u32(input),
    }
}

fn int(input: &[u8], order: ByteOrder) -> IResult<&[u8], i32> {
    match order {
        ByteOrder::Little => le_i32(input),
        ByteOrder::Big => be_i32(input),
    }
}

fn float(input: &[u8], order: ByteOrder) -> IResult<&[u8], f64> {
    match order {
        ByteOrder::Little => le_f64(input),
        ByteOrder::Big => be_f64(input),
    }
}

fn one_byte(input: &[u8]) -> IResult<&[u8], u8> {
    byte(input)
}

fn skip(input: &[u8], n: usize) -> IResult<&[u8], &[u8]> {
    take(n).parse(input)
}

fn byte_order(input: &[u8]) -> IResult<&[u8], ByteOrder> {
    let (input, b) = one_byte(input)?;
    match b {
        0 => Ok((input, ByteOrder::Big)),
        1 => Ok((input, ByteOrder::Little)),
        _ => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

/// Element count guarded against lengths the remaining input cannot hold
fn count(input: &[u8], order: ByteOrder, min_item_len: usize) -> IResult<&[u8], usize> {
    let (rest, n) = uint(input, order)?;
    let n = n as usize;
    if n.saturating_mul(min_item_len) > rest.len() {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TooLarge,
        )));
    }
    Ok((rest, n))
}

#[derive(Debug, Clone, Copy)]
struct Header {
    order: ByteOrder,
    kind: u32,
    /// Number of f64 ordinates per point
    dims: usize,
}

fn header(input: &[u8]) -> IResult<&[u8], Header> {
    let (input, order) = byte_order(input)?;
    let (mut input, raw) = uint(input, order)?;

    let mut dims = 2;
    if raw & EWKB_Z != 0 {
        dims += 1;
    }
    if raw & EWKB_M != 0 {
        dims += 1;
    }
    if raw & EWKB_SRID != 0 {
        let (rest, _srid) = int(input, order)?;
        input = rest;
    }

    let base = raw & 0x0FFF_FFFF;
    dims += match base / 1000 {
        1 | 2 => 1,
        3 => 2,
        _ => 0,
    };

    Ok((
        input,
        Header {
            order,
            kind: base % 1000,
            dims,
        },
    ))
}

fn coord(input: &[u8], h: Header) -> IResult<&[u8], Coord<f64>> {
    let (input, x) = float(input, h.order)?;
    let (input, y) = float(input, h.order)?;
    let (input, _) = skip(input, 8 * (h.dims - 2))?;
    Ok((input, Coord { x, y }))
}

fn coords(input: &[u8], h: Header) -> IResult<&[u8], Vec<Coord<f64>>> {
    let (mut input, n) = count(input, h.order, 8 * h.dims)?;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let (rest, c) = coord(input, h)?;
        out.push(c);
        input = rest;
    }
    Ok((input, out))
}

fn polygon_body(input: &[u8], h: Header) -> IResult<&[u8], Polygon<f64>> {
    let (mut input, n) = count(input, h.order, 4)?;
    let mut rings = Vec::with_capacity(n);
    for _ in 0..n {
        let (rest, ring) = coords(input, h)?;
        rings.push(LineString::new(ring));
        input = rest;
    }

    let mut rings = rings.into_iter();
    let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Ok((input, Polygon::new(exterior, rings.collect())))
}

/// Members of a multi geometry, each a full WKB geometry of its own
fn members(input: &[u8], h: Header, depth: usize) -> IResult<&[u8], Vec<Geometry<f64>>> {
    let (mut input, n) = count(input, h.order, 5)?;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let (rest, g) = geometry(input, depth + 1)?;
        out.push(g);
        input = rest;
    }
    Ok((input, out))
}

fn unexpected<'a, T>(input: &'a [u8]) -> IResult<&'a [u8], T> {
    Err(nom::Err::Failure(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Verify,
    )))
}

fn geometry(input: &[u8], depth: usize) -> IResult<&[u8], Geometry<f64>> {
    if depth > MAX_NESTING {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TooLarge,
        )));
    }
    let (input, h) = header(input)?;

    match h.kind {
        1 => {
            let (input, c) = coord(input, h)?;
            Ok((input, Geometry::Point(Point(c))))
        }
        2 => {
            let (input, cs) = coords(input, h)?;
            Ok((input, Geometry::LineString(LineString::new(cs))))
        }
        3 => {
            let (input, p) = polygon_body(input, h)?;
            Ok((input, Geometry::Polygon(p)))
        }
        4 => {
            let (input, ms) = members(input, h, depth)?;
            let mut points = Vec::with_capacity(ms.len());
            for m in ms {
                match m {
                    Geometry::Point(p) => points.push(p),
                    _ => return unexpected(input),
                }
            }
            Ok((input, Geometry::MultiPoint(MultiPoint::new(points))))
        }
        5 => {
            let (input, ms) = members(input, h, depth)?;
            let mut lines = Vec::with_capacity(ms.len());
            for m in ms {
                match m {
                    Geometry::LineString(l) => lines.push(l),
                    _ => return unexpected(input),
                }
            }
            Ok((input, Geometry::MultiLineString(MultiLineString::new(lines))))
        }
        6 => {
            let (input, ms) = members(input, h, depth)?;
            let mut polygons = Vec::with_capacity(ms.len());
            for m in ms {
                match m {
                    Geometry::Polygon(p) => polygons.push(p),
                    _ => return unexpected(input),
                }
            }
            Ok((input, Geometry::MultiPolygon(MultiPolygon::new(polygons))))
        }
        7 => {
            let (input, ms) = members(input, h, depth)?;
            Ok((input, Geometry::GeometryCollection(GeometryCollection::new_from(ms))))
        }
        _ => unexpected(input),
    }
}

/// Encode a polygon as little endian 2D WKB
#[cfg(test)]
pub(crate) fn encode_polygon(polygon: &Polygon<f64>) -> Vec<u8> {
    let mut out = vec![1u8];
    out.extend_from_slice(&3u32.to_le_bytes());
    let rings: Vec<&LineString<f64>> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .collect();
    out.extend_from_slice(&(rings.len() as u32).to_le_bytes());
    for ring in rings {
        out.extend_from_slice(&(ring.0.len() as u32).to_le_bytes());
        for c in &ring.0 {
            out.extend_from_slice(&c.x.to_le_bytes());
            out.extend_from_slice(&c.y.to_le_bytes());
        }
    }
    out
}

/// Wrap WKB in a minimal GeoPackage header without envelope
#[cfg(test)]
pub(crate) fn gpkg_blob(srs_id: i32, wkb: &[u8]) -> Vec<u8> {
    let mut out = vec![b'G', b'P', 0, 0x01];
    out.extend_from_slice(&srs_id.to_le_bytes());
    out.extend_from_slice(wkb);
    out
}
