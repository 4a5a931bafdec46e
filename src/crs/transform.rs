//! Projection math on the WGS84 ellipsoid
//!
//! All angles at the public boundary are in degrees, projected coordinates
//! in meters.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

/// WGS84 semi-major axis (meters)
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Latitude at which Web Mercator turns the world into a square
pub const MERCATOR_MAX_LAT_DEG: f64 = 85.051_128_779_806_59;

const UTM_SCALE: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

pub fn mercator_forward(lon_deg: f64, lat_deg: f64) -> (f64, f64) {
    let lat = lat_deg.clamp(-MERCATOR_MAX_LAT_DEG, MERCATOR_MAX_LAT_DEG).to_radians();
    let x = WGS84_A * lon_deg.to_radians();
    let y = WGS84_A * (FRAC_PI_4 + lat / 2.0).tan().ln();
    (x, y)
}

pub fn mercator_inverse(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / WGS84_A).to_degrees();
    let lat = (2.0 * (y / WGS84_A).exp().atan() - FRAC_PI_2).to_degrees();
    (lon, lat)
}

/// Longitude of the central meridian of a UTM zone
pub fn utm_central_meridian(zone: u8) -> f64 {
    (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0
}

struct Ellipsoid {
    a: f64,
    e2: f64,
    ep2: f64,
}

impl Ellipsoid {
    fn wgs84() -> Self {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        Self {
            a: WGS84_A,
            e2,
            ep2: e2 / (1.0 - e2),
        }
    }

    /// Meridian arc length from the equator to `lat` (radians)
    fn meridian_arc(&self, lat: f64) -> f64 {
        let e2 = self.e2;
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        self.a
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
    }
}

/// Geographic to UTM (transverse Mercator series)
pub fn utm_forward(lon_deg: f64, lat_deg: f64, zone: u8, north: bool) -> (f64, f64) {
    let ell = Ellipsoid::wgs84();
    let lat = lat_deg.to_radians();
    let dlon = (lon_deg - utm_central_meridian(zone)).to_radians();

    let (sin_lat, cos_lat) = lat.sin_cos();
    let n = ell.a / (1.0 - ell.e2 * sin_lat * sin_lat).sqrt();
    let t = lat.tan().powi(2);
    let c = ell.ep2 * cos_lat * cos_lat;
    let a = cos_lat * dlon;
    let m = ell.meridian_arc(lat);

    let x = UTM_SCALE
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ell.ep2) * a.powi(5) / 120.0)
        + UTM_FALSE_EASTING;

    let mut y = UTM_SCALE
        * (m + n
            * lat.tan()
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ell.ep2) * a.powi(6) / 720.0));
    if !north {
        y += UTM_FALSE_NORTHING_SOUTH;
    }

    (x, y)
}

/// UTM to geographic (footpoint latitude series)
pub fn utm_inverse(x: f64, y: f64, zone: u8, north: bool) -> (f64, f64) {
    let ell = Ellipsoid::wgs84();
    let e2 = ell.e2;
    let x = x - UTM_FALSE_EASTING;
    let y = if north { y } else { y - UTM_FALSE_NORTHING_SOUTH };

    let m = y / UTM_SCALE;
    let mu = m / (ell.a * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2.powi(3) / 256.0));
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let lat1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let (sin1, cos1) = lat1.sin_cos();
    let c1 = ell.ep2 * cos1 * cos1;
    let t1 = lat1.tan().powi(2);
    let n1 = ell.a / (1.0 - e2 * sin1 * sin1).sqrt();
    let r1 = ell.a * (1.0 - e2) / (1.0 - e2 * sin1 * sin1).powf(1.5);
    let d = x / (n1 * UTM_SCALE);

    let lat = lat1
        - (n1 * lat1.tan() / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ell.ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                    - 252.0 * ell.ep2
                    - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);

    let lon = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ell.ep2 + 24.0 * t1 * t1)
            * d.powi(5)
            / 120.0)
        / cos1;

    (
        utm_central_meridian(zone) + lon.to_degrees(),
        lat.to_degrees(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mercator_origin() {
        let (x, y) = mercator_forward(0.0, 0.0);
        assert!(x.abs() < 1e-9 && y.abs() < 1e-9);
    }

    #[test]
    fn test_mercator_round_trip() {
        let (x, y) = mercator_forward(8.6753, 9.0820);
        let (lon, lat) = mercator_inverse(x, y);
        assert!((lon - 8.6753).abs() < 1e-10);
        assert!((lat - 9.0820).abs() < 1e-10);
    }

    #[test]
    fn test_mercator_antimeridian() {
        let (x, _) = mercator_forward(180.0, 0.0);
        assert!((x - 20_037_508.342_789_244).abs() < 1e-6);
    }

    #[test]
    fn test_utm_central_meridian_on_equator() {
        let (x, y) = utm_forward(3.0, 0.0, 31, true);
        assert!((x - 500_000.0).abs() < 1e-6);
        assert!(y.abs() < 1e-6);

        let (lon, lat) = utm_inverse(500_000.0, 0.0, 31, true);
        assert!((lon - 3.0).abs() < 1e-9);
        assert!(lat.abs() < 1e-9);
    }

    #[test]
    fn test_utm_round_trip_off_meridian() {
        let (x, y) = utm_forward(4.9, 52.37, 31, true);
        let (lon, lat) = utm_inverse(x, y, 31, true);
        assert!((lon - 4.9).abs() < 1e-7, "lon {lon}");
        assert!((lat - 52.37).abs() < 1e-7, "lat {lat}");
    }

    #[test]
    fn test_utm_southern_hemisphere() {
        let (x, y) = utm_forward(27.0, -26.2, 35, false);
        assert!(y > 5_000_000.0 && y < 10_000_000.0);
        let (lon, lat) = utm_inverse(x, y, 35, false);
        assert!((lon - 27.0).abs() < 1e-7);
        assert!((lat + 26.2).abs() < 1e-7);
    }

    #[test]
    fn test_utm_known_point() {
        // Amsterdam Centraal is about 629 km E, 5 805 km N in zone 31N
        let (x, y) = utm_forward(4.9003, 52.3789, 31, true);
        assert!((x - 629_000.0).abs() < 2_000.0, "x {x}");
        assert!((y - 5_805_000.0).abs() < 2_000.0, "y {y}");
    }
}
