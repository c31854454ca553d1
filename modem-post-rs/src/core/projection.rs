//! Projection of WGS84 geographic coordinates into UTM-family grids.
//!
//! Only the transverse Mercator zones used for Australian and global UTM
//! grids are supported:
//! - `EPSG:326zz` / `EPSG:327zz`: WGS84 / UTM zone zz north / south
//! - `EPSG:283zz`: GDA94 / MGA zone zz (zones 49-56)
//! - `EPSG:78zz`: GDA2020 / MGA zone zz (zones 49-56)
//!
//! GDA94 and GDA2020 use the GRS80 ellipsoid, which differs from WGS84 by
//! well under a millimetre at these scales, so one set of constants is used.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors that can occur while resolving a coordinate reference system.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("invalid CRS identifier '{0}', expected EPSG:<code>")]
    InvalidIdentifier(String),

    #[error("unsupported CRS EPSG:{0}")]
    UnsupportedCrs(u32),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;

/// Datum family of a supported CRS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datum {
    Wgs84,
    Gda94,
    Gda2020,
}

/// A projected coordinate reference system identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crs {
    epsg: u32,
    datum: Datum,
    zone: u8,
    northern: bool,
}

impl Crs {
    /// Resolve an EPSG code into a supported UTM-family CRS.
    pub fn from_epsg(epsg: u32) -> Result<Self> {
        let (datum, zone, northern) = match epsg {
            32601..=32660 => (Datum::Wgs84, (epsg - 32600) as u8, true),
            32701..=32760 => (Datum::Wgs84, (epsg - 32700) as u8, false),
            28349..=28356 => (Datum::Gda94, (epsg - 28300) as u8, false),
            7849..=7856 => (Datum::Gda2020, (epsg - 7800) as u8, false),
            _ => return Err(ProjectionError::UnsupportedCrs(epsg)),
        };

        Ok(Self {
            epsg,
            datum,
            zone,
            northern,
        })
    }

    /// EPSG code.
    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// UTM zone number (1-60).
    pub fn zone(&self) -> u8 {
        self.zone
    }

    /// Short label used in output column headers (e.g. "MGA55", "UTM54S").
    pub fn label(&self) -> String {
        match self.datum {
            Datum::Gda94 => format!("MGA{}", self.zone),
            Datum::Gda2020 => format!("MGA2020_{}", self.zone),
            Datum::Wgs84 => {
                format!("UTM{}{}", self.zone, if self.northern { "N" } else { "S" })
            }
        }
    }

    /// Spatial reference string in the form GDAL expects for `-a_srs`.
    pub fn srs(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }

    /// Transverse Mercator projection for this CRS.
    pub fn projection(&self) -> UtmProjection {
        UtmProjection::new(self.zone, self.northern)
    }

    /// Project WGS84 (lat, lon) in degrees to (easting, northing) in metres.
    pub fn project(&self, lat: f64, lon: f64) -> (f64, f64) {
        self.projection().geo_to_xy(lat, lon)
    }
}

impl FromStr for Crs {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let code = trimmed
            .split_once(':')
            .filter(|(authority, _)| authority.eq_ignore_ascii_case("epsg"))
            .map(|(_, code)| code)
            .ok_or_else(|| ProjectionError::InvalidIdentifier(s.to_string()))?;

        let epsg: u32 = code
            .trim()
            .parse()
            .map_err(|_| ProjectionError::InvalidIdentifier(s.to_string()))?;

        Self::from_epsg(epsg)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{} ({})", self.epsg, self.label())
    }
}

/// Universal Transverse Mercator projection for one zone and hemisphere.
#[derive(Debug, Clone, Copy)]
pub struct UtmProjection {
    /// Central meridian in degrees
    central_meridian: f64,
    /// Scale factor at central meridian (0.9996 for UTM)
    scale_factor: f64,
    /// False easting in meters
    false_easting: f64,
    /// False northing in meters (10,000,000 in the southern hemisphere)
    false_northing: f64,
}

impl UtmProjection {
    /// WGS84 equatorial radius in meters
    const A: f64 = 6_378_137.0;
    /// WGS84 flattening
    const F: f64 = 1.0 / 298.257_223_563;

    /// Create a projection for `zone` (1-60) in the given hemisphere.
    pub fn new(zone: u8, northern: bool) -> Self {
        let central_meridian = (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0;

        Self {
            central_meridian,
            scale_factor: 0.9996,
            false_easting: 500_000.0,
            false_northing: if northern { 0.0 } else { 10_000_000.0 },
        }
    }

    /// Central meridian of the zone in degrees.
    pub fn central_meridian(&self) -> f64 {
        self.central_meridian
    }

    /// Convert geographic (lat, lon) in degrees to (easting, northing).
    pub fn geo_to_xy(&self, lat: f64, lon: f64) -> (f64, f64) {
        let lat_rad = lat * PI / 180.0;
        let lon_rad = lon * PI / 180.0;
        let lon0_rad = self.central_meridian * PI / 180.0;

        let e2 = 2.0 * Self::F - Self::F * Self::F;
        let e_prime2 = e2 / (1.0 - e2);

        let n = Self::A / (1.0 - e2 * lat_rad.sin().powi(2)).sqrt();
        let t = lat_rad.tan().powi(2);
        let c = e_prime2 * lat_rad.cos().powi(2);
        let a_coef = (lon_rad - lon0_rad) * lat_rad.cos();

        // Meridian arc length
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let m = Self::A
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat_rad
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat_rad).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat_rad).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * lat_rad).sin());

        let x = self.scale_factor
            * n
            * (a_coef
                + (1.0 - t + c) * a_coef.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * e_prime2) * a_coef.powi(5) / 120.0)
            + self.false_easting;

        let y = self.scale_factor
            * (m + n
                * lat_rad.tan()
                * (a_coef.powi(2) / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a_coef.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * e_prime2) * a_coef.powi(6)
                        / 720.0))
            + self.false_northing;

        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mga_zone() {
        let crs: Crs = "EPSG:28355".parse().unwrap();
        assert_eq!(crs.epsg(), 28355);
        assert_eq!(crs.zone(), 55);
        assert_eq!(crs.label(), "MGA55");
        assert_eq!(crs.srs(), "EPSG:28355");
    }

    #[test]
    fn test_parse_wgs84_utm_zones() {
        let north: Crs = "epsg:32632".parse().unwrap();
        assert_eq!(north.label(), "UTM32N");

        let south: Crs = " EPSG:32754 ".parse().unwrap();
        assert_eq!(south.label(), "UTM54S");
        assert_eq!(south.zone(), 54);
    }

    #[test]
    fn test_parse_gda2020() {
        let crs: Crs = "EPSG:7855".parse().unwrap();
        assert_eq!(crs.label(), "MGA2020_55");
    }

    #[test]
    fn test_invalid_identifiers() {
        assert_eq!(
            "28355".parse::<Crs>(),
            Err(ProjectionError::InvalidIdentifier("28355".to_string()))
        );
        assert!(matches!(
            "EPSG:abc".parse::<Crs>(),
            Err(ProjectionError::InvalidIdentifier(_))
        ));
        assert_eq!(
            "EPSG:4326".parse::<Crs>(),
            Err(ProjectionError::UnsupportedCrs(4326))
        );
    }

    #[test]
    fn test_central_meridian() {
        assert_eq!(UtmProjection::new(55, false).central_meridian(), 147.0);
        assert_eq!(UtmProjection::new(32, true).central_meridian(), 9.0);
    }

    #[test]
    fn test_point_on_central_meridian() {
        let crs: Crs = "EPSG:28355".parse().unwrap();
        let (e, n) = crs.project(-42.0, 147.0);
        assert!((e - 500_000.0).abs() < 1e-6, "easting on meridian: {}", e);
        assert!((n - 5_350_223.775).abs() < 1.0, "northing: {}", n);
    }

    #[test]
    fn test_hobart_mga55() {
        let crs: Crs = "EPSG:28355".parse().unwrap();
        let (e, n) = crs.project(-42.8821, 147.3272);
        assert!((e - 526_720.478).abs() < 1.0, "easting for Hobart: {}", e);
        assert!((n - 5_252_225.744).abs() < 1.0, "northing for Hobart: {}", n);
    }

    #[test]
    fn test_bergen_utm32n() {
        // Almost 4 degrees west of the central meridian
        let crs: Crs = "EPSG:32632".parse().unwrap();
        let (x, y) = crs.project(60.39, 5.32);
        assert!((x - 297_230.220).abs() < 1.0, "UTM easting for Bergen: {}", x);
        assert!((y - 6_700_510.175).abs() < 1.0, "UTM northing for Bergen: {}", y);
    }
}
