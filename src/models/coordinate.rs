//! Geodetic coordinates and the WGS84 ECEF transform.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

const DTOR: f64 = PI / 180.0;

/// WGS84 semi-major axis in meters.
const WGS84_A: f64 = 6_378_137.0;

/// WGS84 flattening.
const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// WGS84 first eccentricity squared.
const WGS84_ECC_SQ: f64 = WGS84_F * (2.0 - WGS84_F);

/// Latitude/longitude in decimal degrees, ellipsoidal height in meters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Llh {
    /// Latitude, positive north.
    pub lat: f64,
    /// Longitude, positive east.
    pub lon: f64,
    /// Height above the WGS84 ellipsoid.
    pub alt: f64,
}

impl Llh {
    /// Build a coordinate, rejecting non-finite or out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Coordinate` if any component is not finite or the
    /// latitude/longitude fall outside their valid ranges.
    pub fn new(lat: f64, lon: f64, alt: f64) -> Result<Self> {
        if !(lat.is_finite() && lon.is_finite() && alt.is_finite()) {
            return Err(AppError::Coordinate(format!(
                "non-finite coordinate ({lat}, {lon}, {alt})"
            )));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::Coordinate(format!("latitude {lat} out of range")));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(AppError::Coordinate(format!("longitude {lon} out of range")));
        }
        Ok(Self { lat, lon, alt })
    }

    /// Convert to Earth-centered, Earth-fixed coordinates on WGS84.
    #[must_use]
    pub fn to_ecef(&self) -> Ecef {
        let lat = self.lat * DTOR;
        let lon = self.lon * DTOR;
        let (slat, clat) = lat.sin_cos();
        let (slon, clon) = lon.sin_cos();

        // Prime vertical radius of curvature.
        let rn = WGS84_A / (1.0 - WGS84_ECC_SQ * slat * slat).sqrt();

        Ecef {
            x: (rn + self.alt) * clat * clon,
            y: (rn + self.alt) * clat * slon,
            z: (rn * (1.0 - WGS84_ECC_SQ) + self.alt) * slat,
        }
    }
}

/// Earth-centered, Earth-fixed cartesian position in meters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Ecef {
    /// X axis through the prime meridian at the equator.
    pub x: f64,
    /// Y axis through 90° east at the equator.
    pub y: f64,
    /// Z axis through the north pole.
    pub z: f64,
}

/// Converged rover position recorded when a session reaches fix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FixedPosition {
    /// Position as reported by the engine.
    pub llh: Llh,
    /// Same position in ECEF.
    pub ecef: Ecef,
}

impl From<Llh> for FixedPosition {
    fn from(llh: Llh) -> Self {
        Self {
            ecef: llh.to_ecef(),
            llh,
        }
    }
}
