//! Geographic ranges accepted at the API boundary.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(Error::InvalidInput(format!("lat/lon out of range: ({lat}, {lon})")));
        }
        Ok(Self { lat, lon })
    }

    /// Great-circle distance in meters (haversine).
    pub fn distance_m(&self, other: &LatLon) -> f64 {
        let (phi1, phi2) = (self.lat.to_radians(), other.lat.to_radians());
        let dphi = phi2 - phi1;
        let dlambda = (other.lon - self.lon).to_radians();
        let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
    }
}

/// Axis-aligned lat/lon box, inclusive on all sides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub const WORLD: BoundingBox = BoundingBox {
        min_lat: -90.0,
        min_lon: -180.0,
        max_lat: 90.0,
        max_lon: 180.0,
    };

    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Result<Self> {
        let bbox = Self { min_lat, min_lon, max_lat, max_lon };
        bbox.validate()?;
        Ok(bbox)
    }

    pub fn validate(&self) -> Result<()> {
        LatLon::new(self.min_lat, self.min_lon)?;
        LatLon::new(self.max_lat, self.max_lon)?;
        if self.min_lat > self.max_lat || self.min_lon > self.max_lon {
            return Err(Error::InvalidInput(format!(
                "bounding box min exceeds max: ({}, {}) > ({}, {})",
                self.min_lat, self.min_lon, self.max_lat, self.max_lon
            )));
        }
        Ok(())
    }

    pub fn contains(&self, p: &LatLon) -> bool {
        (self.min_lat..=self.max_lat).contains(&p.lat) && (self.min_lon..=self.max_lon).contains(&p.lon)
    }
}
