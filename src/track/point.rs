use crate::geo::GeoPoint;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Decimal places used to identify a coordinate.
pub const COORD_PRECISION: u32 = 6;

const COORD_SCALE: f64 = 1_000_000.0;

/// A coordinate pair rounded to [`COORD_PRECISION`] decimal places.
///
/// Stored as scaled integers so it can be hashed and compared exactly.
/// Two points that round to the same key are the same point for elevation
/// merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordKey {
    lat_e6: i64,
    lng_e6: i64,
}

impl CoordKey {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            lat_e6: (latitude * COORD_SCALE).round() as i64,
            lng_e6: (longitude * COORD_SCALE).round() as i64,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.lat_e6 as f64 / COORD_SCALE
    }

    pub fn longitude(&self) -> f64 {
        self.lng_e6 as f64 / COORD_SCALE
    }
}

impl From<GeoPoint> for CoordKey {
    fn from(p: GeoPoint) -> Self {
        Self::new(p.latitude, p.longitude)
    }
}

/// One `<trkpt>` in file order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    pub speed: Option<f64>,
    pub magnetic_variation: Option<f64>,
    pub terrain_elevation: Option<f64>,
}

impl TrackPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            time: None,
            speed: None,
            magnetic_variation: None,
            terrain_elevation: None,
        }
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn key(&self) -> CoordKey {
        CoordKey::new(self.latitude, self.longitude)
    }
}
