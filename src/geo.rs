//! Great-circle matching between GPS points and known locations.
//!
//! Used to guess the takeoff and landing airport of a flight from the first
//! and last point of its track, and to turn EXIF degree/minute/second triples
//! into decimal degrees.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by every distance computation in the crate.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default cutoff for auto-guessing an airport from a track endpoint.
pub const DEFAULT_MATCH_DISTANCE_KM: f64 = 1.0;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance in kilometres (spherical law of cosines).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let phi1 = self.latitude.to_radians();
        let phi2 = other.latitude.to_radians();
        let delta_lambda = (other.longitude - self.longitude).to_radians();

        let cos_angle =
            phi1.sin() * phi2.sin() + phi1.cos() * phi2.cos() * delta_lambda.cos();
        // Rounding can push identical points slightly above 1.0.
        EARTH_RADIUS_KM * cos_angle.clamp(-1.0, 1.0).acos()
    }
}

/// Anything that can be matched against a GPS point.
pub trait Locatable {
    /// Position of the candidate, if known.
    fn position(&self) -> Option<GeoPoint>;

    /// Whether this candidate takes part in automatic matching.
    fn usable_for_matching(&self) -> bool {
        true
    }
}

impl Locatable for GeoPoint {
    fn position(&self) -> Option<GeoPoint> {
        Some(*self)
    }
}

/// Find the candidate closest to `point`, strictly under `max_distance_km`.
///
/// Candidates without a position or not flagged for matching are ignored.
/// On equal distance the earlier candidate wins.
pub fn nearest<'a, T: Locatable>(
    point: &GeoPoint,
    candidates: &'a [T],
    max_distance_km: f64,
) -> Option<&'a T> {
    let mut best: Option<(&T, f64)> = None;

    for candidate in candidates.iter().filter(|c| c.usable_for_matching()) {
        let Some(position) = candidate.position() else {
            continue;
        };
        let distance = point.distance_km(&position);
        if distance >= max_distance_km {
            continue;
        }
        match best {
            Some((_, best_distance)) if best_distance <= distance => {}
            _ => best = Some((candidate, distance)),
        }
    }

    best.map(|(candidate, _)| candidate)
}

/// Convert a degrees/minutes/seconds triple into decimal degrees.
pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}

/// Airports guessed for both ends of a track.
#[derive(Debug, Clone, PartialEq)]
pub struct LegSuggestion<'a, T> {
    pub takeoff: Option<&'a T>,
    pub landing: Option<&'a T>,
}

/// Guess takeoff and landing candidates from the first and last track point.
pub fn suggest_legs<'a, T: Locatable>(
    first: Option<GeoPoint>,
    last: Option<GeoPoint>,
    candidates: &'a [T],
    max_distance_km: f64,
) -> LegSuggestion<'a, T> {
    LegSuggestion {
        takeoff: first.and_then(|p| nearest(&p, candidates, max_distance_km)),
        landing: last.and_then(|p| nearest(&p, candidates, max_distance_km)),
    }
}
