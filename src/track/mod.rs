//! GPX flight tracks.
//!
//! [`TrackDocument`] keeps the original file text next to the parsed points.
//! Derived series and summaries are computed on first access and cached for
//! the lifetime of the document. Merging terrain elevation never mutates a
//! document; it produces a new one from a rewritten copy of the text.
//!
//! ```text
//! parse(flight.gpx) ──► TrackDocument ──merge_terrain_elevation(lookup)──► TrackDocument
//!                            │                                               │
//!                            └─ write(path): original bytes                  └─ write(path)
//! ```

mod elevation;
mod point;
mod xml;

pub use elevation::ElevationLookup;
pub use point::{COORD_PRECISION, CoordKey, TrackPoint};

use crate::files::write_atomic;
use crate::geo::GeoPoint;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cell::OnceCell;
use std::path::Path;
use thiserror::Error;

/// Filename prefix of a track with merged terrain elevation.
pub const TERRAIN_PREFIX: &str = "terrain_";

#[derive(Error, Debug)]
pub enum TrackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid track file: {0}")]
    Parse(String),
    #[error("Failed to write track: {0}")]
    Write(String),
}

/// Name of the enriched copy of `filename`.
///
/// Already enriched names are returned unchanged, so enriching an enriched
/// track does not stack prefixes.
pub fn terrain_file_name(filename: &str) -> String {
    let base = filename.strip_prefix(TERRAIN_PREFIX).unwrap_or(filename);
    format!("{TERRAIN_PREFIX}{base}")
}

/// Scalar summaries of a track. Averages are rounded to two decimals;
/// every value is `None` when its series is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackSummary {
    pub points: usize,
    pub max_speed: Option<f64>,
    pub avg_speed: Option<f64>,
    pub max_altitude: Option<f64>,
    pub avg_altitude: Option<f64>,
    pub duration_seconds: Option<i64>,
}

fn max(series: &[f64]) -> Option<f64> {
    series.iter().copied().reduce(f64::max)
}

fn avg(series: &[f64]) -> Option<f64> {
    if series.is_empty() {
        return None;
    }
    let mean = series.iter().sum::<f64>() / series.len() as f64;
    Some((mean * 100.0).round() / 100.0)
}

#[derive(Debug)]
pub struct TrackDocument {
    source: String,
    namespace: Option<String>,
    points: Vec<TrackPoint>,

    coordinates: OnceCell<Vec<GeoPoint>>,
    timestamps: OnceCell<Vec<DateTime<Utc>>>,
    altitudes: OnceCell<Vec<f64>>,
    speeds: OnceCell<Vec<f64>>,
    magnetic_variations: OnceCell<Vec<f64>>,
    terrain_elevations: OnceCell<Vec<f64>>,
    summary: OnceCell<TrackSummary>,
}

impl TrackDocument {
    /// Read and parse a GPX file.
    pub fn parse(path: &Path) -> Result<Self, TrackError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_xml(text)
    }

    /// Parse GPX text. Any malformed point fails the whole document.
    pub fn from_xml(text: impl Into<String>) -> Result<Self, TrackError> {
        let source = text.into();
        let parsed = xml::parse(&source)?;
        Ok(Self {
            source,
            namespace: parsed.namespace,
            points: parsed.points,
            coordinates: OnceCell::new(),
            timestamps: OnceCell::new(),
            altitudes: OnceCell::new(),
            speeds: OnceCell::new(),
            magnetic_variations: OnceCell::new(),
            terrain_elevations: OnceCell::new(),
            summary: OnceCell::new(),
        })
    }

    /// Default namespace declared on the root element.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_point(&self) -> Option<&TrackPoint> {
        self.points.first()
    }

    pub fn last_point(&self) -> Option<&TrackPoint> {
        self.points.last()
    }

    pub fn as_xml(&self) -> &str {
        &self.source
    }

    pub fn coordinates(&self) -> &[GeoPoint] {
        self.coordinates
            .get_or_init(|| self.points.iter().map(TrackPoint::position).collect())
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        self.timestamps
            .get_or_init(|| self.points.iter().filter_map(|p| p.time).collect())
    }

    pub fn altitudes(&self) -> &[f64] {
        self.altitudes
            .get_or_init(|| self.points.iter().filter_map(|p| p.altitude).collect())
    }

    pub fn speeds(&self) -> &[f64] {
        self.speeds
            .get_or_init(|| self.points.iter().filter_map(|p| p.speed).collect())
    }

    pub fn magnetic_variations(&self) -> &[f64] {
        self.magnetic_variations.get_or_init(|| {
            self.points
                .iter()
                .filter_map(|p| p.magnetic_variation)
                .collect()
        })
    }

    pub fn terrain_elevations(&self) -> &[f64] {
        self.terrain_elevations.get_or_init(|| {
            self.points
                .iter()
                .filter_map(|p| p.terrain_elevation)
                .collect()
        })
    }

    pub fn summary(&self) -> &TrackSummary {
        self.summary.get_or_init(|| {
            let timestamps = self.timestamps();
            TrackSummary {
                points: self.points.len(),
                max_speed: max(self.speeds()),
                avg_speed: avg(self.speeds()),
                max_altitude: max(self.altitudes()),
                avg_altitude: avg(self.altitudes()),
                duration_seconds: timestamps
                    .first()
                    .zip(timestamps.last())
                    .map(|(start, end)| (*end - *start).num_seconds()),
            }
        })
    }

    pub fn max_speed(&self) -> Option<f64> {
        self.summary().max_speed
    }

    pub fn avg_speed(&self) -> Option<f64> {
        self.summary().avg_speed
    }

    pub fn max_altitude(&self) -> Option<f64> {
        self.summary().max_altitude
    }

    pub fn avg_altitude(&self) -> Option<f64> {
        self.summary().avg_altitude
    }

    pub fn duration(&self) -> Option<chrono::TimeDelta> {
        self.summary()
            .duration_seconds
            .map(chrono::TimeDelta::seconds)
    }

    /// A new document whose matched points carry `<terrain_elevation>`.
    ///
    /// Point count, order and every other field are unchanged; points
    /// without a match keep whatever they had.
    pub fn merge_terrain_elevation(&self, lookup: &ElevationLookup) -> Result<Self, TrackError> {
        let values: Vec<Option<f64>> = self.points.iter().map(|p| lookup.get(p.key())).collect();
        let text = xml::rewrite_with_elevation(&self.source, &values)?;
        Self::from_xml(text)
    }

    /// Write the document text to `path`.
    pub fn write(&self, path: &Path) -> Result<(), TrackError> {
        write_atomic(path, self.source.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::SAMPLE_GPX;

    fn sample() -> TrackDocument {
        TrackDocument::from_xml(SAMPLE_GPX).unwrap()
    }

    #[test]
    fn series_and_summaries() {
        let doc = sample();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.namespace(), Some("http://www.topografix.com/GPX/1/1"));
        assert_eq!(doc.altitudes(), &[420.5, 650.0]);
        assert_eq!(doc.speeds(), &[20.5, 35.0]);
        assert_eq!(doc.magnetic_variations(), &[4.2]);
        assert!(doc.terrain_elevations().is_empty());

        assert_eq!(doc.max_speed(), Some(35.0));
        assert_eq!(doc.avg_speed(), Some(27.75));
        assert_eq!(doc.max_altitude(), Some(650.0));
        assert_eq!(doc.avg_altitude(), Some(535.25));
        assert_eq!(doc.duration(), Some(chrono::TimeDelta::minutes(5)));
    }

    #[test]
    fn averages_round_to_two_decimals() {
        assert_eq!(avg(&[1.0, 1.0, 2.0]), Some(1.33));
        assert_eq!(avg(&[]), None);
        assert_eq!(max(&[]), None);
    }

    #[test]
    fn empty_track_has_no_summaries() {
        let doc = TrackDocument::from_xml(
            r#"<gpx xmlns="http://www.topografix.com/GPX/1/1"><trk><trkseg/></trk></gpx>"#,
        )
        .unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc.summary(), &TrackSummary::default());
        assert!(doc.first_point().is_none());
        assert!(doc.duration().is_none());
    }

    #[test]
    fn views_are_computed_once() {
        let doc = sample();
        assert!(std::ptr::eq(doc.altitudes(), doc.altitudes()));
        assert!(std::ptr::eq(doc.coordinates(), doc.coordinates()));
        assert!(std::ptr::eq(doc.summary(), doc.summary()));
    }

    #[test]
    fn merge_matches_only_known_coordinates() {
        let doc = sample();
        let lookup: ElevationLookup = [(GeoPoint::new(49.50, 14.18), 350.0)].into_iter().collect();

        let merged = doc.merge_terrain_elevation(&lookup).unwrap();
        assert_eq!(merged.points()[0].terrain_elevation, Some(350.0));
        assert_eq!(merged.points()[1].terrain_elevation, None);
        // source untouched
        assert!(doc.terrain_elevations().is_empty());
    }

    #[test]
    fn merge_preserves_everything_else() {
        let doc = sample();
        let lookup: ElevationLookup = doc
            .coordinates()
            .iter()
            .map(|p| (*p, 100.0))
            .collect();
        let merged = doc.merge_terrain_elevation(&lookup).unwrap();

        assert_eq!(merged.len(), doc.len());
        assert_eq!(merged.namespace(), doc.namespace());
        for (before, after) in doc.points().iter().zip(merged.points()) {
            assert_eq!(
                TrackPoint {
                    terrain_elevation: None,
                    ..after.clone()
                },
                *before
            );
            assert_eq!(after.terrain_elevation, Some(100.0));
        }
    }

    #[test]
    fn merge_is_idempotent() {
        let lookup: ElevationLookup = [(GeoPoint::new(49.51, 14.19), 480.0)].into_iter().collect();
        let once = sample().merge_terrain_elevation(&lookup).unwrap();
        let twice = once.merge_terrain_elevation(&lookup).unwrap();
        assert_eq!(once.as_xml(), twice.as_xml());
    }

    #[test]
    fn write_without_merge_is_byte_identical() {
        let tmp = tempfile::TempDir::new().unwrap();
        let input = tmp.path().join("in.gpx");
        let output = tmp.path().join("out.gpx");
        std::fs::write(&input, SAMPLE_GPX).unwrap();

        TrackDocument::parse(&input).unwrap().write(&output).unwrap();
        assert_eq!(std::fs::read(&input).unwrap(), std::fs::read(&output).unwrap());
    }

    #[test]
    fn parse_missing_file_is_io_error() {
        let err = TrackDocument::parse(Path::new("/nonexistent/track.gpx")).unwrap_err();
        assert!(matches!(err, TrackError::Io(_)));
    }

    #[test]
    fn terrain_names_do_not_stack() {
        assert_eq!(terrain_file_name("abc.gpx"), "terrain_abc.gpx");
        assert_eq!(terrain_file_name("terrain_abc.gpx"), "terrain_abc.gpx");
    }
}
