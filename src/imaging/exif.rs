//! Capture metadata from EXIF.
//!
//! Only the handful of tags the logbook cares about are read: when the photo
//! was taken, where, and at what GPS altitude.
//! A file without an EXIF block is perfectly normal (screenshots, exports)
//! and yields [`CaptureMetadata::default`].

use super::backend::ImagingError;
use crate::geo::{GeoPoint, dms_to_decimal};
use chrono::{NaiveDate, NaiveDateTime};
use exif::{Exif, In, Tag, Value};
use std::io::Cursor;
use std::path::Path;

/// Timestamp tags in order of preference.
const TIMESTAMP_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureMetadata {
    /// Camera-local capture time; EXIF carries no zone.
    pub taken_at: Option<NaiveDateTime>,
    pub gps: Option<GeoPoint>,
    /// Metres above sea level as recorded by the camera.
    pub altitude: Option<f64>,
}

/// Read capture metadata from an image on disk.
pub fn read_capture_metadata(path: &Path) -> Result<CaptureMetadata, ImagingError> {
    let bytes = std::fs::read(path)?;
    Ok(parse_capture_metadata(&bytes))
}

/// Parse capture metadata from an in-memory image.
pub fn parse_capture_metadata(bytes: &[u8]) -> CaptureMetadata {
    let Ok(exif) = exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) else {
        return CaptureMetadata::default();
    };

    CaptureMetadata {
        taken_at: TIMESTAMP_TAGS.iter().find_map(|tag| timestamp(&exif, *tag)),
        gps: gps_position(&exif),
        altitude: gps_altitude(&exif),
    }
}

fn timestamp(exif: &Exif, tag: Tag) -> Option<NaiveDateTime> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let Value::Ascii(ref parts) = field.value else {
        return None;
    };
    let dt = exif::DateTime::from_ascii(parts.first()?).ok()?;
    NaiveDate::from_ymd_opt(dt.year as i32, dt.month as u32, dt.day as u32)?.and_hms_opt(
        dt.hour as u32,
        dt.minute as u32,
        dt.second as u32,
    )
}

/// Degrees/minutes/seconds rational triple to decimal degrees.
fn dms(exif: &Exif, tag: Tag) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match field.value {
        Value::Rational(ref v) if v.len() >= 3 => {
            let parts: Vec<f64> = v.iter().take(3).map(|r| r.to_f64()).collect();
            let decimal = dms_to_decimal(parts[0], parts[1], parts[2]);
            decimal.is_finite().then_some(decimal)
        }
        _ => None,
    }
}

/// First character of an ASCII reference tag (`N`, `S`, `E`, `W`).
fn reference(exif: &Exif, tag: Tag) -> Option<u8> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match field.value {
        Value::Ascii(ref parts) => parts.first()?.first().copied(),
        _ => None,
    }
}

fn gps_position(exif: &Exif) -> Option<GeoPoint> {
    let mut latitude = dms(exif, Tag::GPSLatitude)?;
    let mut longitude = dms(exif, Tag::GPSLongitude)?;
    if reference(exif, Tag::GPSLatitudeRef) == Some(b'S') {
        latitude = -latitude;
    }
    if reference(exif, Tag::GPSLongitudeRef) == Some(b'W') {
        longitude = -longitude;
    }
    Some(GeoPoint::new(latitude, longitude))
}

fn gps_altitude(exif: &Exif) -> Option<f64> {
    let field = exif.get_field(Tag::GPSAltitude, In::PRIMARY)?;
    let Value::Rational(ref v) = field.value else {
        return None;
    };
    let altitude = v.first()?.to_f64();
    if !altitude.is_finite() {
        return None;
    }
    // ref 1 means below sea level
    let below = exif
        .get_field(Tag::GPSAltitudeRef, In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        == Some(1);
    Some(if below { -altitude } else { altitude })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{jpeg_bytes, jpeg_with_exif};

    #[test]
    fn jpeg_without_exif_is_empty_metadata() {
        let meta = parse_capture_metadata(&jpeg_bytes(16, 16));
        assert_eq!(meta, CaptureMetadata::default());
    }

    #[test]
    fn garbage_bytes_are_empty_metadata() {
        assert_eq!(
            parse_capture_metadata(b"not an image"),
            CaptureMetadata::default()
        );
    }

    #[test]
    fn reads_gps_altitude_and_timestamp() {
        let bytes = jpeg_with_exif(16, 16);
        let meta = parse_capture_metadata(&bytes);

        let gps = meta.gps.expect("gps present");
        assert!((gps.latitude - 49.51).abs() < 1e-9);
        assert!((gps.longitude + 14.18).abs() < 1e-9, "west is negative");
        assert_eq!(meta.altitude, Some(350.0));
        assert_eq!(
            meta.taken_at,
            NaiveDate::from_ymd_opt(2023, 7, 14).and_then(|d| d.and_hms_opt(9, 30, 0))
        );
    }

    #[test]
    fn read_from_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("exif.jpg");
        std::fs::write(&path, jpeg_with_exif(8, 8)).unwrap();
        let meta = read_capture_metadata(&path).unwrap();
        assert!(meta.gps.is_some());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_capture_metadata(Path::new("/nonexistent/photo.jpg")).unwrap_err();
        assert!(matches!(err, ImagingError::Io(_)));
    }
}
