//! Shared test fixtures for the logbook-media test suite.
//!
//! Provides synthetic images (with and without an EXIF block) and a small
//! GPX track, so unit tests never depend on binary fixture files.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let photo = tmp.path().join("photo.jpg");
//! write_test_jpeg(&photo, 400, 300);
//!
//! let track = tmp.path().join("flight.gpx");
//! std::fs::write(&track, SAMPLE_GPX).unwrap();
//! ```

use image::{ImageEncoder, RgbImage};
use std::path::Path;

// =========================================================================
// Images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Encode a gradient JPEG in memory.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut bytes = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut bytes)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    bytes
}

/// Create a small valid JPEG file with the given dimensions.
pub fn write_test_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, jpeg_bytes(width, height)).unwrap();
}

/// A JPEG carrying an EXIF block with:
///
/// - `DateTime` 2023-07-14 09:30:00
/// - `Orientation` 6
/// - GPS 49°30'36" N, 14°10'48" W (49.51, -14.18), altitude 350 m above sea level
pub fn jpeg_with_exif(width: u32, height: u32) -> Vec<u8> {
    let jpeg = jpeg_bytes(width, height);
    let tiff = exif_tiff_block();

    let mut out = Vec::with_capacity(jpeg.len() + tiff.len() + 10);
    // SOI, then APP1 before everything else
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

fn ifd_entry(buf: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: [u8; 4]) {
    buf.extend_from_slice(&tag.to_le_bytes());
    buf.extend_from_slice(&kind.to_le_bytes());
    buf.extend_from_slice(&count.to_le_bytes());
    buf.extend_from_slice(&value);
}

/// Little-endian TIFF: IFD0 (3 entries) at 8, GPS IFD (6 entries) at 50,
/// value data from 128.
fn exif_tiff_block() -> Vec<u8> {
    const ASCII: u16 = 2;
    const BYTE: u16 = 1;
    const SHORT: u16 = 3;
    const LONG: u16 = 4;
    const RATIONAL: u16 = 5;

    const GPS_IFD: u32 = 50;
    const LATITUDE: u32 = 128;
    const LONGITUDE: u32 = 152;
    const ALTITUDE: u32 = 176;
    const DATETIME: u32 = 184;

    let mut b = Vec::new();
    b.extend_from_slice(b"II");
    b.extend_from_slice(&42u16.to_le_bytes());
    b.extend_from_slice(&8u32.to_le_bytes());

    b.extend_from_slice(&3u16.to_le_bytes());
    ifd_entry(&mut b, 0x0112, SHORT, 1, [6, 0, 0, 0]);
    ifd_entry(&mut b, 0x0132, ASCII, 20, DATETIME.to_le_bytes());
    ifd_entry(&mut b, 0x8825, LONG, 1, GPS_IFD.to_le_bytes());
    b.extend_from_slice(&0u32.to_le_bytes());
    assert_eq!(b.len(), GPS_IFD as usize);

    b.extend_from_slice(&6u16.to_le_bytes());
    ifd_entry(&mut b, 0x0001, ASCII, 2, [b'N', 0, 0, 0]);
    ifd_entry(&mut b, 0x0002, RATIONAL, 3, LATITUDE.to_le_bytes());
    ifd_entry(&mut b, 0x0003, ASCII, 2, [b'W', 0, 0, 0]);
    ifd_entry(&mut b, 0x0004, RATIONAL, 3, LONGITUDE.to_le_bytes());
    ifd_entry(&mut b, 0x0005, BYTE, 1, [0, 0, 0, 0]);
    ifd_entry(&mut b, 0x0006, RATIONAL, 1, ALTITUDE.to_le_bytes());
    b.extend_from_slice(&0u32.to_le_bytes());
    assert_eq!(b.len(), LATITUDE as usize);

    for (num, den) in [(49u32, 1u32), (30, 1), (36, 1), (14, 1), (10, 1), (48, 1), (350, 1)] {
        b.extend_from_slice(&num.to_le_bytes());
        b.extend_from_slice(&den.to_le_bytes());
    }
    assert_eq!(b.len(), DATETIME as usize);
    b.extend_from_slice(b"2023:07:14 09:30:00\0");
    b
}

// =========================================================================
// Tracks
// =========================================================================

/// Two-point GPX 1.1 track. The second point already carries an
/// `<extensions>` block with unrelated content.
pub const SAMPLE_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="logbook-tests" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>LKTB local</name>
    <trkseg>
      <trkpt lat="49.500000" lon="14.180000">
        <ele>420.5</ele>
        <time>2023-07-14T09:30:00Z</time>
        <speed>20.5</speed>
        <magvar>4.2</magvar>
      </trkpt>
      <trkpt lat="49.510000" lon="14.190000">
        <ele>650.0</ele>
        <time>2023-07-14T09:35:00Z</time>
        <speed>35.0</speed>
        <extensions><note>cruise</note></extensions>
      </trkpt>
    </trkseg>
  </trk>
</gpx>
"#;

/// Write [`SAMPLE_GPX`] to `path`.
pub fn write_sample_gpx(path: &Path) {
    std::fs::write(path, SAMPLE_GPX).unwrap();
}
