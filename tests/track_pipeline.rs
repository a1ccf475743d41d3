//! End-to-end track handling through the public API: parse a GPX file,
//! merge a batched elevation response, write the enriched copy and read it
//! back.

use logbook_media::external::ElevationResult;
use logbook_media::external::elevation::to_lookup;
use logbook_media::geo::{GeoPoint, suggest_legs};
use logbook_media::track::{TrackDocument, terrain_file_name};

const GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="skydemon" xmlns="http://www.topografix.com/GPX/1/1">
  <metadata><name>LKTB-LKCB</name></metadata>
  <trk>
    <name>Flight</name>
    <trkseg>
      <trkpt lat="49.151269" lon="16.694433">
        <ele>237.0</ele>
        <time>2024-05-01T08:00:00Z</time>
        <speed>0.0</speed>
      </trkpt>
      <trkpt lat="49.300000" lon="16.100000">
        <ele>1200.0</ele>
        <time>2024-05-01T08:20:00Z</time>
        <speed>52.5</speed>
        <extensions><course>280</course></extensions>
      </trkpt>
      <trkpt lat="49.402778" lon="15.700000">
        <ele>640.0</ele>
        <time>2024-05-01T08:41:30Z</time>
        <speed>10.0</speed>
      </trkpt>
    </trkseg>
  </trk>
</gpx>
"#;

fn results() -> Vec<ElevationResult> {
    // reordered and missing the middle point, as the service may do
    vec![
        ElevationResult {
            latitude: 49.402778,
            longitude: 15.7,
            elevation: 611.0,
        },
        ElevationResult {
            latitude: 49.151269,
            longitude: 16.694433,
            elevation: 233.0,
        },
    ]
}

#[test]
fn enrich_write_and_reparse() {
    let tmp = tempfile::TempDir::new().unwrap();
    let source = tmp.path().join("a1b2.gpx");
    std::fs::write(&source, GPX).unwrap();

    let document = TrackDocument::parse(&source).unwrap();
    assert_eq!(document.len(), 3);
    assert_eq!(document.max_speed(), Some(52.5));
    assert_eq!(document.avg_altitude(), Some(692.33));
    assert_eq!(document.duration(), Some(chrono::TimeDelta::seconds(2490)));

    let merged = document
        .merge_terrain_elevation(&to_lookup(&results()))
        .unwrap();
    let target = tmp.path().join(terrain_file_name("a1b2.gpx"));
    merged.write(&target).unwrap();

    let reread = TrackDocument::parse(&target).unwrap();
    let terrain: Vec<Option<f64>> = reread.points().iter().map(|p| p.terrain_elevation).collect();
    assert_eq!(terrain, vec![Some(233.0), None, Some(611.0)]);
    assert_eq!(reread.namespace(), Some("http://www.topografix.com/GPX/1/1"));
    assert_eq!(reread.altitudes(), document.altitudes());
    assert_eq!(reread.timestamps(), document.timestamps());

    let text = std::fs::read_to_string(&target).unwrap();
    assert!(text.contains("<course>280</course>"));
    assert!(text.contains("<name>LKTB-LKCB</name>"));
}

#[test]
fn plain_write_is_byte_identical() {
    let tmp = tempfile::TempDir::new().unwrap();
    let target = tmp.path().join("copy.gpx");
    TrackDocument::from_xml(GPX).unwrap().write(&target).unwrap();
    assert_eq!(std::fs::read_to_string(&target).unwrap(), GPX);
}

#[test]
fn legs_from_track_ends() {
    let document = TrackDocument::from_xml(GPX).unwrap();
    let airfields = [
        GeoPoint::new(49.151, 16.694),
        GeoPoint::new(49.403, 15.700),
    ];
    let legs = suggest_legs(
        document.first_point().map(|p| p.position()),
        document.last_point().map(|p| p.position()),
        &airfields,
        1.0,
    );
    assert_eq!(legs.takeoff, Some(&airfields[0]));
    assert_eq!(legs.landing, Some(&airfields[1]));
}

#[test]
fn malformed_point_rejects_document() {
    let broken = GPX.replace(r#"lon="16.100000""#, r#"lon="east""#);
    assert!(TrackDocument::from_xml(broken).is_err());
}
