//! GPX reading and the streaming rewrite used to insert terrain elevation.
//!
//! Both directions walk the same `quick-xml` event stream. The rewrite copies
//! every event verbatim and only touches the points it was given a value
//! for, so everything else in the file survives byte for byte.

use super::TrackError;
use super::point::TrackPoint;
use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use std::fmt::Display;

pub(super) const TERRAIN_TAG: &str = "terrain_elevation";
const EXTENSIONS_TAG: &[u8] = b"extensions";
const POINT_TAG: &[u8] = b"trkpt";

/// Point children we read, matched on local name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Altitude,
    Time,
    Speed,
    MagneticVariation,
    TerrainElevation,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"ele" => Some(Self::Altitude),
            b"time" => Some(Self::Time),
            b"speed" => Some(Self::Speed),
            b"magvar" => Some(Self::MagneticVariation),
            b"terrain_elevation" => Some(Self::TerrainElevation),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Altitude => "ele",
            Self::Time => "time",
            Self::Speed => "speed",
            Self::MagneticVariation => "magvar",
            Self::TerrainElevation => TERRAIN_TAG,
        }
    }

    fn apply(self, point: &mut TrackPoint, raw: &str) -> Result<(), TrackError> {
        match self {
            Self::Time => point.time = Some(parse_time(raw)?),
            Self::Altitude => point.altitude = Some(parse_number(self.tag(), raw)?),
            Self::Speed => point.speed = Some(parse_number(self.tag(), raw)?),
            Self::MagneticVariation => {
                point.magnetic_variation = Some(parse_number(self.tag(), raw)?)
            }
            Self::TerrainElevation => {
                point.terrain_elevation = Some(parse_number(self.tag(), raw)?)
            }
        }
        Ok(())
    }
}

pub(super) struct ParsedTrack {
    pub namespace: Option<String>,
    pub points: Vec<TrackPoint>,
}

fn syntax_error(position: u64, e: impl Display) -> TrackError {
    TrackError::Parse(format!("{e} (at byte {position})"))
}

fn parse_number(tag: &str, raw: &str) -> Result<f64, TrackError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| TrackError::Parse(format!("invalid <{tag}> value '{}'", raw.trim())))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, TrackError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    // zone-less timestamps are taken as UTC
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TrackError::Parse(format!("invalid <time> value '{raw}'")))
}

fn coordinate(e: &BytesStart, attr: &str, limit: f64) -> Result<f64, TrackError> {
    let value = e
        .try_get_attribute(attr)
        .map_err(|err| TrackError::Parse(err.to_string()))?
        .ok_or_else(|| TrackError::Parse(format!("<trkpt> without '{attr}' attribute")))?;
    let raw = value
        .unescape_value()
        .map_err(|err| TrackError::Parse(err.to_string()))?;
    let v = parse_number(attr, &raw)?;
    if v.abs() > limit {
        return Err(TrackError::Parse(format!("{attr} {v} out of range")));
    }
    Ok(v)
}

fn default_namespace(e: &BytesStart) -> Result<Option<String>, TrackError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| TrackError::Parse(err.to_string()))?;
        if attr.key.as_ref() == b"xmlns" {
            let value = attr
                .unescape_value()
                .map_err(|err| TrackError::Parse(err.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

pub(super) fn parse(xml: &str) -> Result<ParsedTrack, TrackError> {
    let mut reader = Reader::from_str(xml);
    let mut namespace = None;
    let mut root_seen = false;
    let mut depth = 0usize;

    let mut points = Vec::new();
    let mut current: Option<TrackPoint> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| syntax_error(reader.buffer_position(), e))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let empty = matches!(event, Event::Empty(_));
                if !root_seen {
                    if e.local_name().as_ref() != b"gpx" {
                        return Err(TrackError::Parse(format!(
                            "root element is <{}>, expected <gpx>",
                            String::from_utf8_lossy(e.name().as_ref())
                        )));
                    }
                    namespace = default_namespace(e)?;
                    root_seen = true;
                }

                let name = e.local_name();
                if name.as_ref() == POINT_TAG {
                    if current.is_some() {
                        return Err(TrackError::Parse("nested <trkpt>".into()));
                    }
                    let point = TrackPoint::new(
                        coordinate(e, "lat", 90.0)?,
                        coordinate(e, "lon", 180.0)?,
                    );
                    if empty {
                        points.push(point);
                    } else {
                        current = Some(point);
                    }
                } else if current.is_some() && !empty {
                    if let Some(f) = Field::from_local_name(name.as_ref()) {
                        field = Some(f);
                        text.clear();
                    }
                }

                if !empty {
                    depth += 1;
                }
            }
            Event::Text(ref t) if field.is_some() => {
                let unescaped = t
                    .unescape()
                    .map_err(|e| syntax_error(reader.buffer_position(), e))?;
                text.push_str(&unescaped);
            }
            Event::CData(ref t) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(t));
            }
            Event::End(ref e) => {
                depth = depth.saturating_sub(1);
                let name = e.local_name();
                if let Some(f) = field.filter(|f| f.tag().as_bytes() == name.as_ref()) {
                    if let Some(point) = current.as_mut() {
                        f.apply(point, &text)?;
                    }
                    field = None;
                }
                if name.as_ref() == POINT_TAG {
                    if let Some(point) = current.take() {
                        points.push(point);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !root_seen {
        return Err(TrackError::Parse("missing <gpx> root element".into()));
    }
    if depth != 0 {
        return Err(TrackError::Parse("unexpected end of document".into()));
    }

    Ok(ParsedTrack { namespace, points })
}

fn write_error(e: impl Display) -> TrackError {
    TrackError::Write(e.to_string())
}

/// Namespace prefix of an element, if it has one.
fn element_prefix(e: &BytesStart) -> Option<String> {
    e.name()
        .prefix()
        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned())
}

/// `local` under the same prefix as the surrounding point.
fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{p}:{local}"),
        None => local.to_string(),
    }
}

fn write_terrain(
    writer: &mut Writer<Vec<u8>>,
    prefix: Option<&str>,
    value: f64,
) -> Result<(), TrackError> {
    let name = qualified(prefix, TERRAIN_TAG);
    let text = value.to_string();
    writer
        .write_event(Event::Start(BytesStart::new(name.as_str())))
        .map_err(write_error)?;
    writer
        .write_event(Event::Text(BytesText::new(&text)))
        .map_err(write_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(name.as_str())))
        .map_err(write_error)?;
    Ok(())
}

fn write_extensions_block(
    writer: &mut Writer<Vec<u8>>,
    prefix: Option<&str>,
    value: f64,
) -> Result<(), TrackError> {
    let name = qualified(prefix, "extensions");
    writer
        .write_event(Event::Start(BytesStart::new(name.as_str())))
        .map_err(write_error)?;
    write_terrain(writer, prefix, value)?;
    writer
        .write_event(Event::End(BytesEnd::new(name.as_str())))
        .map_err(write_error)?;
    Ok(())
}

/// Per-point rewrite state.
#[derive(Default)]
struct PointState {
    /// Value to insert, if this point was matched.
    elevation: Option<f64>,
    /// Open elements counting the `<trkpt>` itself; 0 outside a point.
    depth: usize,
    inserted: bool,
    /// Depth inside an existing `<terrain_elevation>` being dropped.
    skipping: usize,
    /// Prefix of the `<trkpt>` tag, reused for inserted elements.
    prefix: Option<String>,
}

/// Re-emit `xml`, giving point `i` a `<terrain_elevation>` of `elevations[i]`.
///
/// The value goes last inside the point's direct `<extensions>` child,
/// which is created when missing. An existing `<terrain_elevation>` on a
/// matched point is replaced; unmatched points are copied untouched.
pub(super) fn rewrite_with_elevation(
    xml: &str,
    elevations: &[Option<f64>],
) -> Result<String, TrackError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + elevations.len() * 64));
    let mut next_point = 0usize;
    let mut state = PointState::default();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| syntax_error(reader.buffer_position(), e))?;

        let keep = match &event {
            Event::Eof => break,
            _ if state.skipping > 0 => {
                match &event {
                    Event::Start(_) => state.skipping += 1,
                    Event::End(_) => state.skipping -= 1,
                    _ => {}
                }
                false
            }
            Event::Start(e) if state.depth == 0 && e.local_name().as_ref() == POINT_TAG => {
                state = PointState {
                    elevation: elevations.get(next_point).copied().flatten(),
                    depth: 1,
                    prefix: element_prefix(e),
                    ..PointState::default()
                };
                next_point += 1;
                true
            }
            Event::Empty(e) if state.depth == 0 && e.local_name().as_ref() == POINT_TAG => {
                let elevation = elevations.get(next_point).copied().flatten();
                next_point += 1;
                match elevation {
                    Some(value) => {
                        writer
                            .write_event(Event::Start(e.clone()))
                            .map_err(write_error)?;
                        let prefix = element_prefix(e);
                        write_extensions_block(&mut writer, prefix.as_deref(), value)?;
                        writer
                            .write_event(Event::End(e.to_end()))
                            .map_err(write_error)?;
                        false
                    }
                    None => true,
                }
            }
            Event::Start(e) if state.depth > 0 => {
                if state.elevation.is_some() && e.local_name().as_ref() == TERRAIN_TAG.as_bytes()
                {
                    state.skipping = 1;
                    false
                } else {
                    state.depth += 1;
                    true
                }
            }
            Event::Empty(e) if state.depth > 0 && state.elevation.is_some() => {
                let name = e.local_name();
                if name.as_ref() == TERRAIN_TAG.as_bytes() {
                    false
                } else if state.depth == 1 && name.as_ref() == EXTENSIONS_TAG && !state.inserted {
                    if let Some(value) = state.elevation {
                        write_extensions_block(&mut writer, state.prefix.as_deref(), value)?;
                        state.inserted = true;
                    }
                    false
                } else {
                    true
                }
            }
            Event::End(e) if state.depth > 0 => {
                let closes_extensions =
                    state.depth == 2 && e.local_name().as_ref() == EXTENSIONS_TAG;
                let closes_point = state.depth == 1;
                if let Some(value) = state.elevation.filter(|_| !state.inserted) {
                    let prefix = state.prefix.as_deref();
                    if closes_extensions {
                        write_terrain(&mut writer, prefix, value)?;
                        state.inserted = true;
                    } else if closes_point {
                        write_extensions_block(&mut writer, prefix, value)?;
                        state.inserted = true;
                    }
                }
                state.depth -= 1;
                if closes_point {
                    state = PointState::default();
                }
                true
            }
            _ => true,
        };

        if keep {
            writer.write_event(event.clone()).map_err(write_error)?;
        }
    }

    String::from_utf8(writer.into_inner()).map_err(write_error)
}
