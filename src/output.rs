//! CLI output formatting.
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and is printed with [`print_lines`]. Format functions are
//! pure: no I/O, no side effects.
//!
//! ```text
//! Track flight.gpx (2 points)
//!     Duration: 0h 05m 00s
//!     Speed: max 35.00, avg 27.75
//!     Altitude: max 650.0 m, avg 535.2 m
//!     Terrain elevation: 2 of 2 points
//! ```

use crate::external::WeatherSample;
use crate::geo::GeoPoint;
use crate::store::AirportRecord;
use crate::track::TrackSummary;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn detail(label: &str, value: impl std::fmt::Display) -> String {
    format!("{}{label}: {value}", indent(1))
}

/// `Some(x)` with `decimals` places, `-` otherwise.
fn number(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{v:.decimals$}"),
        None => "-".to_string(),
    }
}

fn format_duration(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let s = seconds.unsigned_abs();
    format!("{sign}{}h {:02}m {:02}s", s / 3600, (s % 3600) / 60, s % 60)
}

fn format_position(point: &GeoPoint) -> String {
    format!("{:.6}, {:.6}", point.latitude, point.longitude)
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

/// Summary block for one track file.
pub fn format_track_summary(name: &str, summary: &TrackSummary, terrain_points: usize) -> Vec<String> {
    vec![
        format!("Track {name} ({} points)", summary.points),
        detail(
            "Duration",
            summary
                .duration_seconds
                .map(format_duration)
                .unwrap_or_else(|| "-".into()),
        ),
        detail(
            "Speed",
            format!(
                "max {}, avg {}",
                number(summary.max_speed, 2),
                number(summary.avg_speed, 2)
            ),
        ),
        detail(
            "Altitude",
            format!(
                "max {} m, avg {} m",
                number(summary.max_altitude, 1),
                number(summary.avg_altitude, 1)
            ),
        ),
        detail(
            "Terrain elevation",
            format!("{terrain_points} of {} points", summary.points),
        ),
    ]
}

/// Result of enriching a track file.
pub fn format_enrich_result(source: &str, target: &str, points: usize, matched: usize) -> Vec<String> {
    vec![
        format!("{source} \u{2192} {target}"),
        detail("Matched", format!("{matched} of {points} points")),
    ]
}

/// One hourly weather sample.
pub fn format_weather_sample(position: &GeoPoint, sample: &WeatherSample) -> Vec<String> {
    vec![
        format!(
            "Weather at {} for {}",
            format_position(position),
            sample.datetime.format("%Y-%m-%d %H:%M UTC")
        ),
        detail("QNH", format!("{} hPa", number(sample.qnh, 1))),
        detail(
            "Temperature",
            format!(
                "{} °C (dewpoint {} °C)",
                number(sample.temperature_surface, 1),
                number(sample.dewpoint_surface, 1)
            ),
        ),
        detail(
            "Wind",
            format!(
                "{}° at {} km/h",
                number(sample.wind_direction_surface, 0),
                number(sample.wind_speed_surface, 1)
            ),
        ),
        detail(
            "Cloud cover",
            format!(
                "{} % (low {} %)",
                number(sample.cloudcover_total, 0),
                number(sample.cloudcover_low, 0)
            ),
        ),
        detail("Rain", format!("{} mm", number(sample.rain, 1))),
    ]
}

/// Nearest airport to `point`, or a note that none is close enough.
pub fn format_nearest(point: &GeoPoint, found: Option<&AirportRecord>, max_km: f64) -> Vec<String> {
    let header = format!("Nearest airport to {}", format_position(point));
    match found {
        Some(airport) => {
            let mut lines = vec![header, detail("Airport", format!("{} {}", airport.icao_code, airport.name))];
            if let Some(position) = airport.position {
                lines.push(detail(
                    "Distance",
                    format!("{:.2} km", point.distance_km(&position)),
                ));
            }
            lines
        }
        None => vec![header, detail("Airport", format!("none within {max_km} km"))],
    }
}
