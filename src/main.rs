use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use logbook_media::config::{self, AppConfig};
use logbook_media::enrich::merge_track_elevation;
use logbook_media::external::{OpenElevationClient, OpenMeteoClient, WeatherService};
use logbook_media::geo::{GeoPoint, nearest};
use logbook_media::imaging::{Adjustments, ImageEditor, RelativeCrop, TransformSpec};
use logbook_media::logging::{Verbosity, init_logging};
use logbook_media::output;
use logbook_media::store::{MemoryStore, RecordStore};
use logbook_media::track::{TrackDocument, terrain_file_name};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "logbook-media")]
#[command(about = "Photo and GPS-track enrichment for a flight logbook")]
#[command(long_about = "\
Photo and GPS-track enrichment for a flight logbook

Edits photos (rotation, relative crops, tonal adjustments), computes flight
statistics from GPX tracks, merges terrain elevation into tracks and looks up
hourly weather for airports.

Run 'logbook-media gen-config' to generate a documented logbook.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::CONFIG_FILE, global = true)]
    config: PathBuf,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

/// Edit parameters shared by image commands.
#[derive(clap::Args, Clone, Debug, Default)]
struct EditArgs {
    /// Counter-clockwise rotation in degrees
    #[arg(long, allow_hyphen_values = true)]
    rotate: Option<f64>,
    /// Crop the rotated image back to its original aspect ratio
    #[arg(long)]
    crop_after_rotate: bool,
    /// Relative crop as left,top,width,height in [0, 1]
    #[arg(long, value_parser = parse_crop)]
    crop: Option<RelativeCrop>,
    #[arg(long)]
    brightness: Option<f32>,
    #[arg(long)]
    contrast: Option<f32>,
    #[arg(long)]
    saturation: Option<f32>,
    #[arg(long)]
    sharpness: Option<f32>,
}

impl EditArgs {
    fn spec(&self) -> TransformSpec {
        TransformSpec {
            rotate: self.rotate,
            crop_after_rotate: self.crop_after_rotate,
            crop: self.crop,
            adjustments: Adjustments {
                brightness: self.brightness,
                contrast: self.contrast,
                saturation: self.saturation,
                sharpness: self.sharpness,
            },
        }
    }
}

fn parse_crop(value: &str) -> Result<RelativeCrop, String> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("'{p}': {e}")))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        &[left, top, width, height] => Ok(RelativeCrop::new(left, top, width, height)),
        _ => Err("expected left,top,width,height".into()),
    }
}

#[derive(Subcommand)]
enum Command {
    /// Render an edited JPEG preview of an image
    Preview {
        input: PathBuf,
        /// Output file (format from extension)
        #[arg(short, long)]
        output: PathBuf,
        /// Scale to this height before editing [default: images.preview_height]
        #[arg(long)]
        height: Option<u32>,
        #[command(flatten)]
        edit: EditArgs,
    },
    /// Print flight statistics of a GPX track
    TrackStats {
        track: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Merge terrain elevation into a GPX track
    EnrichTrack {
        track: PathBuf,
        /// Output file [default: terrain_<name> next to the input]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Look up the hourly weather at a position
    Weather {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// RFC 3339 time, e.g. 2024-05-01T09:30:00Z
        #[arg(long)]
        at: DateTime<Utc>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Find the nearest known airport to a position
    Nearest {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Cutoff distance [default: matching.max_distance_km]
        #[arg(long)]
        max_km: Option<f64>,
    },
    /// Print a stock logbook.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(Verbosity::from_flags(cli.quiet, cli.verbose));

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }
    let app_config = config::load_config(&cli.config)?;

    match cli.command {
        Command::Preview {
            input,
            output,
            height,
            edit,
        } => {
            let height = height.unwrap_or(app_config.images.preview_height);
            let quality = app_config.images.quality();
            let spec = edit.spec();
            let written = tokio::task::spawn_blocking(move || {
                ImageEditor::open(&input)?
                    .resize(None, Some(height))?
                    .apply(&spec)
                    .with_target(output)
                    .write_to_file(quality, None, None, None)
            })
            .await??;
            info!(path = %written.display(), "preview written");
            println!("{}", written.display());
        }
        Command::TrackStats { track, json } => {
            let document = TrackDocument::parse(&track)?;
            if json {
                println!("{}", serde_json::to_string_pretty(document.summary())?);
            } else {
                output::print_lines(&output::format_track_summary(
                    &display_name(&track),
                    document.summary(),
                    document.terrain_elevations().len(),
                ));
            }
        }
        Command::EnrichTrack { track, output } => {
            let target = output.unwrap_or_else(|| {
                track.with_file_name(terrain_file_name(&display_name(&track)))
            });
            let client = elevation_client(&app_config)?;
            let merged = merge_track_elevation(&client, track.clone(), target.clone()).await?;
            output::print_lines(&output::format_enrich_result(
                &track.display().to_string(),
                &target.display().to_string(),
                merged.len(),
                merged.terrain_elevations().len(),
            ));
        }
        Command::Weather { lat, lon, at, json } => {
            let client = OpenMeteoClient::new(
                app_config.weather.forecast_url.clone(),
                app_config.weather.archive_url.clone(),
                app_config.weather.timeout(),
                app_config.weather.cache_ttl(),
            )?;
            let position = GeoPoint::new(lat, lon);
            let sample = client.hourly_sample(at, position).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&sample)?);
            } else {
                output::print_lines(&output::format_weather_sample(&position, &sample));
            }
        }
        Command::Nearest { lat, lon, max_km } => {
            let store = MemoryStore::load(&app_config.storage.records)?;
            let airports = store.airports().await?;
            let max_km = max_km.unwrap_or(app_config.matching.max_distance_km);
            let point = GeoPoint::new(lat, lon);
            output::print_lines(&output::format_nearest(
                &point,
                nearest(&point, &airports, max_km),
                max_km,
            ));
        }
        Command::GenConfig => {}
    }

    Ok(())
}

fn elevation_client(config: &AppConfig) -> Result<OpenElevationClient, Box<dyn std::error::Error>> {
    Ok(OpenElevationClient::new(
        config.elevation.url.clone(),
        config.elevation.timeout(),
        config.elevation.batch_size,
    )?)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
