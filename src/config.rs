//! Application configuration.
//!
//! Handles loading, validating, and merging `logbook.toml`. Stock defaults
//! are the base layer; the user file only needs the keys it overrides.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [storage]
//! photos_dir = "media/photos"
//! tracks_dir = "media/tracks"
//! records = "media/records.json"
//!
//! [images]
//! display_width = 2500     # Uploaded photos are shrunk to this width
//! thumbnail_width = 300    # Thumbnails in thumbs/
//! preview_height = 900     # Live preview height
//! quality = 85             # JPEG quality (1-100)
//!
//! [elevation]
//! url = "https://api.open-elevation.com/api/v1/lookup"
//! timeout_secs = 30
//! batch_size = 1000
//!
//! [weather]
//! forecast_url = "https://api.open-meteo.com/v1/forecast"
//! archive_url = "https://archive-api.open-meteo.com/v1/archive"
//! timeout_secs = 30
//! cache_hours = 6
//!
//! [matching]
//! max_distance_km = 1.0    # Airport suggestion cutoff
//!
//! [jobs]
//! max_workers = 4          # Omit for auto = CPU cores
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::external::{elevation::OPEN_ELEVATION_URL, weather};
use crate::imaging::{DisplayConfig, Quality, ThumbnailConfig};
use crate::naming::MediaPaths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "logbook.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `logbook.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub images: ImagesConfig,
    pub elevation: ElevationConfig,
    pub weather: WeatherConfig,
    pub matching: MatchingConfig,
    pub jobs: JobsConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.images.quality) {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.images.display_width == 0
            || self.images.thumbnail_width == 0
            || self.images.preview_height == 0
        {
            return Err(ConfigError::Validation(
                "images sizes must be non-zero".into(),
            ));
        }
        if self.elevation.batch_size == 0 {
            return Err(ConfigError::Validation(
                "elevation.batch_size must be non-zero".into(),
            ));
        }
        if self.elevation.timeout_secs == 0 || self.weather.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be non-zero".into(),
            ));
        }
        if !(self.matching.max_distance_km.is_finite() && self.matching.max_distance_km > 0.0) {
            return Err(ConfigError::Validation(
                "matching.max_distance_km must be positive".into(),
            ));
        }
        if self.jobs.max_workers == Some(0) {
            return Err(ConfigError::Validation(
                "jobs.max_workers must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Where uploads and the record snapshot live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub photos_dir: PathBuf,
    pub tracks_dir: PathBuf,
    /// JSON snapshot of the record store.
    pub records: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            photos_dir: PathBuf::from("media/photos"),
            tracks_dir: PathBuf::from("media/tracks"),
            records: PathBuf::from("media/records.json"),
        }
    }
}

impl StorageConfig {
    pub fn media_paths(&self) -> MediaPaths {
        MediaPaths::new(&self.photos_dir, &self.tracks_dir)
    }
}

/// Image sizes and encoding quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    pub display_width: u32,
    pub thumbnail_width: u32,
    pub preview_height: u32,
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            display_width: 2500,
            thumbnail_width: 300,
            preview_height: 900,
            quality: Quality::default().value(),
        }
    }
}

impl ImagesConfig {
    pub fn quality(&self) -> Quality {
        Quality::new(self.quality)
    }

    pub fn display(&self) -> DisplayConfig {
        DisplayConfig {
            width: self.display_width,
            quality: self.quality(),
        }
    }

    pub fn thumbnail(&self) -> ThumbnailConfig {
        ThumbnailConfig {
            width: self.thumbnail_width,
            quality: self.quality(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElevationConfig {
    pub url: String,
    pub timeout_secs: u64,
    /// Coordinates per request.
    pub batch_size: usize,
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            url: OPEN_ELEVATION_URL.to_string(),
            timeout_secs: 30,
            batch_size: 1000,
        }
    }
}

impl ElevationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeatherConfig {
    pub forecast_url: String,
    pub archive_url: String,
    pub timeout_secs: u64,
    /// How long a downloaded day stays cached.
    pub cache_hours: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            forecast_url: weather::FORECAST_URL.to_string(),
            archive_url: weather::ARCHIVE_URL.to_string(),
            timeout_secs: 30,
            cache_hours: weather::CACHE_TTL.as_secs() / 3600,
        }
    }
}

impl WeatherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_hours * 3600)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    pub max_distance_km: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_distance_km: crate::geo::DEFAULT_MATCH_DISTANCE_KM,
        }
    }
}

/// Background job settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobsConfig {
    /// Maximum concurrently running enrichment jobs.
    /// When absent, defaults to the number of CPU cores.
    pub max_workers: Option<usize>,
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `n`
pub fn effective_workers(config: &JobsConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_workers.unwrap_or(cores).max(1)
}

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(AppConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when the file
/// is missing.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    resolve_config(load_raw_config(path)?)
}

/// Returns a fully-commented stock `logbook.toml` with all keys.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# logbook-media configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# Uploaded photos. Thumbnails go to <photos_dir>/thumbs/.
photos_dir = "media/photos"

# Uploaded and enriched GPX tracks.
tracks_dir = "media/tracks"

# JSON snapshot of flights, airports, photos and weather records.
records = "media/records.json"

# ---------------------------------------------------------------------------
# Images
# ---------------------------------------------------------------------------
[images]
# Uploaded photos wider than this are shrunk in place. Never upscales.
display_width = 2500

# Thumbnail width.
thumbnail_width = 300

# Live preview height.
preview_height = 900

# JPEG encoding quality (1 = worst, 100 = best).
quality = 85

# ---------------------------------------------------------------------------
# Terrain elevation service (Open-Elevation API)
# ---------------------------------------------------------------------------
[elevation]
url = "https://api.open-elevation.com/api/v1/lookup"
timeout_secs = 30

# Coordinates sent per request.
batch_size = 1000

# ---------------------------------------------------------------------------
# Weather service (Open-Meteo)
# ---------------------------------------------------------------------------
[weather]
# Used for days less than 7 days in the past.
forecast_url = "https://api.open-meteo.com/v1/forecast"

# Used for days 7 or more days in the past.
archive_url = "https://archive-api.open-meteo.com/v1/archive"
timeout_secs = 30

# Downloaded days are reused for this long.
cache_hours = 6

# ---------------------------------------------------------------------------
# Airport matching
# ---------------------------------------------------------------------------
[matching]
# Only airports strictly closer than this are suggested.
max_distance_km = 1.0

# ---------------------------------------------------------------------------
# Background jobs
# ---------------------------------------------------------------------------
[jobs]
# Maximum concurrently running enrichment jobs.
# Omit to use all CPU cores.
# max_workers = 4
"##
}
