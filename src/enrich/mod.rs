//! Enrichment orchestration.
//!
//! [`Enricher`] is the single entry point the request handlers call. Each
//! operation does its synchronous part (store the upload, write the primary
//! record) and returns; the slow, best-effort part is queued on the
//! [`JobQueue`]:
//!
//! ```text
//! upload_photo ──► store file, read EXIF, create record ──┬─► photo.display    (resize + thumbnail)
//!                                                        └─► photo.elevation  (when GPS present)
//! replace_track ─► store file, point flight at it ──────────► track.elevation  (terrain_<name>)
//! flight_legs_changed ───────────────────────────────────────► weather.takeoff / weather.landing
//! ```
//!
//! Jobs own `Arc` handles to the store and clients, write only their own
//! fields through patches, and end in the queue's log on failure.

mod jobs;
mod photo;
mod track;
mod weather;

pub use jobs::{JobQueue, JobStats, KeyedLocks};
pub use photo::Direction;
pub use track::{AirportSuggestion, merge_track_elevation};

use crate::config::{AppConfig, effective_workers};
use crate::external::{
    ElevationService, OpenElevationClient, OpenMeteoClient, ServiceError, WeatherService,
};
use crate::imaging::{
    DisplayConfig, ImageAsset, ImageBackend, ImagingError, Quality, RustBackend, ThumbnailConfig,
};
use crate::files::write_atomic_async;
use crate::naming::{MediaPaths, UploadKind, upload_file_name};
use crate::store::{RecordStore, StoreError};
use crate::track::TrackError;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error(transparent)]
    Imaging(#[from] ImagingError),
    #[error(transparent)]
    Track(#[from] TrackError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Rejected upload: {0}")]
    Upload(String),
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, EnrichError>;

/// A file as received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Client-side name; only its extension is used.
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Read a local file as an upload.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(Self { filename, bytes })
    }
}

/// Tunables the jobs read.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichSettings {
    pub display: DisplayConfig,
    pub thumbnail: ThumbnailConfig,
    /// Encoding quality for edits and previews.
    pub quality: Quality,
    pub preview_height: u32,
    pub max_match_km: f64,
}

impl Default for EnrichSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for EnrichSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            display: config.images.display(),
            thumbnail: config.images.thumbnail(),
            quality: config.images.quality(),
            preview_height: config.images.preview_height,
            max_match_km: config.matching.max_distance_km,
        }
    }
}

/// Everything a job needs, cheap to clone into each one.
#[derive(Clone)]
struct Context {
    store: Arc<dyn RecordStore>,
    images: Arc<dyn ImageBackend>,
    elevation: Arc<dyn ElevationService>,
    weather: Arc<dyn WeatherService>,
    paths: Arc<MediaPaths>,
    settings: Arc<EnrichSettings>,
    locks: Arc<KeyedLocks>,
}

impl Context {
    fn photo_asset(&self, filename: &str) -> ImageAsset {
        ImageAsset::new(&self.paths.photos, filename)
    }

    /// Held while a photo's files are rewritten.
    async fn lock_photo(&self, filename: &str) -> OwnedMutexGuard<()> {
        self.locks.lock(format!("photo:{filename}")).await
    }
}

/// External collaborators of an [`Enricher`].
pub struct Services {
    pub store: Arc<dyn RecordStore>,
    pub images: Arc<dyn ImageBackend>,
    pub elevation: Arc<dyn ElevationService>,
    pub weather: Arc<dyn WeatherService>,
}

pub struct Enricher {
    ctx: Context,
    jobs: JobQueue,
}

impl Enricher {
    pub fn new(services: Services, paths: MediaPaths, settings: EnrichSettings, workers: usize) -> Self {
        Self {
            ctx: Context {
                store: services.store,
                images: services.images,
                elevation: services.elevation,
                weather: services.weather,
                paths: Arc::new(paths),
                locks: Arc::default(),
                settings: Arc::new(settings),
            },
            jobs: JobQueue::new(workers),
        }
    }

    /// Wire the production backend and HTTP clients from config.
    pub fn from_config(config: &AppConfig, store: Arc<dyn RecordStore>) -> Result<Self> {
        let elevation = OpenElevationClient::new(
            config.elevation.url.clone(),
            config.elevation.timeout(),
            config.elevation.batch_size,
        )?;
        let weather = OpenMeteoClient::new(
            config.weather.forecast_url.clone(),
            config.weather.archive_url.clone(),
            config.weather.timeout(),
            config.weather.cache_ttl(),
        )?;
        let services = Services {
            store,
            images: Arc::new(RustBackend::new()),
            elevation: Arc::new(elevation),
            weather: Arc::new(weather),
        };
        Ok(Self::new(
            services,
            config.storage.media_paths(),
            EnrichSettings::from(config),
            effective_workers(&config.jobs),
        ))
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.ctx.store
    }

    pub fn paths(&self) -> &MediaPaths {
        &self.ctx.paths
    }

    /// Wait for every queued job to finish.
    pub async fn drain(&self) -> JobStats {
        self.jobs.drain().await
    }

    pub fn job_stats(&self) -> JobStats {
        self.jobs.stats()
    }
}

/// Run CPU-bound work off the async workers.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// Write an upload under its opaque name in `dir`, returning that name.
async fn store_upload(dir: &Path, upload: &Upload, kind: UploadKind) -> Result<String> {
    let name = upload_file_name(&upload.bytes, &upload.filename, kind).ok_or_else(|| {
        EnrichError::Upload(format!("unsupported file type '{}'", upload.filename))
    })?;
    tokio::fs::create_dir_all(dir).await?;
    write_atomic_async(&dir.join(&name), &upload.bytes).await?;
    Ok(name)
}
