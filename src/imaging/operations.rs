//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.
//! `plan_*` functions are pure so the parameter logic is testable without
//! touching pixels.

use super::asset::ImageAsset;
use super::backend::{Dimensions, ImageBackend, ImagingError};
use super::params::{Quality, ResizeParams, TransformParams, TransformSpec};
use std::path::{Path, PathBuf};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, ImagingError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &dyn ImageBackend, path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

/// Configuration for the display-size resize applied after upload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayConfig {
    pub width: u32,
    pub quality: Quality,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 2500,
            quality: Quality::default(),
        }
    }
}

/// Configuration for thumbnail generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbnailConfig {
    pub width: u32,
    pub quality: Quality,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            width: 300,
            quality: Quality::default(),
        }
    }
}

/// Plan an in-place resize of the current file down to display width.
///
/// Returns `None` when the image is already narrow enough; images are
/// never upscaled, which also makes the job idempotent.
pub fn plan_display_resize(
    asset: &ImageAsset,
    current: (u32, u32),
    config: &DisplayConfig,
) -> Option<ResizeParams> {
    (current.0 > config.width).then(|| ResizeParams {
        source: asset.current_path(),
        output: asset.current_path(),
        width: config.width,
        quality: config.quality,
    })
}

/// Resize the current file to display width. Returns the new dimensions,
/// or `None` if nothing had to be done.
pub fn resize_for_display(
    backend: &dyn ImageBackend,
    asset: &ImageAsset,
    config: &DisplayConfig,
) -> Result<Option<Dimensions>> {
    let current = get_dimensions(backend, &asset.current_path())?;
    match plan_display_resize(asset, current, config) {
        Some(params) => backend.resize(&params).map(Some),
        None => Ok(None),
    }
}

/// Plan a thumbnail of the current file into `thumbs/`.
///
/// Narrow sources keep their own width instead of being stretched.
pub fn plan_thumbnail(
    asset: &ImageAsset,
    current: (u32, u32),
    config: &ThumbnailConfig,
) -> ResizeParams {
    ResizeParams {
        source: asset.current_path(),
        output: asset.thumbnail_path(),
        width: config.width.min(current.0).max(1),
        quality: config.quality,
    }
}

/// Create (or regenerate) the thumbnail, returning its path.
pub fn create_thumbnail(
    backend: &dyn ImageBackend,
    asset: &ImageAsset,
    config: &ThumbnailConfig,
) -> Result<PathBuf> {
    let current = get_dimensions(backend, &asset.current_path())?;
    let params = plan_thumbnail(asset, current, config);
    backend.resize(&params)?;
    Ok(params.output)
}

/// Plan a persistent edit: read the original, overwrite the current file.
pub fn plan_edit(asset: &ImageAsset, spec: TransformSpec, quality: Quality) -> TransformParams {
    TransformParams {
        source: asset.original_path(),
        output: asset.current_path(),
        spec,
        quality,
    }
}

/// Apply `spec` to the untouched original, creating it first if needed.
pub fn apply_edit(
    backend: &dyn ImageBackend,
    asset: &ImageAsset,
    spec: TransformSpec,
    quality: Quality,
) -> Result<Dimensions> {
    asset.ensure_original()?;
    backend.transform(&plan_edit(asset, spec, quality))
}
