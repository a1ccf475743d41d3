//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the four operations the enrichment
//! jobs need: identify, read_metadata, resize, and transform.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on
//! [`ImageEditor`](super::editor::ImageEditor). Jobs only see the trait, so
//! tests can swap in the recording mock below.

use super::exif::CaptureMetadata;
use super::params::{ResizeParams, TransformParams};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {}: {message}", .path.display())]
    Decode { path: PathBuf, message: String },
    #[error("Encoding failed: {0}")]
    Encode(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Trait for image processing backends.
///
/// `Send + Sync` so one backend can be shared by every job through an `Arc`
/// and used from blocking worker threads.
pub trait ImageBackend: Send + Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, ImagingError>;

    /// Read EXIF capture metadata (timestamp, GPS, altitude).
    fn read_metadata(&self, path: &Path) -> Result<CaptureMetadata, ImagingError>;

    /// Resize to a target width, returning the written dimensions.
    fn resize(&self, params: &ResizeParams) -> Result<Dimensions, ImagingError>;

    /// Apply an edit, returning the written dimensions.
    fn transform(&self, params: &TransformParams) -> Result<Dimensions, ImagingError>;
}
