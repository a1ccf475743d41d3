//! Image processing in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Capture metadata** | `kamadak-exif` (timestamp, GPS, altitude) |
//! | **Resize** | Lanczos3, width- or height-driven |
//! | **Rotate** | exact quarter turns, bilinear otherwise, optional aspect-keeping crop |
//! | **Adjust** | brightness / contrast / saturation / sharpness blend filters |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and crop math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Editor**: [`ImageEditor`], the owned-value transform chain
//! - **Asset**: [`ImageAsset`], current / original / thumbnail file layout
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

mod asset;
pub mod backend;
mod calculations;
mod editor;
pub mod exif;
mod filters;
pub mod operations;
mod params;
pub mod rust_backend;

pub use asset::{ImageAsset, ORIGINAL_PREFIX, THUMBS_DIR};
pub use backend::{Dimensions, ImageBackend, ImagingError};
pub use calculations::{PixelBox, derive_resize_dimensions, rotated_bounds, rotation_crop_box};
pub use editor::ImageEditor;
pub use exif::CaptureMetadata;
pub use operations::{DisplayConfig, ThumbnailConfig, apply_edit, create_thumbnail, resize_for_display};
pub use params::{
    Adjustments, OutputFormat, Quality, RelativeCrop, ResizeParams, TransformParams, TransformSpec,
};
pub use rust_backend::RustBackend;
