//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the enrichment jobs (which decide what images to
//! create) and the [`backend`](super::backend) (which does the pixel work).
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 85). Clamped on construction.
//! - [`TransformSpec`]: Rotation, relative crop and tonal adjustment, applied in that order.
//! - [`RelativeCrop`]: Crop rectangle as fractions of the current dimensions.
//! - [`Adjustments`]: Brightness/contrast/saturation/sharpness factors (1.0 = unchanged).
//! - [`OutputFormat`]: Encoders available for written files and previews.
//! - [`ResizeParams`] / [`TransformParams`]: Everything a backend call needs.

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Crop rectangle relative to the current image, each component in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeCrop {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl RelativeCrop {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// The whole image.
    pub fn full() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }
}

/// Multiplicative tonal factors. `None` and `1.0` both leave the image alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Adjustments {
    pub brightness: Option<f32>,
    pub contrast: Option<f32>,
    pub saturation: Option<f32>,
    pub sharpness: Option<f32>,
}

impl Adjustments {
    pub fn is_empty(&self) -> bool {
        [self.brightness, self.contrast, self.saturation, self.sharpness]
            .iter()
            .all(|f| f.is_none_or(|v| v == 1.0))
    }
}

/// A complete edit request.
///
/// Application order is fixed: rotation, then relative crop, then tonal
/// adjustment. Callers cannot reorder the steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformSpec {
    pub rotate: Option<f64>,
    #[serde(default)]
    pub crop_after_rotate: bool,
    pub crop: Option<RelativeCrop>,
    #[serde(default)]
    pub adjustments: Adjustments,
}

impl TransformSpec {
    pub fn is_identity(&self) -> bool {
        self.rotate.is_none_or(|d| d % 360.0 == 0.0)
            && self.crop.is_none()
            && self.adjustments.is_empty()
    }
}

/// Encoders the editor can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }
}

/// Parameters for a width-driven resize.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub quality: Quality,
}

/// Parameters for applying a [`TransformSpec`] to a file.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub spec: TransformSpec,
    pub quality: Quality,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_85() {
        assert_eq!(Quality::default().value(), 85);
    }

    #[test]
    fn unit_factors_are_empty_adjustments() {
        let adj = Adjustments {
            brightness: Some(1.0),
            contrast: Some(1.0),
            saturation: None,
            sharpness: Some(1.0),
        };
        assert!(adj.is_empty());
        assert!(
            !Adjustments {
                contrast: Some(1.2),
                ..Adjustments::default()
            }
            .is_empty()
        );
    }

    #[test]
    fn full_turn_is_identity() {
        let spec = TransformSpec {
            rotate: Some(360.0),
            ..TransformSpec::default()
        };
        assert!(spec.is_identity());
    }

    #[test]
    fn output_format_from_extension() {
        assert_eq!(
            OutputFormat::from_path(Path::new("a/b.JPG")),
            Some(OutputFormat::Jpeg)
        );
        assert_eq!(
            OutputFormat::from_path(Path::new("b.webp")),
            Some(OutputFormat::WebP)
        );
        assert_eq!(OutputFormat::from_path(Path::new("b.gif")), None);
        assert_eq!(OutputFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn transform_spec_deserializes_sparse_json() {
        let spec: TransformSpec =
            serde_json::from_str(r#"{"rotate": 12.5, "crop": null, "adjustments": {"contrast": 1.1}}"#)
                .unwrap();
        assert_eq!(spec.rotate, Some(12.5));
        assert!(!spec.crop_after_rotate);
        assert_eq!(spec.adjustments.contrast, Some(1.1));
        assert_eq!(spec.adjustments.brightness, None);
    }
}
