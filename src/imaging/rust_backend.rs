//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Identify | `ImageReader::into_dimensions` (header only) |
//! | EXIF | `kamadak-exif` via [`exif`](super::exif) |
//! | Resize | [`ImageEditor::resize`] (Lanczos3) |
//! | Transform | [`ImageEditor::apply`] |
//! | Encode | JPEG / PNG / WebP by output extension |

use super::backend::{Dimensions, ImageBackend, ImagingError};
use super::editor::ImageEditor;
use super::exif::{CaptureMetadata, read_capture_metadata};
use super::params::{Quality, ResizeParams, TransformParams};
use image::ImageReader;
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Write the editor's buffer to `output`, format chosen by extension.
fn save(editor: ImageEditor, output: &Path, quality: Quality) -> Result<Dimensions, ImagingError> {
    let dims = editor.dimensions().into();
    editor
        .with_target(output)
        .write_to_file(quality, None, None, None)?;
    Ok(dims)
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, ImagingError> {
        let dims = ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| ImagingError::Decode {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(dims.into())
    }

    fn read_metadata(&self, path: &Path) -> Result<CaptureMetadata, ImagingError> {
        read_capture_metadata(path)
    }

    fn resize(&self, params: &ResizeParams) -> Result<Dimensions, ImagingError> {
        let editor = ImageEditor::open(&params.source)?.resize(Some(params.width), None)?;
        save(editor, &params.output, params.quality)
    }

    fn transform(&self, params: &TransformParams) -> Result<Dimensions, ImagingError> {
        let editor = ImageEditor::open(&params.source)?.apply(&params.spec);
        save(editor, &params.output, params.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::{RelativeCrop, TransformSpec};
    use crate::test_helpers::{jpeg_with_exif, write_test_jpeg};

    #[test]
    fn identify_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        write_test_jpeg(&path, 200, 150);

        let backend = RustBackend::new();
        let dims = backend.identify(&path).unwrap();
        assert_eq!(dims.width, 200);
        assert_eq!(dims.height, 150);
    }

    #[test]
    fn identify_ignores_misleading_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.png");
        write_test_jpeg(&path, 64, 32);

        let dims = RustBackend::new().identify(&path).unwrap();
        assert_eq!(dims, Dimensions { width: 64, height: 32 });
    }

    #[test]
    fn identify_nonexistent_file_errors() {
        let backend = RustBackend::new();
        let result = backend.identify(Path::new("/nonexistent/image.jpg"));
        assert!(result.is_err());
    }

    #[test]
    fn read_metadata_synthetic_returns_default() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        write_test_jpeg(&path, 100, 100);

        let backend = RustBackend::new();
        let meta = backend.read_metadata(&path).unwrap();
        assert_eq!(meta, CaptureMetadata::default());
    }

    #[test]
    fn read_metadata_with_exif() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("gps.jpg");
        std::fs::write(&path, jpeg_with_exif(32, 32)).unwrap();

        let meta = RustBackend::new().read_metadata(&path).unwrap();
        assert_eq!(meta.altitude, Some(350.0));
    }

    #[test]
    fn resize_synthetic_in_place() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        write_test_jpeg(&source, 400, 300);

        let backend = RustBackend::new();
        let dims = backend
            .resize(&ResizeParams {
                source: source.clone(),
                output: source.clone(),
                width: 200,
                quality: Quality::new(85),
            })
            .unwrap();

        assert_eq!(dims, Dimensions { width: 200, height: 150 });
        assert_eq!(backend.identify(&source).unwrap(), dims);
    }

    #[test]
    fn resize_into_new_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        write_test_jpeg(&source, 600, 400);

        let output = tmp.path().join("thumbs").join("source.jpg");
        RustBackend::new()
            .resize(&ResizeParams {
                source,
                output: output.clone(),
                width: 300,
                quality: Quality::new(85),
            })
            .unwrap();

        assert!(output.exists());
        assert_eq!(image::image_dimensions(&output).unwrap(), (300, 200));
    }

    #[test]
    fn resize_corrupt_source_is_decode_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("broken.jpg");
        std::fs::write(&source, b"\xFF\xD8garbage").unwrap();

        let result = RustBackend::new().resize(&ResizeParams {
            source: source.clone(),
            output: source,
            width: 50,
            quality: Quality::new(85),
        });
        assert!(matches!(result, Err(ImagingError::Decode { .. })));
    }

    #[test]
    fn transform_rotates_and_crops() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("_original_a.jpg");
        write_test_jpeg(&source, 400, 300);
        let output = tmp.path().join("a.jpg");

        let dims = RustBackend::new()
            .transform(&TransformParams {
                source,
                output: output.clone(),
                spec: TransformSpec {
                    rotate: Some(90.0),
                    crop_after_rotate: false,
                    crop: Some(RelativeCrop::new(0.0, 0.0, 1.0, 0.5)),
                    ..TransformSpec::default()
                },
                quality: Quality::new(90),
            })
            .unwrap();

        assert_eq!(dims, Dimensions { width: 300, height: 200 });
        assert_eq!(image::image_dimensions(&output).unwrap(), (300, 200));
    }
}
