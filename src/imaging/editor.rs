//! In-memory image transform chain.
//!
//! [`ImageEditor`] owns a decoded raster and a write target. Every operation
//! consumes the editor and hands it back, so a call site composes a chain
//! and encodes once at the end:
//!
//! ```no_run
//! # use logbook_media::imaging::{ImageEditor, Quality, RelativeCrop};
//! # fn run() -> Result<(), logbook_media::imaging::ImagingError> {
//! let path = ImageEditor::open("photo.jpg".as_ref())?
//!     .resize(None, Some(900))?
//!     .rotate(4.5, true)
//!     .crop(&RelativeCrop::new(0.1, 0.1, 0.8, 0.8))
//!     .write_to_file(Quality::new(85), None, Some("preview.jpg"), None)?;
//! # Ok(()) }
//! ```
//!
//! Positive rotation angles turn the picture counter-clockwise. Quarter turns
//! are exact pixel permutations; any other angle is bilinearly resampled into
//! an expanded frame with transparent corners.

use super::backend::ImagingError;
use super::calculations::{
    PixelBox, derive_resize_dimensions, relative_crop_box, rotated_bounds, rotation_crop_box,
};
use super::filters;
use super::params::{Adjustments, OutputFormat, Quality, RelativeCrop, TransformSpec};
use crate::files::write_atomic;
use image::imageops::FilterType;
use image::{DynamicImage, ImageEncoder, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

type Result<T> = std::result::Result<T, ImagingError>;

/// Tolerance when deciding whether an angle is a quarter turn.
const QUARTER_TURN_EPSILON: f64 = 1e-9;

pub struct ImageEditor {
    image: DynamicImage,
    target: PathBuf,
}

impl ImageEditor {
    /// Decode an image from disk. The file itself becomes the write target.
    pub fn open(path: &Path) -> Result<Self> {
        let image = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| ImagingError::Decode {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(Self::from_image(image, path))
    }

    /// Wrap an already decoded image.
    pub fn from_image(image: DynamicImage, target: impl Into<PathBuf>) -> Self {
        Self {
            image,
            target: target.into(),
        }
    }

    /// Redirect default writes to another file.
    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = target.into();
        self
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }

    /// Resize to the given width or height, deriving the other side.
    pub fn resize(mut self, width: Option<u32>, height: Option<u32>) -> Result<Self> {
        let (w, h) = derive_resize_dimensions(self.dimensions(), width, height).ok_or_else(
            || ImagingError::InvalidArgument("resize needs exactly one of width or height".into()),
        )?;
        self.image = self.image.resize_exact(w, h, FilterType::Lanczos3);
        Ok(self)
    }

    /// Rotate counter-clockwise by `degrees`, expanding the frame.
    ///
    /// With `crop_after_rotate` the result is cropped to the largest centered
    /// rectangle that has the pre-rotation aspect ratio and contains no
    /// empty corners.
    pub fn rotate(mut self, degrees: f64, crop_after_rotate: bool) -> Self {
        let original = self.dimensions();
        self.image = rotate_expanded(&self.image, degrees);
        if crop_after_rotate {
            let b = rotation_crop_box(original, self.dimensions(), degrees);
            self.image = crop_box(&self.image, b);
        }
        self
    }

    /// Crop with coordinates relative to the current dimensions.
    pub fn crop(mut self, crop: &RelativeCrop) -> Self {
        let b = relative_crop_box(self.dimensions(), crop);
        self.image = crop_box(&self.image, b);
        self
    }

    /// Apply tonal factors: brightness, contrast, saturation, sharpness.
    pub fn adjust(mut self, adjustments: &Adjustments) -> Self {
        if adjustments.is_empty() {
            return self;
        }

        let had_alpha = self.image.color().has_alpha();
        let mut buffer = self.image.to_rgba8();
        let steps: [(Option<f32>, fn(&mut RgbaImage, f32)); 4] = [
            (adjustments.brightness, filters::brightness),
            (adjustments.contrast, filters::contrast),
            (adjustments.saturation, filters::saturation),
            (adjustments.sharpness, filters::sharpness),
        ];
        for (factor, filter) in steps {
            if let Some(f) = factor.filter(|f| *f != 1.0) {
                filter(&mut buffer, f);
            }
        }

        let adjusted = DynamicImage::ImageRgba8(buffer);
        self.image = if had_alpha {
            adjusted
        } else {
            DynamicImage::ImageRgb8(adjusted.to_rgb8())
        };
        self
    }

    /// Run a full [`TransformSpec`] in its fixed order.
    pub fn apply(self, spec: &TransformSpec) -> Self {
        let mut editor = self;
        if let Some(degrees) = spec.rotate {
            editor = editor.rotate(degrees, spec.crop_after_rotate);
        }
        if let Some(crop) = &spec.crop {
            editor = editor.crop(crop);
        }
        editor.adjust(&spec.adjustments)
    }

    /// Encode the current buffer to memory.
    pub fn encode(&self, format: OutputFormat, quality: Quality) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        match format {
            OutputFormat::Jpeg => {
                let rgb = self.image.to_rgb8();
                image::codecs::jpeg::JpegEncoder::new_with_quality(
                    &mut bytes,
                    quality.value() as u8,
                )
                .write_image(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    image::ExtendedColorType::Rgb8,
                )
                .map_err(|e| ImagingError::Encode(format!("JPEG encode failed: {e}")))?;
            }
            OutputFormat::Png | OutputFormat::WebP => {
                let rgba = DynamicImage::ImageRgba8(self.image.to_rgba8());
                rgba.write_to(&mut Cursor::new(&mut bytes), format.image_format())
                    .map_err(|e| ImagingError::Encode(format!("{format:?} encode failed: {e}")))?;
            }
        }
        Ok(bytes)
    }

    /// Encode and write to disk, returning the written path.
    ///
    /// Missing arguments fall back to the editor's target. The format
    /// defaults to the destination extension, then JPEG. `quality` only
    /// matters for JPEG.
    pub fn write_to_file(
        &self,
        quality: Quality,
        dest_dir: Option<&Path>,
        dest_filename: Option<&str>,
        format: Option<OutputFormat>,
    ) -> Result<PathBuf> {
        let dir = match dest_dir {
            Some(d) => d.to_path_buf(),
            None => self
                .target
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        let filename = match dest_filename {
            Some(name) => name.into(),
            None => self.target.file_name().map(PathBuf::from).ok_or_else(|| {
                ImagingError::InvalidArgument(format!(
                    "no file name in target {}",
                    self.target.display()
                ))
            })?,
        };
        let path = dir.join(filename);
        let format = format
            .or_else(|| OutputFormat::from_path(&path))
            .unwrap_or(OutputFormat::Jpeg);

        let bytes = self.encode(format, quality)?;
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(&dir)?;
        }
        write_atomic(&path, &bytes)?;
        Ok(path)
    }
}

fn crop_box(image: &DynamicImage, b: PixelBox) -> DynamicImage {
    image.crop_imm(b.x, b.y, b.width, b.height)
}

fn is_angle(turn: f64, target: f64) -> bool {
    (turn - target).abs() < QUARTER_TURN_EPSILON
}

fn rotate_expanded(image: &DynamicImage, degrees: f64) -> DynamicImage {
    let turn = degrees.rem_euclid(360.0);
    if is_angle(turn, 0.0) || is_angle(turn, 360.0) {
        image.clone()
    } else if is_angle(turn, 90.0) {
        // image's rotate* helpers turn clockwise
        image.rotate270()
    } else if is_angle(turn, 180.0) {
        image.rotate180()
    } else if is_angle(turn, 270.0) {
        image.rotate90()
    } else {
        DynamicImage::ImageRgba8(rotate_free(&image.to_rgba8(), degrees))
    }
}

/// Inverse-map every destination pixel into the source and sample it.
fn rotate_free(src: &RgbaImage, degrees: f64) -> RgbaImage {
    let (w, h) = src.dimensions();
    let (wr, hr) = rotated_bounds((w, h), degrees);
    let (sin, cos) = degrees.to_radians().sin_cos();

    let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);
    let (rcx, rcy) = (wr as f64 / 2.0, hr as f64 / 2.0);

    RgbaImage::from_fn(wr, hr, |x, y| {
        let dx = x as f64 + 0.5 - rcx;
        let dy = y as f64 + 0.5 - rcy;
        let sx = cx + dx * cos - dy * sin;
        let sy = cy + dx * sin + dy * cos;
        sample_bilinear(src, sx - 0.5, sy - 0.5).unwrap_or(Rgba([0, 0, 0, 0]))
    })
}

/// Bilinear sample at pixel-center coordinates; `None` outside the image.
fn sample_bilinear(src: &RgbaImage, x: f64, y: f64) -> Option<Rgba<u8>> {
    let (w, h) = src.dimensions();
    if x < -0.5 || y < -0.5 || x > w as f64 - 0.5 || y > h as f64 - 0.5 {
        return None;
    }

    let x = x.clamp(0.0, (w - 1) as f64);
    let y = y.clamp(0.0, (h - 1) as f64);
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    let (fx, fy) = (x - x0 as f64, y - y0 as f64);

    let p00 = src.get_pixel(x0, y0);
    let p10 = src.get_pixel(x1, y0);
    let p01 = src.get_pixel(x0, y1);
    let p11 = src.get_pixel(x1, y1);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Some(Rgba(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn pattern(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    fn editor(w: u32, h: u32) -> ImageEditor {
        ImageEditor::from_image(pattern(w, h), "/tmp/unused.jpg")
    }

    #[test]
    fn resize_by_width() {
        let e = editor(400, 300).resize(Some(200), None).unwrap();
        assert_eq!(e.dimensions(), (200, 150));
    }

    #[test]
    fn resize_by_height() {
        let e = editor(400, 300).resize(None, Some(90)).unwrap();
        assert_eq!(e.dimensions(), (120, 90));
    }

    #[test]
    fn resize_without_dimensions_is_invalid() {
        let err = editor(40, 30).resize(None, None).err().unwrap();
        assert!(matches!(err, ImagingError::InvalidArgument(_)));
    }

    #[test]
    fn quarter_turn_is_counter_clockwise() {
        let original = pattern(40, 30);
        let top_right = original.to_rgb8().get_pixel(39, 0).to_owned();
        let e = ImageEditor::from_image(original, "/tmp/x.jpg").rotate(90.0, false);
        assert_eq!(e.dimensions(), (30, 40));
        assert_eq!(e.image().to_rgb8().get_pixel(0, 0), &top_right);
    }

    #[test]
    fn negative_quarter_turn_is_clockwise() {
        let original = pattern(40, 30);
        let top_left = original.to_rgb8().get_pixel(0, 0).to_owned();
        let e = ImageEditor::from_image(original, "/tmp/x.jpg").rotate(-90.0, false);
        assert_eq!(e.dimensions(), (30, 40));
        assert_eq!(e.image().to_rgb8().get_pixel(29, 0), &top_left);
    }

    #[test]
    fn free_rotation_expands_frame() {
        let e = editor(400, 300).rotate(30.0, false);
        assert_eq!(e.dimensions(), (497, 460));
        // corners of the expanded frame are empty
        assert_eq!(e.image().to_rgba8().get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn rotate_with_crop_keeps_aspect_ratio() {
        for (w, h) in [(400u32, 300u32), (300, 400), (256, 256)] {
            let r = w as f64 / h as f64;
            for deg in [-33.0, -5.0, 2.5, 12.0, 45.0, 90.0, 181.0] {
                let (ow, oh) = editor(w, h).rotate(deg, true).dimensions();
                assert!(
                    (ow as f64 - oh as f64 * r).abs() <= 1.0,
                    "{w}x{h} at {deg}° gave {ow}x{oh}"
                );
            }
        }
    }

    #[test]
    fn rotate_with_crop_leaves_no_transparent_corners() {
        let e = editor(200, 150).rotate(20.0, true);
        let rgba = e.image().to_rgba8();
        let (w, h) = rgba.dimensions();
        for (x, y) in [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)] {
            assert!(rgba.get_pixel(x, y)[3] > 0, "corner ({x},{y}) is empty");
        }
    }

    #[test]
    fn full_relative_crop_is_pixel_identical() {
        let original = pattern(64, 48);
        let e = ImageEditor::from_image(original.clone(), "/tmp/x.jpg").crop(&RelativeCrop::full());
        assert_eq!(e.image().to_rgb8(), original.to_rgb8());
    }

    #[test]
    fn relative_crop_uses_current_dimensions() {
        let e = editor(100, 80)
            .crop(&RelativeCrop::new(0.5, 0.5, 0.5, 0.5))
            .crop(&RelativeCrop::new(0.0, 0.0, 0.5, 0.5));
        assert_eq!(e.dimensions(), (25, 20));
    }

    #[test]
    fn unit_adjustments_encode_identically() {
        let base = editor(32, 24);
        let before = base.encode(OutputFormat::Png, Quality::default()).unwrap();
        let adjusted = base.adjust(&Adjustments {
            brightness: Some(1.0),
            contrast: Some(1.0),
            saturation: Some(1.0),
            sharpness: Some(1.0),
        });
        let after = adjusted.encode(OutputFormat::Png, Quality::default()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn adjust_keeps_color_type_without_alpha() {
        let e = editor(10, 10).adjust(&Adjustments {
            brightness: Some(1.3),
            ..Adjustments::default()
        });
        assert!(!e.image().color().has_alpha());
    }

    #[test]
    fn apply_runs_rotation_before_crop() {
        let spec = TransformSpec {
            rotate: Some(90.0),
            crop_after_rotate: false,
            crop: Some(RelativeCrop::new(0.0, 0.0, 1.0, 0.5)),
            adjustments: Adjustments::default(),
        };
        // 40x30 → rotated 30x40 → top half 30x20
        let e = editor(40, 30).apply(&spec);
        assert_eq!(e.dimensions(), (30, 20));
    }

    #[test]
    fn encode_jpeg_produces_jpeg_magic() {
        let bytes = editor(16, 16)
            .encode(OutputFormat::Jpeg, Quality::new(80))
            .unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn write_to_file_defaults_to_target() {
        let tmp = tempfile::TempDir::new().unwrap();
        let target = tmp.path().join("photo.jpg");
        let written = ImageEditor::from_image(pattern(20, 10), &target)
            .write_to_file(Quality::new(90), None, None, None)
            .unwrap();
        assert_eq!(written, target);
        assert_eq!(image::image_dimensions(&written).unwrap(), (20, 10));
    }

    #[test]
    fn write_to_file_creates_destination_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let target = tmp.path().join("photo.jpg");
        let thumbs = tmp.path().join("thumbs");
        let written = ImageEditor::from_image(pattern(20, 10), &target)
            .write_to_file(Quality::new(90), Some(&thumbs), None, None)
            .unwrap();
        assert_eq!(written, thumbs.join("photo.jpg"));
        assert!(written.exists());
    }

    #[test]
    fn open_roundtrip_from_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("source.png");
        ImageEditor::from_image(pattern(12, 9), &path)
            .write_to_file(Quality::default(), None, None, None)
            .unwrap();
        let e = ImageEditor::open(&path).unwrap();
        assert_eq!(e.dimensions(), (12, 9));
        assert_eq!(e.target(), path.as_path());
    }

    #[test]
    fn open_corrupt_file_is_decode_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();
        let err = ImageEditor::open(&path).err().unwrap();
        assert!(matches!(err, ImagingError::Decode { .. }));
    }

    #[test]
    fn open_missing_file_is_io_error() {
        let err = ImageEditor::open(Path::new("/nonexistent/photo.jpg"))
            .err()
            .unwrap();
        assert!(matches!(err, ImagingError::Io(_)));
    }
}
