//! Pure calculation functions for image geometry.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::RelativeCrop;

/// Slack applied before rounding rotated extents, so that 90° turns do not
/// gain a pixel from floating point noise.
const EXTENT_EPSILON: f64 = 1e-6;

/// A pixel rectangle inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Derive the missing side of a resize, preserving aspect ratio.
///
/// Exactly one of `width` / `height` must be given; `None` is returned
/// otherwise. The derived side is truncated and never drops below 1 px.
///
/// ```text
/// (4000, 3000) width=2500  → (2500, 1875)
/// (4000, 3000) height=900  → (1200, 900)
/// ```
pub fn derive_resize_dimensions(
    current: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
) -> Option<(u32, u32)> {
    let (w, h) = current;
    match (width, height) {
        (Some(new_w), None) => {
            let new_h = (new_w as f64 * h as f64 / w as f64) as u32;
            Some((new_w.max(1), new_h.max(1)))
        }
        (None, Some(new_h)) => {
            let new_w = (new_h as f64 * w as f64 / h as f64) as u32;
            Some((new_w.max(1), new_h.max(1)))
        }
        _ => None,
    }
}

/// Fold any angle into `[0°, 90°]` for the extent and crop formulas.
///
/// A rotation by θ and by 180° − θ produce the same bounding box and the
/// same inscribed crop, so only the folded angle matters.
fn folded_radians(degrees: f64) -> f64 {
    let a = degrees.rem_euclid(180.0);
    let a = if a > 90.0 { 180.0 - a } else { a };
    a.to_radians()
}

/// Bounding box of an image of `(w, h)` rotated by `degrees`.
///
/// The frame expands so that no rotated content is clipped.
pub fn rotated_bounds(dims: (u32, u32), degrees: f64) -> (u32, u32) {
    let (w, h) = (dims.0 as f64, dims.1 as f64);
    let theta = folded_radians(degrees);
    let (sin, cos) = theta.sin_cos();

    let rw = w * cos + h * sin;
    let rh = w * sin + h * cos;
    (
        ((rw - EXTENT_EPSILON).ceil() as u32).max(1),
        ((rh - EXTENT_EPSILON).ceil() as u32).max(1),
    )
}

/// Largest centered rectangle with the original aspect ratio that fits
/// entirely inside the rotated image content.
///
/// With `r = w0 / h0` and the folded angle `θ`:
///
/// ```text
/// Hc = Ht / (r·sinθ + cosθ)       height-bound, Ht = h0
/// Hc ≤ w0 / (r·cosθ + sinθ)       width-bound, binding for portrait originals
/// Wc = Hc · r
/// ```
///
/// The box is centered on the rotated bounding box `rotated`. Its width is
/// derived from the truncated height so the output keeps the original
/// aspect ratio within one pixel.
pub fn rotation_crop_box(original: (u32, u32), rotated: (u32, u32), degrees: f64) -> PixelBox {
    let (w0, h0) = (original.0 as f64, original.1 as f64);
    let (wr, hr) = rotated;
    let r = w0 / h0;
    let theta = folded_radians(degrees);
    let (sin, cos) = theta.sin_cos();

    let height_bound = h0 / (r * sin + cos);
    let width_bound = w0 / (r * cos + sin);
    let hc = height_bound.min(width_bound);
    let wc = hc * r;

    let height = ((hc + EXTENT_EPSILON).floor() as u32).clamp(1, hr);
    let width_limit = ((wc + EXTENT_EPSILON).floor() as u32).clamp(1, wr);
    let width = ((height as f64 * r).round() as u32).clamp(1, width_limit);

    PixelBox {
        x: (wr - width) / 2,
        y: (hr - height) / 2,
        width,
        height,
    }
}

/// Convert a relative crop into a pixel box by truncation.
///
/// Values outside `[0, 1]` are clamped and the box always keeps at least
/// one pixel in each direction, so a bogus request degrades to a tiny crop
/// instead of failing.
pub fn relative_crop_box(dims: (u32, u32), crop: &RelativeCrop) -> PixelBox {
    let (w, h) = dims;
    let unit = |v: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };

    let x = ((unit(crop.left) * w as f64) as u32).min(w.saturating_sub(1));
    let y = ((unit(crop.top) * h as f64) as u32).min(h.saturating_sub(1));
    let width = ((unit(crop.width) * w as f64) as u32).clamp(1, w - x);
    let height = ((unit(crop.height) * h as f64) as u32).clamp(1, h - y);

    PixelBox {
        x,
        y,
        width,
        height,
    }
}
