//! Tonal enhancement filters.
//!
//! Every filter blends the image with a "degenerate" version of itself:
//!
//! | Filter | Degenerate image |
//! |---|---|
//! | brightness | solid black |
//! | contrast | solid gray at the mean luminance |
//! | saturation | grayscale copy |
//! | sharpness | 3×3 smoothed copy (edges kept) |
//!
//! `out = degenerate + factor · (pixel − degenerate)`, so `0.0` yields the
//! degenerate image and `1.0` the original. Alpha is never touched.

use image::{Rgba, RgbaImage};

/// Smoothing kernel weights (center-heavy box blur), divisor 13.
const SMOOTH_KERNEL: [[u32; 3]; 3] = [[1, 1, 1], [1, 5, 1], [1, 1, 1]];
const SMOOTH_DIVISOR: u32 = 13;

/// ITU-R 601-2 luma, integer form.
fn luma(p: &Rgba<u8>) -> u8 {
    ((p[0] as u32 * 299 + p[1] as u32 * 587 + p[2] as u32 * 114) / 1000) as u8
}

fn blend_channel(degenerate: u8, value: u8, factor: f32) -> u8 {
    let d = degenerate as f32;
    (d + factor * (value as f32 - d)).round().clamp(0.0, 255.0) as u8
}

fn blend_pixel(degenerate: [u8; 3], pixel: &mut Rgba<u8>, factor: f32) {
    for c in 0..3 {
        pixel[c] = blend_channel(degenerate[c], pixel[c], factor);
    }
}

pub fn brightness(img: &mut RgbaImage, factor: f32) {
    for pixel in img.pixels_mut() {
        blend_pixel([0, 0, 0], pixel, factor);
    }
}

pub fn contrast(img: &mut RgbaImage, factor: f32) {
    let count = (img.width() as u64 * img.height() as u64).max(1);
    let sum: u64 = img.pixels().map(|p| luma(p) as u64).sum();
    let mean = ((sum as f64 / count as f64) + 0.5) as u8;
    for pixel in img.pixels_mut() {
        blend_pixel([mean, mean, mean], pixel, factor);
    }
}

pub fn saturation(img: &mut RgbaImage, factor: f32) {
    for pixel in img.pixels_mut() {
        let l = luma(pixel);
        blend_pixel([l, l, l], pixel, factor);
    }
}

pub fn sharpness(img: &mut RgbaImage, factor: f32) {
    let smoothed = smooth(img);
    for (pixel, soft) in img.pixels_mut().zip(smoothed.pixels()) {
        blend_pixel([soft[0], soft[1], soft[2]], pixel, factor);
    }
}

/// 3×3 smoothing; the one-pixel border is copied unchanged.
fn smooth(img: &RgbaImage) -> RgbaImage {
    let (w, h) = img.dimensions();
    let mut out = img.clone();
    if w < 3 || h < 3 {
        return out;
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = [0u32; 3];
            for (ky, row) in SMOOTH_KERNEL.iter().enumerate() {
                for (kx, weight) in row.iter().enumerate() {
                    let p = img.get_pixel(x + kx as u32 - 1, y + ky as u32 - 1);
                    for c in 0..3 {
                        acc[c] += p[c] as u32 * weight;
                    }
                }
            }
            let target = out.get_pixel_mut(x, y);
            for c in 0..3 {
                target[c] = ((acc[c] + SMOOTH_DIVISOR / 2) / SMOOTH_DIVISOR) as u8;
            }
        }
    }
    out
}
