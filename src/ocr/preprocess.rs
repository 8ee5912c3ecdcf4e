//! Image normalization ahead of OCR.
//!
//! Two pipelines are provided:
//! - [`prepare_key_image`] for a single key: resize, grayscale, threshold
//! - [`prepare_region_image`] for a whole keypad: grayscale, normalize,
//!   linear stretch, threshold, invert
//!
//! The individual steps are public so diagnostics can reproduce them.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbaImage};
use serde::{Deserialize, Serialize};

/// Fraction of pixels ignored at each end of the histogram by [`normalize_contrast`].
const NORMALIZE_CLIP: f64 = 0.01;

/// Settings for the per-key pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyPreprocess {
    /// Width every key image is resized to (aspect ratio preserved)
    pub width: u32,
    /// Luminance at or above which a pixel becomes white
    pub threshold: u8,
}

impl Default for KeyPreprocess {
    fn default() -> Self {
        Self {
            width: 220,
            threshold: 165,
        }
    }
}

/// Settings for the whole-keypad pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionPreprocess {
    /// Multiplier of the linear contrast stretch
    pub gain: f32,
    /// Offset of the linear contrast stretch
    pub bias: f32,
    /// Luminance at or above which a pixel becomes white (before inversion)
    pub threshold: u8,
}

impl Default for RegionPreprocess {
    fn default() -> Self {
        Self {
            gain: 1.5,
            bias: -30.0,
            threshold: 128,
        }
    }
}

/// Prepares one key screenshot for single-line recognition.
pub fn prepare_key_image(img: &RgbaImage, settings: &KeyPreprocess) -> GrayImage {
    let resized = resize_to_width(img, settings.width);
    let gray = imageops::grayscale(&resized);
    binarize(&gray, settings.threshold)
}

/// Prepares a keypad screenshot for layout analysis.
///
/// The result is light glyphs on a dark background.
pub fn prepare_region_image(img: &RgbaImage, settings: &RegionPreprocess) -> GrayImage {
    let gray = imageops::grayscale(img);
    let normalized = normalize_contrast(&gray);
    let stretched = linear_stretch(&normalized, settings.gain, settings.bias);
    let binary = binarize(&stretched, settings.threshold);
    invert(&binary)
}

/// Resizes to exactly `width` pixels wide, keeping the aspect ratio.
pub fn resize_to_width(img: &RgbaImage, width: u32) -> RgbaImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || width == 0 || w == width {
        return img.clone();
    }
    let height = ((h as f64 * width as f64 / w as f64).round() as u32).max(1);
    imageops::resize(img, width, height, FilterType::Lanczos3)
}

/// Pixels at or above `threshold` become white, all others black.
pub fn binarize(img: &GrayImage, threshold: u8) -> GrayImage {
    map_luma(img, |v| if v >= threshold { 255 } else { 0 })
}

/// Swaps black and white.
pub fn invert(img: &GrayImage) -> GrayImage {
    map_luma(img, |v| 255 - v)
}

/// Applies `v * gain + bias`, clamped to 0..=255.
pub fn linear_stretch(img: &GrayImage, gain: f32, bias: f32) -> GrayImage {
    map_luma(img, |v| (v as f32 * gain + bias).round().clamp(0.0, 255.0) as u8)
}

/// Stretches luminance so the 1st and 99th percentiles span the full range.
///
/// Images with a (nearly) flat histogram are returned unchanged.
pub fn normalize_contrast(img: &GrayImage) -> GrayImage {
    let total = img.width() as u64 * img.height() as u64;
    if total == 0 {
        return img.clone();
    }

    let mut histogram = [0u64; 256];
    for p in img.pixels() {
        histogram[p[0] as usize] += 1;
    }

    let clip = (total as f64 * NORMALIZE_CLIP) as u64;
    let low = percentile_from_start(&histogram, clip);
    let high = percentile_from_end(&histogram, clip);
    if high <= low {
        return img.clone();
    }

    let range = (high - low) as f32;
    map_luma(img, |v| {
        let v = v.clamp(low, high);
        (((v - low) as f32 / range) * 255.0).round() as u8
    })
}

fn percentile_from_start(histogram: &[u64; 256], clip: u64) -> u8 {
    let mut seen = 0;
    for (value, &count) in histogram.iter().enumerate() {
        seen += count;
        if seen > clip {
            return value as u8;
        }
    }
    255
}

fn percentile_from_end(histogram: &[u64; 256], clip: u64) -> u8 {
    let mut seen = 0;
    for (value, &count) in histogram.iter().enumerate().rev() {
        seen += count;
        if seen > clip {
            return value as u8;
        }
    }
    0
}

fn map_luma(img: &GrayImage, f: impl Fn(u8) -> u8) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = GrayImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels() {
        output.put_pixel(x, y, Luma([f(pixel[0])]));
    }
    output
}
