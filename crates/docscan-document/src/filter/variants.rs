// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The four filter algorithms. Each reads a raster and returns a new RGBA
// buffer of the same size.

use image::{Rgba, RgbaImage};
use tracing::debug;

use super::FilterFailure;
use super::primitives::{
    ToneCurve, TileBlend, clamp_channel, contrast, local_adaptive_threshold,
    tiled_histogram_equalize, unsharp_mask,
};
use crate::raster::{RasterImage, luma};

const MAGIC_TONE: ToneCurve = ToneCurve {
    whiten_above: 130.0,
    whiten_exp: 0.65,
    whiten_strength: 0.95,
    darken_below: 115.0,
    darken_exp: 0.75,
    darken_strength: 0.65,
};

const GRAYSCALE_TONE: ToneCurve = ToneCurve {
    whiten_above: 140.0,
    ..MAGIC_TONE
};

/// Write one gray level into RGB, keeping the source alpha.
fn gray_pixel(value: f32, alpha: u8) -> Rgba<u8> {
    let v = clamp_channel(value).round() as u8;
    Rgba([v, v, v, alpha])
}

/// Background-normalizing "magic" filter.
///
/// The 90th and 10th luma percentiles are taken as paper and ink levels and
/// stretched to the full range, then an adaptive gamma, a strong contrast
/// stretch, the whiten/darken curve, and a heavy unsharp mask follow.
pub fn magic(input: &RasterImage) -> Result<RgbaImage, FilterFailure> {
    let rgba = input.as_rgba();
    let gray = input.to_luma_f32();

    let mut sorted = gray.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    let background = sorted[((n as f32 * 0.90) as usize).min(n - 1)];
    let text = sorted[((n as f32 * 0.10) as usize).min(n - 1)];
    debug!(background, text, "Magic filter levels");

    let normalize = text < background;
    let mut toned = Vec::with_capacity(n);
    for &value in &gray {
        let mut v = value;
        if normalize {
            v = clamp_channel((v - text) / (background - text) * 255.0);
        }
        let gamma = if v < 128.0 { 0.75 } else { 1.25 };
        v = (v / 255.0).powf(gamma) * 255.0;
        v = contrast(v, 1.8);
        v = MAGIC_TONE.apply(v);
        if !v.is_finite() {
            return Err(FilterFailure::NonFinite { stage: "magic tone mapping" });
        }
        toned.push(v);
    }

    let width = rgba.width();
    let staged = RgbaImage::from_fn(width, rgba.height(), |x, y| {
        let idx = (y * width + x) as usize;
        gray_pixel(toned[idx], rgba.get_pixel(x, y).0[3])
    });
    Ok(unsharp_mask(&staged, 4.0, 0.85))
}

/// Sauvola binarization (window radius 15, k = 0.2, R = 128).
///
/// Output is strictly bimodal and fully opaque: every channel is 0 or 255.
pub fn black_and_white(input: &RasterImage) -> RgbaImage {
    let (width, height) = input.dimensions();
    let gray = input.to_luma_f32();
    let binary = local_adaptive_threshold(&gray, width, height, 15, 0.2, 128.0);

    RgbaImage::from_fn(width, height, |x, y| {
        let v = binary.get_pixel(x, y).0[0];
        Rgba([v, v, v, 255])
    })
}

/// Tiled equalization (16px tiles, clip 3.0), contrast 1.4, the whiten/darken
/// curve with a 140 whitening threshold, and an unsharp mask.
pub fn enhanced_grayscale(input: &RasterImage) -> RgbaImage {
    let rgba = input.as_rgba();
    let equalized = tiled_histogram_equalize(&input.to_gray(), 16, 3.0, TileBlend::Nearest);

    let staged = RgbaImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let v = equalized.get_pixel(x, y).0[0] as f32;
        let v = GRAYSCALE_TONE.apply(contrast(v, 1.4));
        gray_pixel(v, rgba.get_pixel(x, y).0[3])
    });
    unsharp_mask(&staged, 3.0, 0.9)
}

/// Saturation boost (1.2), per-channel contrast (1.3), and 80% whitening of
/// anything brighter than 150 luma, followed by a light unsharp mask.
pub fn vivid_color(input: &RasterImage) -> RgbaImage {
    let rgba = input.as_rgba();

    let staged = RgbaImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let gray = luma(r, g, b);

        let mut channels = [r, g, b].map(|c| {
            let saturated = clamp_channel(gray + (c as f32 - gray) * 1.2);
            contrast(saturated, 1.3)
        });

        let lum = 0.299 * channels[0] + 0.587 * channels[1] + 0.114 * channels[2];
        if lum > 150.0 {
            for c in channels.iter_mut() {
                *c = clamp_channel(*c + (255.0 - *c) * 0.8);
            }
        }

        let [nr, ng, nb] = channels.map(|c| c.round() as u8);
        Rgba([nr, ng, nb, a])
    });
    unsharp_mask(&staged, 2.5, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_raster(width: u32, height: u32, left: u8, right: u8) -> RasterImage {
        let img = RgbaImage::from_fn(width, height, |x, _| {
            let v = if x < width / 2 { left } else { right };
            Rgba([v, v, v, 255])
        });
        RasterImage::from_rgba(img).unwrap()
    }

    #[test]
    fn black_and_white_is_strictly_bimodal() {
        let img = RgbaImage::from_fn(50, 40, |x, y| {
            Rgba([(x * 5) as u8, (y * 6) as u8, ((x + y) * 3) as u8, (x * 2) as u8])
        });
        let out = black_and_white(&RasterImage::from_rgba(img).unwrap());
        for p in out.pixels() {
            assert!(p.0.iter().all(|&c| c == 0 || c == 255), "{p:?}");
        }
    }

    #[test]
    fn black_and_white_keeps_half_split() {
        let out = black_and_white(&split_raster(100, 100, 0, 255));
        for y in 0..100 {
            for x in 0..100 {
                let v = out.get_pixel(x, y).0[0];
                if x < 50 {
                    assert_eq!(v, 0, "({x},{y})");
                } else {
                    assert_eq!(v, 255, "({x},{y})");
                }
            }
        }
    }

    #[test]
    fn magic_whitens_paper_and_blackens_ink() {
        // 80% paper at 180, 20% ink at 60.
        let img = RgbaImage::from_fn(50, 50, |x, _| {
            let v = if x < 10 { 60 } else { 180 };
            Rgba([v, v, v, 255])
        });
        let out = magic(&RasterImage::from_rgba(img).unwrap()).unwrap();
        assert!(out.get_pixel(40, 25).0[0] >= 250);
        assert!(out.get_pixel(2, 25).0[0] <= 5);
    }

    #[test]
    fn magic_handles_flat_image() {
        let flat = RasterImage::filled(10, 10, Rgba([128, 128, 128, 255])).unwrap();
        let out = magic(&flat).unwrap();
        let first = out.get_pixel(0, 0).0;
        assert!(out.pixels().all(|p| p.0 == first));
    }

    #[test]
    fn grayscale_output_is_neutral() {
        let img = RgbaImage::from_fn(32, 32, |x, y| Rgba([(x * 8) as u8, (y * 8) as u8, 90, 200]));
        let out = enhanced_grayscale(&RasterImage::from_rgba(img).unwrap());
        for p in out.pixels() {
            assert_eq!(p.0[0], p.0[1]);
            assert_eq!(p.0[1], p.0[2]);
            assert_eq!(p.0[3], 200);
        }
    }

    #[test]
    fn vivid_color_whitens_light_background_keeps_ink_colour() {
        let img = RgbaImage::from_fn(30, 30, |x, _| {
            if x < 15 { Rgba([225, 220, 205, 255]) } else { Rgba([30, 60, 170, 255]) }
        });
        let out = vivid_color(&RasterImage::from_rgba(img).unwrap());

        let paper = out.get_pixel(3, 15).0;
        assert!(paper[..3].iter().all(|&c| c >= 245), "{paper:?}");

        let ink = out.get_pixel(27, 15).0;
        assert!(ink[2] > ink[0] + 100, "blue ink lost its hue: {ink:?}");
    }
}
