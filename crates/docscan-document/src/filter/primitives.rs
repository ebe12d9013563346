// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pixel primitives shared by the scan filters and the edge detector:
// tiled histogram equalization, Sauvola thresholding, unsharp masking, and
// the small tone curves the filters compose.

use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::filter::gaussian_blur_f32;

/// Clamp a channel value into `[0, 255]`.
#[inline]
pub fn clamp_channel(value: f32) -> f32 {
    value.clamp(0.0, 255.0)
}

/// Global contrast stretch around mid-gray: `(v - 128) * factor + 128`.
#[inline]
pub fn contrast(value: f32, factor: f32) -> f32 {
    clamp_channel((value - 128.0) * factor + 128.0)
}

/// Smooth whitening/darkening curve applied after contrast stretching.
///
/// Values above `whiten_above` are pushed toward 255 by
/// `((v - t) / (255 - t))^whiten_exp * whiten_strength`; values below
/// `darken_below` are scaled down by `((t - v) / t)^darken_exp * darken_strength`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneCurve {
    pub whiten_above: f32,
    pub whiten_exp: f32,
    pub whiten_strength: f32,
    pub darken_below: f32,
    pub darken_exp: f32,
    pub darken_strength: f32,
}

impl ToneCurve {
    pub fn apply(&self, value: f32) -> f32 {
        if value > self.whiten_above {
            let span = (255.0 - self.whiten_above).max(f32::EPSILON);
            let amount = ((value - self.whiten_above) / span).powf(self.whiten_exp);
            clamp_channel(value + (255.0 - value) * amount * self.whiten_strength)
        } else if value < self.darken_below {
            let span = self.darken_below.max(f32::EPSILON);
            let amount = ((self.darken_below - value) / span).powf(self.darken_exp);
            clamp_channel(value * (1.0 - amount * self.darken_strength))
        } else {
            value
        }
    }
}

// -- Tiled histogram equalization ---------------------------------------------

/// How tile mappings are combined at pixel level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileBlend {
    /// Each pixel uses its own tile's CDF. Blocky but sharp; used by the
    /// grayscale filter.
    Nearest,
    /// Bilinear blend of the four nearest tile CDFs, which avoids seams that
    /// would otherwise show up as edges. Used before edge detection.
    Bilinear,
}

/// Contrast-limited, tiled histogram equalization.
///
/// The image is cut into `tile_size x tile_size` tiles. Each tile gets a
/// 256-bin histogram whose bins are clipped at `clip_limit` counts, with the
/// clipped excess spread uniformly over all bins. Pixels are remapped through
/// the tile's normalized CDF, scaled to `[0, 255]`.
pub fn tiled_histogram_equalize(
    gray: &GrayImage,
    tile_size: u32,
    clip_limit: f32,
    blend: TileBlend,
) -> GrayImage {
    let (width, height) = gray.dimensions();
    let tile = tile_size.max(1);
    let tiles_x = width.div_ceil(tile).max(1);
    let tiles_y = height.div_ceil(tile).max(1);

    // One 256-entry lookup table per tile.
    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile;
            let y0 = ty * tile;
            let x1 = (x0 + tile).min(width);
            let y1 = (y0 + tile).min(height);
            luts.push(tile_lut(gray, x0, y0, x1, y1, clip_limit));
        }
    }

    match blend {
        TileBlend::Nearest => GrayImage::from_fn(width, height, |x, y| {
            let idx = ((y / tile) * tiles_x + x / tile) as usize;
            let v = gray.get_pixel(x, y).0[0] as usize;
            Luma([luts[idx][v]])
        }),
        TileBlend::Bilinear => GrayImage::from_fn(width, height, |x, y| {
            let v = gray.get_pixel(x, y).0[0] as usize;

            // Position relative to tile centres.
            let fx = (x as f32 + 0.5) / tile as f32 - 0.5;
            let fy = (y as f32 + 0.5) / tile as f32 - 0.5;
            let tx0 = fx.floor().clamp(0.0, (tiles_x - 1) as f32) as u32;
            let ty0 = fy.floor().clamp(0.0, (tiles_y - 1) as f32) as u32;
            let tx1 = (tx0 + 1).min(tiles_x - 1);
            let ty1 = (ty0 + 1).min(tiles_y - 1);
            let ax = (fx - tx0 as f32).clamp(0.0, 1.0);
            let ay = (fy - ty0 as f32).clamp(0.0, 1.0);

            let at = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][v] as f32;
            let top = at(tx0, ty0) * (1.0 - ax) + at(tx1, ty0) * ax;
            let bottom = at(tx0, ty1) * (1.0 - ax) + at(tx1, ty1) * ax;
            let value = top * (1.0 - ay) + bottom * ay;
            Luma([clamp_channel(value).round() as u8])
        }),
    }
}

fn tile_lut(gray: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    let mut hist = [0f32; 256];
    let mut count = 0f32;
    for y in y0..y1 {
        for x in x0..x1 {
            hist[gray.get_pixel(x, y).0[0] as usize] += 1.0;
            count += 1.0;
        }
    }

    let mut excess = 0f32;
    for bin in hist.iter_mut() {
        if *bin > clip_limit {
            excess += *bin - clip_limit;
            *bin = clip_limit;
        }
    }
    let share = excess / 256.0;

    let mut lut = [0u8; 256];
    let mut cdf = 0f32;
    for (level, bin) in hist.iter().enumerate() {
        cdf += bin + share;
        let mapped = if count > 0.0 { cdf / count * 255.0 } else { level as f32 };
        lut[level] = clamp_channel(mapped).round() as u8;
    }
    lut
}

// -- Sauvola thresholding -----------------------------------------------------

/// Summed-area tables of values and squared values.
///
/// `sum[y * (width+1) + x]` holds the sum over `[0, x) x [0, y)`; both tables
/// have a zero-padded first row and column.
struct IntegralImages {
    stride: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl IntegralImages {
    fn new(values: &[f32], width: u32, height: u32) -> Self {
        let stride = width as usize + 1;
        let rows = height as usize + 1;
        let mut sum = vec![0f64; stride * rows];
        let mut sum_sq = vec![0f64; stride * rows];

        for y in 0..height as usize {
            let mut row = 0f64;
            let mut row_sq = 0f64;
            for x in 0..width as usize {
                let v = values[y * width as usize + x] as f64;
                row += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + x + 1;
                let above = y * stride + x + 1;
                sum[idx] = row + sum[above];
                sum_sq[idx] = row_sq + sum_sq[above];
            }
        }

        Self {
            stride,
            sum,
            sum_sq,
        }
    }

    /// Sum over the half-open box `[x1, x2) x [y1, y2)`.
    fn box_sum(table: &[f64], stride: usize, x1: usize, y1: usize, x2: usize, y2: usize) -> f64 {
        table[y2 * stride + x2] - table[y1 * stride + x2] - table[y2 * stride + x1]
            + table[y1 * stride + x1]
    }

    /// Mean and standard deviation of the window clamped to the image.
    fn stats(&self, x1: usize, y1: usize, x2: usize, y2: usize) -> (f64, f64) {
        let area = ((x2 - x1) * (y2 - y1)) as f64;
        let sum = Self::box_sum(&self.sum, self.stride, x1, y1, x2, y2);
        let sum_sq = Self::box_sum(&self.sum_sq, self.stride, x1, y1, x2, y2);
        let mean = sum / area;
        let variance = (sum_sq / area - mean * mean).max(0.0);
        (mean, variance.sqrt())
    }
}

/// Sauvola local binarization.
///
/// For each pixel the `(2r+1)^2` neighbourhood (clamped to the image) gives a
/// mean `m` and standard deviation `s`; the threshold is
/// `m * (1 + k * (s / dynamic_range - 1))`. Pixels strictly above their
/// threshold become 255, all others 0.
///
/// `values` is the row-major luma of a `width x height` image.
pub fn local_adaptive_threshold(
    values: &[f32],
    width: u32,
    height: u32,
    window_radius: u32,
    k: f64,
    dynamic_range: f64,
) -> GrayImage {
    let integral = IntegralImages::new(values, width, height);
    let r = window_radius as usize;
    let (w, h) = (width as usize, height as usize);

    GrayImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let x1 = x.saturating_sub(r);
        let y1 = y.saturating_sub(r);
        let x2 = (x + r + 1).min(w);
        let y2 = (y + r + 1).min(h);

        let (mean, std_dev) = integral.stats(x1, y1, x2, y2);
        let threshold = mean * (1.0 + k * (std_dev / dynamic_range - 1.0));
        let value = values[y * w + x] as f64;
        Luma([if value > threshold { 255 } else { 0 }])
    })
}

// -- Unsharp mask -------------------------------------------------------------

/// Sharpen by adding back `amount` times the difference between the image
/// and a Gaussian-blurred copy. The blur uses `sigma = radius / 2`.
/// Alpha is carried over from the input.
pub fn unsharp_mask(image: &RgbaImage, radius: f32, amount: f32) -> RgbaImage {
    let sigma = (radius / 2.0).max(0.1);
    let blurred = gaussian_blur_f32(image, sigma);

    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgba(src) = *image.get_pixel(x, y);
        let Rgba(blur) = *blurred.get_pixel(x, y);
        let sharpen = |c: usize| -> u8 {
            let s = src[c] as f32;
            clamp_channel(s + (s - blur[c] as f32) * amount).round() as u8
        };
        Rgba([sharpen(0), sharpen(1), sharpen(2), src[3]])
    })
}
