// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster types shared by every pipeline stage.

use docscan_core::error::{DocscanError, Result};
use docscan_core::{FilterKind, Rotation};
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};

use crate::codec;

/// Perceptual luma (ITU-R BT.601 weights) of an RGB triple.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

/// An RGBA8 pixel buffer with non-zero dimensions.
///
/// Stages never mutate a raster they were handed: every transformation
/// allocates a new buffer, so the caller's original stays valid for retries.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pixels: RgbaImage,
}

impl RasterImage {
    /// Wrap an RGBA buffer. Fails on an empty image.
    pub fn from_rgba(pixels: RgbaImage) -> Result<Self> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(DocscanError::InvalidDimensions { width, height });
        }
        Ok(Self { pixels })
    }

    /// Expand a single-channel buffer into opaque RGBA.
    pub fn from_gray(gray: &GrayImage) -> Result<Self> {
        let pixels = RgbaImage::from_fn(gray.width(), gray.height(), |x, y| {
            let v = gray.get_pixel(x, y).0[0];
            Rgba([v, v, v, 255])
        });
        Self::from_rgba(pixels)
    }

    pub fn from_dynamic(image: DynamicImage) -> Result<Self> {
        Self::from_rgba(image.into_rgba8())
    }

    /// Solid-colour raster, mostly useful for tests and benches.
    pub fn filled(width: u32, height: u32, color: Rgba<u8>) -> Result<Self> {
        Self::from_rgba(RgbaImage::from_pixel(width, height, color))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.pixels
    }

    /// Luma channel as a fresh gray buffer, rounded to the nearest level.
    pub fn to_gray(&self) -> GrayImage {
        let (w, h) = self.dimensions();
        GrayImage::from_fn(w, h, |x, y| {
            let Rgba([r, g, b, _]) = *self.pixels.get_pixel(x, y);
            Luma([luma(r, g, b).round().clamp(0.0, 255.0) as u8])
        })
    }

    /// Luma channel as floats, row-major.
    pub fn to_luma_f32(&self) -> Vec<f32> {
        self.pixels
            .pixels()
            .map(|p| luma(p.0[0], p.0[1], p.0[2]))
            .collect()
    }

    /// Rotate clockwise by a quarter-turn multiple.
    pub fn rotated(&self, rotation: Rotation) -> RasterImage {
        let pixels = match rotation {
            Rotation::Deg0 => self.pixels.clone(),
            Rotation::Deg90 => image::imageops::rotate90(&self.pixels),
            Rotation::Deg180 => image::imageops::rotate180(&self.pixels),
            Rotation::Deg270 => image::imageops::rotate270(&self.pixels),
        };
        Self { pixels }
    }
}

/// Terminal artifact handed to upload/export collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    raster: RasterImage,
    applied_filter: FilterKind,
}

impl ProcessedImage {
    pub fn new(raster: RasterImage, applied_filter: FilterKind) -> Self {
        Self {
            raster,
            applied_filter,
        }
    }

    pub fn raster(&self) -> &RasterImage {
        &self.raster
    }

    pub fn into_raster(self) -> RasterImage {
        self.raster
    }

    pub fn applied_filter(&self) -> FilterKind {
        self.applied_filter
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    /// JPEG bytes for upload, at `quality` (1-100).
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        codec::encode_jpeg(&self.raster, codec::Quality::new(quality))
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        codec::encode_png(&self.raster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_raster_is_rejected() {
        let err = RasterImage::from_rgba(RgbaImage::new(0, 10)).unwrap_err();
        assert!(matches!(
            err,
            DocscanError::InvalidDimensions { width: 0, height: 10 }
        ));
    }

    #[test]
    fn luma_uses_perceptual_weights() {
        assert!((luma(255, 0, 0) - 76.245).abs() < 1e-3);
        assert!((luma(0, 255, 0) - 149.685).abs() < 1e-3);
        assert!((luma(255, 255, 255) - 255.0).abs() < 1e-3);
    }

    #[test]
    fn rotate_quarter_turn_swaps_dimensions() {
        let raster = RasterImage::filled(40, 30, Rgba([1, 2, 3, 255])).unwrap();
        let turned = raster.rotated(Rotation::Deg90);
        assert_eq!(turned.dimensions(), (30, 40));
        // The source is untouched.
        assert_eq!(raster.dimensions(), (40, 30));
    }

    #[test]
    fn gray_expansion_is_opaque() {
        let gray = GrayImage::from_pixel(3, 2, Luma([77]));
        let raster = RasterImage::from_gray(&gray).unwrap();
        assert_eq!(*raster.as_rgba().get_pixel(2, 1), Rgba([77, 77, 77, 255]));
        assert_eq!(raster.to_gray().get_pixel(0, 0).0[0], 77);
    }
}
