// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster codec — decode captured bytes into a `RasterImage`, encode results as
// PNG/JPEG, and shrink oversized uploads.

use std::io::Cursor;

use docscan_core::config::CompressionConfig;
use docscan_core::error::{DocscanError, Result};
use image::codecs::gif::GifDecoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat};
use tracing::{debug, info, instrument, warn};

use crate::raster::RasterImage;

/// JPEG quality in 1..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    /// Clamp into 1..=100.
    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 100))
    }

    /// From a 0.0-1.0 fraction, as capture UIs usually express it.
    pub fn from_fraction(fraction: f32) -> Self {
        let scaled = (fraction.clamp(0.0, 1.0) * 100.0).round() as u8;
        Self::new(scaled)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

// -- Decode -------------------------------------------------------------------

/// Decode an encoded byte stream into a raster.
///
/// This is the only stage whose failure is fatal: nothing downstream can run
/// without a source image.
#[instrument(skip(data), fields(data_len = data.len()))]
pub fn decode(data: &[u8]) -> Result<RasterImage> {
    let image = image::load_from_memory(data)
        .map_err(|err| DocscanError::Decode(err.to_string()))?;
    info!(
        width = image.width(),
        height = image.height(),
        "Capture decoded"
    );
    RasterImage::from_dynamic(image)
}

/// Decode a file from disk.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn open(path: impl AsRef<std::path::Path>) -> Result<RasterImage> {
    let data = std::fs::read(path.as_ref())?;
    decode(&data)
}

// -- Encode -------------------------------------------------------------------

/// Encode as lossless PNG.
pub fn encode_png(raster: &RasterImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);
    raster
        .as_rgba()
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|err| DocscanError::Encode(format!("PNG encoding failed: {}", err)))?;
    Ok(buffer)
}

/// Encode as JPEG. Alpha is dropped.
pub fn encode_jpeg(raster: &RasterImage, quality: Quality) -> Result<Vec<u8>> {
    encode_dynamic_jpeg(&DynamicImage::ImageRgba8(raster.as_rgba().clone()), quality)
}

fn encode_dynamic_jpeg(image: &DynamicImage, quality: Quality) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let rgb = image.to_rgb8();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.value());
    rgb.write_with_encoder(encoder)
        .map_err(|err| DocscanError::Encode(format!("JPEG encoding failed: {}", err)))?;
    Ok(buffer)
}

// -- Upload compression -------------------------------------------------------

/// Why the compression helper left its input alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    /// Already under the size threshold.
    SmallEnough,
    /// SVG or another vector format.
    Vector,
    /// Animated GIF/PNG/WebP; re-encoding would drop frames.
    Animated,
    /// Not decodable as a raster; left for the uploader to handle.
    Undecodable,
    /// Re-encoding did not produce anything smaller.
    NotSmaller,
}

/// Result of [`compress_image`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compressed<'a> {
    Unchanged { bytes: &'a [u8], reason: PassReason },
    Recompressed(Vec<u8>),
}

impl Compressed<'_> {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Compressed::Unchanged { bytes, .. } => bytes,
            Compressed::Recompressed(bytes) => bytes,
        }
    }

    pub fn into_vec(self) -> Vec<u8> {
        match self {
            Compressed::Unchanged { bytes, .. } => bytes.to_vec(),
            Compressed::Recompressed(bytes) => bytes,
        }
    }
}

/// Shrink an encoded image for upload.
///
/// Small, vector, and animated inputs pass through. Everything else is scaled
/// so its longest side is at most `max_dimension`, re-encoded as JPEG, and
/// only used when strictly smaller than the input.
#[instrument(skip(data, config), fields(data_len = data.len()))]
pub fn compress_image<'a>(data: &'a [u8], config: &CompressionConfig) -> Compressed<'a> {
    let unchanged = |reason| Compressed::Unchanged {
        bytes: data,
        reason,
    };

    if data.len() < config.passthrough_below_bytes {
        debug!(threshold = config.passthrough_below_bytes, "Below size threshold; not compressing");
        return unchanged(PassReason::SmallEnough);
    }
    if is_vector(data) {
        debug!("Vector image; not compressing");
        return unchanged(PassReason::Vector);
    }
    if is_animated(data) {
        debug!("Animated image; not compressing");
        return unchanged(PassReason::Animated);
    }

    let image = match image::load_from_memory(data) {
        Ok(image) => image,
        Err(err) => {
            warn!(error = %err, "Could not decode image for compression; passing through");
            return unchanged(PassReason::Undecodable);
        }
    };

    let max = config.max_dimension.max(1);
    let scaled = if image.width() > max || image.height() > max {
        image.resize(max, max, image::imageops::FilterType::Lanczos3)
    } else {
        image
    };

    let encoded = match encode_dynamic_jpeg(&scaled, Quality::new(config.quality)) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "Re-encoding failed; passing through");
            return unchanged(PassReason::NotSmaller);
        }
    };

    if encoded.len() < data.len() {
        info!(
            from = data.len(),
            to = encoded.len(),
            width = scaled.width(),
            height = scaled.height(),
            "Image compressed"
        );
        Compressed::Recompressed(encoded)
    } else {
        debug!(encoded = encoded.len(), "Re-encoded image is not smaller; keeping original");
        unchanged(PassReason::NotSmaller)
    }
}

/// SVG sniff: an XML prolog or an `<svg` tag near the start of the stream.
fn is_vector(data: &[u8]) -> bool {
    let head = &data[..data.len().min(512)];
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    trimmed.starts_with("<?xml") || trimmed.starts_with("<svg") || text.contains("<svg")
}

/// Multi-frame GIF, APNG, or animated WebP.
fn is_animated(data: &[u8]) -> bool {
    match image::guess_format(data) {
        Ok(ImageFormat::Gif) => GifDecoder::new(Cursor::new(data))
            .map(|decoder| decoder.into_frames().take(2).count() > 1)
            .unwrap_or(false),
        Ok(ImageFormat::Png) => PngDecoder::new(Cursor::new(data))
            .and_then(|decoder| decoder.is_apng())
            .unwrap_or(false),
        Ok(ImageFormat::WebP) => WebPDecoder::new(Cursor::new(data))
            .map(|decoder| decoder.has_animation())
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    /// Deterministic high-entropy image: PNG compresses it poorly, so the
    /// encoded size clears the 200KB threshold.
    fn noisy_png(width: u32, height: u32) -> Vec<u8> {
        let mut state: u32 = 0x1234_5678;
        let img = RgbaImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [r, g, b, _] = state.to_le_bytes();
            Rgba([r, g, b, 255])
        });
        encode_png(&RasterImage::from_rgba(img).unwrap()).unwrap()
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(250).value(), 100);
        assert_eq!(Quality::from_fraction(0.8).value(), 80);
        assert_eq!(Quality::from_fraction(0.98).value(), 98);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, DocscanError::Decode(_)));
    }

    #[test]
    fn png_encode_then_decode_preserves_dimensions() {
        let raster = RasterImage::filled(31, 17, Rgba([10, 20, 30, 255])).unwrap();
        let bytes = encode_png(&raster).unwrap();
        let back = decode(&bytes).unwrap();
        assert_eq!(back, raster);
    }

    #[test]
    fn open_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.png");
        let raster = RasterImage::filled(12, 9, Rgba([1, 2, 3, 255])).unwrap();
        std::fs::write(&path, encode_png(&raster).unwrap()).unwrap();

        assert_eq!(open(&path).unwrap(), raster);
        let missing = open(dir.path().join("missing.png")).unwrap_err();
        assert!(matches!(missing, DocscanError::Io(_)));
    }

    #[test]
    fn small_input_passes_through() {
        let raster = RasterImage::filled(50, 50, Rgba([200, 200, 200, 255])).unwrap();
        let bytes = encode_png(&raster).unwrap();
        let out = compress_image(&bytes, &CompressionConfig::default());
        assert_eq!(
            out,
            Compressed::Unchanged {
                bytes: &bytes,
                reason: PassReason::SmallEnough
            }
        );
    }

    #[test]
    fn svg_passes_through_even_when_large() {
        let mut svg = String::from("<?xml version=\"1.0\"?><svg xmlns=\"http://www.w3.org/2000/svg\">");
        while svg.len() < 300 * 1024 {
            svg.push_str("<rect x=\"1\" y=\"1\" width=\"2\" height=\"2\"/>");
        }
        svg.push_str("</svg>");
        let out = compress_image(svg.as_bytes(), &CompressionConfig::default());
        assert!(matches!(
            out,
            Compressed::Unchanged {
                reason: PassReason::Vector,
                ..
            }
        ));
    }

    #[test]
    fn large_noisy_png_is_never_grown() {
        let bytes = noisy_png(400, 300);
        assert!(bytes.len() > 200 * 1024, "fixture too small: {}", bytes.len());

        let config = CompressionConfig {
            max_dimension: 200,
            ..CompressionConfig::default()
        };
        let out = compress_image(&bytes, &config);
        assert!(out.bytes().len() <= bytes.len());

        if let Compressed::Recompressed(jpeg) = &out {
            let decoded = decode(jpeg).unwrap();
            assert_eq!(decoded.dimensions(), (200, 150));
        }
    }

    fn gif(frames: usize) -> Vec<u8> {
        let mut bytes = Vec::new();
        {
            let mut encoder = image::codecs::gif::GifEncoder::new(&mut bytes);
            let frames = (0..frames).map(|i| {
                let shade = (i * 90) as u8;
                image::Frame::new(RgbaImage::from_pixel(64, 64, Rgba([shade, 40, 200 - shade, 255])))
            });
            encoder.encode_frames(frames).unwrap();
        }
        bytes
    }

    #[test]
    fn animated_gif_passes_through_regardless_of_size() {
        let config = CompressionConfig {
            passthrough_below_bytes: 0,
            ..CompressionConfig::default()
        };
        let data = gif(2);
        assert!(is_animated(&data));
        match compress_image(&data, &config) {
            Compressed::Unchanged { reason, bytes } => {
                assert_eq!(reason, PassReason::Animated);
                assert_eq!(bytes, data.as_slice());
            }
            other => panic!("animated GIF was recompressed: {other:?}"),
        }
    }

    #[test]
    fn single_frame_gif_is_not_animated() {
        let data = gif(1);
        assert!(!is_animated(&data));
        let config = CompressionConfig {
            passthrough_below_bytes: 0,
            ..CompressionConfig::default()
        };
        assert!(!matches!(
            compress_image(&data, &config),
            Compressed::Unchanged {
                reason: PassReason::Animated,
                ..
            }
        ));
    }

    #[test]
    fn still_png_is_not_animated() {
        assert!(!is_animated(&noisy_png(8, 8)));
    }

    #[test]
    fn undecodable_large_blob_passes_through() {
        let blob = vec![0xAB; 256 * 1024];
        let out = compress_image(&blob, &CompressionConfig::default());
        assert_eq!(out.bytes().len(), blob.len());
        assert!(matches!(
            out,
            Compressed::Unchanged {
                reason: PassReason::Undecodable,
                ..
            }
        ));
    }
}
