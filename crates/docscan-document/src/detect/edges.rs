// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Edge map extraction for document boundary detection.

use docscan_core::config::DetectionConfig;
use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::close;
use tracing::{debug, instrument, warn};

use crate::filter::primitives::{TileBlend, tiled_histogram_equalize};
use crate::raster::RasterImage;

/// Smallest side the gradient stage can work on (Canny needs a 3x3
/// neighbourhood around every interior pixel).
const MIN_EDGE_SIDE: u32 = 3;

/// Turns a raster into a binary edge map (255 = edge) of identical size.
///
/// ## Pipeline
///
/// 1. Luma conversion (0.299 R + 0.587 G + 0.114 B)
/// 2. Local contrast normalization: clipped, tiled histogram equalization
///    with bilinear tile blending, compensating for uneven lighting
/// 3. Gaussian blur (sigma ~1.1, a 5x5 kernel)
/// 4. Canny with a deliberately loose threshold pair (30/120) so faint
///    edges on low-contrast backgrounds survive
/// 5. Morphological closing with a square element to reconnect broken
///    boundary segments
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    config: DetectionConfig,
}

impl EdgeDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Compute the edge map. Never fails: degenerate input yields an
    /// all-zero map, which downstream stages treat as "no edges".
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn detect(&self, image: &RasterImage) -> GrayImage {
        let (width, height) = image.dimensions();
        if width < MIN_EDGE_SIDE || height < MIN_EDGE_SIDE {
            warn!("Image too small for edge detection; returning empty edge map");
            return GrayImage::new(width, height);
        }

        let cfg = &self.config;
        if !(cfg.canny_low.is_finite() && cfg.canny_high.is_finite() && cfg.blur_sigma > 0.0) {
            warn!(
                low = cfg.canny_low,
                high = cfg.canny_high,
                sigma = cfg.blur_sigma,
                "Invalid edge parameters; returning empty edge map"
            );
            return GrayImage::new(width, height);
        }

        // Step 1: Luma.
        let gray = image.to_gray();

        // Step 2: Local contrast normalization. Clip limit is relative to a
        // uniform histogram of the tile.
        let grid = cfg.clahe_grid.max(1);
        let tile = width.max(height).div_ceil(grid).max(1);
        let clip = cfg.clahe_clip.max(1.0) * (tile * tile) as f32 / 256.0;
        let normalized = tiled_histogram_equalize(&gray, tile, clip, TileBlend::Bilinear);
        debug!(tile, clip, "Local contrast normalized");

        // Step 3: Blur.
        let blurred = gaussian_blur_f32(&normalized, cfg.blur_sigma);

        // Step 4: Gradient edges.
        let edges = canny(&blurred, cfg.canny_low, cfg.canny_high.max(cfg.canny_low));

        // Step 5: Closing (dilate then erode) with a (2r+1)^2 square.
        let closed = if cfg.closing_radius > 0 {
            close(&edges, Norm::LInf, cfg.closing_radius)
        } else {
            edges
        };

        let edge_pixels = closed.pixels().filter(|p| p.0[0] > 0).count();
        debug!(edge_pixels, "Edge map complete");
        closed
    }
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}
