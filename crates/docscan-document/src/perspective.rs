// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective correction: flatten the quadrilateral bounded by four ordered
// corners into an upright rectangle.

use docscan_core::Corners;
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{info, instrument, warn};

use crate::raster::RasterImage;

/// Below this enclosed area (in square pixels) corners are considered
/// degenerate.
const MIN_QUAD_AREA: f64 = 1.0;

/// Output sides may not exceed this multiple of the source diagonal. Corners
/// may stray past the source (that area is filled), but not without limit.
const MAX_SIDE_PER_DIAGONAL: f64 = 2.0;

/// Destination pixels that map outside the source.
const FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Outcome of a correction. A pass-through carries a copy of the input and
/// must not be mistaken for a flattened page.
#[derive(Debug, Clone, PartialEq)]
pub enum Correction {
    Corrected(RasterImage),
    PassThrough(RasterImage),
}

impl Correction {
    pub fn is_corrected(&self) -> bool {
        matches!(self, Correction::Corrected(_))
    }

    pub fn image(&self) -> &RasterImage {
        match self {
            Correction::Corrected(img) | Correction::PassThrough(img) => img,
        }
    }

    pub fn into_image(self) -> RasterImage {
        match self {
            Correction::Corrected(img) | Correction::PassThrough(img) => img,
        }
    }
}

/// Output size for a quadrilateral: the longer of each pair of opposite
/// edges, rounded, at least 1.
pub fn target_size(corners: &Corners) -> (u32, u32) {
    let [tl, tr, br, bl] = *corners.points();
    let width = tl.distance(&tr).max(bl.distance(&br));
    let height = tl.distance(&bl).max(tr.distance(&br));
    let round = |v: f64| if v.is_finite() { (v.round() as u32).max(1) } else { 1 };
    (round(width), round(height))
}

/// Warps a source raster through the four-point homography defined by
/// ordered corners.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerspectiveCorrector;

impl PerspectiveCorrector {
    pub fn new() -> Self {
        Self
    }

    /// Map `corners` (TL, TR, BR, BL) onto `(0,0) (w,0) (w,h) (0,h)` and
    /// resample with bilinear interpolation. Degenerate corners yield
    /// [`Correction::PassThrough`] with an untouched copy of `source`.
    #[instrument(skip(self, source), fields(width = source.width(), height = source.height()))]
    pub fn correct(&self, source: &RasterImage, corners: &Corners) -> Correction {
        let finite = corners.points().iter().all(|p| p.x.is_finite() && p.y.is_finite());
        if !finite {
            warn!(?corners, "Non-finite corners; skipping perspective correction");
            return Correction::PassThrough(source.clone());
        }
        let area = corners.area();
        if area < MIN_QUAD_AREA || !corners.is_simple() {
            warn!(area, ?corners, "Degenerate corners; skipping perspective correction");
            return Correction::PassThrough(source.clone());
        }

        let (out_w, out_h) = target_size(corners);
        let (src_w, src_h) = source.dimensions();
        let max_side = (src_w as f64).hypot(src_h as f64) * MAX_SIDE_PER_DIAGONAL;
        if out_w as f64 > max_side || out_h as f64 > max_side {
            warn!(out_w, out_h, max_side, "Corners reach far outside the source; skipping perspective correction");
            return Correction::PassThrough(source.clone());
        }

        let src = corners.points().map(|p| (p.x as f32, p.y as f32));
        let dest = [
            (0.0, 0.0),
            (out_w as f32, 0.0),
            (out_w as f32, out_h as f32),
            (0.0, out_h as f32),
        ];

        let Some(projection) = Projection::from_control_points(src, dest) else {
            warn!(?corners, "No homography for corners; skipping perspective correction");
            return Correction::PassThrough(source.clone());
        };

        let mut output = RgbaImage::new(out_w, out_h);
        warp_into(source.as_rgba(), &projection, Interpolation::Bilinear, FILL, &mut output);

        match RasterImage::from_rgba(output) {
            Ok(raster) => {
                info!(out_w, out_h, "Perspective correction applied");
                Correction::Corrected(raster)
            }
            Err(err) => {
                warn!(error = %err, "Warp produced an empty raster; skipping perspective correction");
                Correction::PassThrough(source.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscan_core::Point2D;

    fn gradient(width: u32, height: u32) -> RasterImage {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        });
        RasterImage::from_rgba(img).unwrap()
    }

    #[test]
    fn axis_aligned_rectangle_keeps_its_size() {
        let source = gradient(600, 500);
        let corners = Corners::rectangle(100.0, 100.0, 500.0, 400.0);
        let result = PerspectiveCorrector::new().correct(&source, &corners);
        assert!(result.is_corrected());
        assert_eq!(result.image().dimensions(), (400, 300));

        // Interior pixel maps straight back to the source.
        let px = result.image().as_rgba().get_pixel(10, 20).0;
        let expected = source.as_rgba().get_pixel(110, 120).0;
        for (a, b) in px.iter().zip(expected) {
            assert!((*a as i16 - b as i16).abs() <= 1, "{px:?} vs {expected:?}");
        }
    }

    #[test]
    fn target_size_takes_longer_edges() {
        let corners = Corners::new([
            Point2D::new(0.0, 0.0),
            Point2D::new(100.0, 10.0),
            Point2D::new(120.0, 80.0),
            Point2D::new(5.0, 70.0),
        ]);
        let (w, h) = target_size(&corners);
        assert_eq!(w, 115);
        assert_eq!(h, 73);
    }

    #[test]
    fn collapsed_corners_pass_through() {
        let source = gradient(50, 40);
        let p = Point2D::new(10.0, 10.0);
        let result = PerspectiveCorrector::new().correct(&source, &Corners::new([p; 4]));
        assert!(!result.is_corrected());
        assert_eq!(result.into_image(), source);
    }

    #[test]
    fn collinear_corners_pass_through() {
        let source = gradient(50, 40);
        let corners = Corners::new([
            Point2D::new(0.0, 0.0),
            Point2D::new(10.0, 10.0),
            Point2D::new(20.0, 20.0),
            Point2D::new(30.0, 30.0),
        ]);
        assert!(!PerspectiveCorrector::new().correct(&source, &corners).is_corrected());
    }

    #[test]
    fn outside_source_is_filled_white() {
        let source = gradient(100, 100);
        // Quad extends past the right edge of the source.
        let corners = Corners::rectangle(50.0, 10.0, 150.0, 90.0);
        let result = PerspectiveCorrector::new().correct(&source, &corners);
        assert!(result.is_corrected());
        let out = result.image().as_rgba();
        assert_eq!(out.get_pixel(90, 40).0, [255, 255, 255, 255]);
    }

    #[test]
    fn oversized_quad_passes_through() {
        let source = gradient(10, 10);
        let corners = Corners::rectangle(0.0, 0.0, 200_000.0, 200_000.0);
        let result = PerspectiveCorrector::new().correct(&source, &corners);
        assert!(!result.is_corrected());
        assert_eq!(result.into_image(), source);
    }

    #[test]
    fn quad_within_twice_the_diagonal_is_still_corrected() {
        // Diagonal of 30x40 is 50; a 90x20 target stays under the limit.
        let source = gradient(30, 40);
        let corners = Corners::rectangle(-30.0, 10.0, 60.0, 30.0);
        let result = PerspectiveCorrector::new().correct(&source, &corners);
        assert!(result.is_corrected());
        assert_eq!(result.image().dimensions(), (90, 20));
    }

    #[test]
    fn nan_corner_passes_through() {
        let source = gradient(20, 20);
        let mut corners = Corners::rectangle(1.0, 1.0, 15.0, 15.0);
        corners.0[2].x = f64::NAN;
        assert!(!PerspectiveCorrector::new().correct(&source, &corners).is_corrected());
    }
}
