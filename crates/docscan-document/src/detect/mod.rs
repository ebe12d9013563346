// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document boundary detection.
//
// An edge map is extracted, outer contours are approximated to polygons,
// and the largest qualifying quadrilateral is returned with its corners in
// canonical order. When nothing qualifies, or the detection capability is
// unavailable, a default inset rectangle is synthesized instead; detection
// never fails.

pub mod capability;
pub mod edges;
pub mod order;
pub mod quad;

pub use capability::{
    ContourDetector, DetectorInitError, DetectorState, DocumentDetector, load_contour_detector,
};
pub use edges::EdgeDetector;
pub use order::order_corners;
pub use quad::{QuadCandidate, QuadrilateralFinder, fallback_corners, find_candidates};

use docscan_core::DetectionResult;
use tracing::instrument;

use crate::raster::RasterImage;

/// Detect the document quadrilateral in `image` using whatever the
/// capability state allows.
#[instrument(skip_all, fields(width = image.width(), height = image.height(), state = ?state))]
pub fn detect_document(
    state: &DetectorState,
    finder: &QuadrilateralFinder,
    image: &RasterImage,
) -> DetectionResult {
    let (width, height) = image.dimensions();
    match state.detector() {
        Some(detector) => {
            let candidates = detector.candidates(image);
            finder.select(&candidates, width, height)
        }
        None => finder.fallback(width, height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscan_core::config::DetectionConfig;
    use docscan_core::{Corners, DetectionSource};
    use image::Rgba;

    #[test]
    fn unavailable_capability_uses_fallback() {
        let raster = RasterImage::filled(800, 600, Rgba([200, 200, 200, 255])).unwrap();
        let state = DetectorState::Unavailable("not loaded".into());
        let result = detect_document(&state, &QuadrilateralFinder::default(), &raster);
        assert_eq!(result.source, DetectionSource::Fallback);
        assert_eq!(result.corners, Corners::rectangle(40.0, 30.0, 760.0, 570.0));
    }

    #[test]
    fn solid_image_with_ready_detector_falls_back() {
        let raster = RasterImage::filled(400, 300, Rgba([90, 90, 90, 255])).unwrap();
        let state = DetectorState::ready(ContourDetector::new(DetectionConfig::default()));
        let result = detect_document(&state, &QuadrilateralFinder::default(), &raster);
        assert_eq!(result.source, DetectionSource::Fallback);
        assert!(result.corners.within(400, 300));
    }
}
