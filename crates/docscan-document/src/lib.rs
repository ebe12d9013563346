// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docscan-document — Document image rectification and enhancement.
//
// Finds the page quadrilateral in a photograph (edge map, contour search,
// corner ordering, default rectangle fallback), lets a person refine the
// corners in a crop session, flattens the page with a four-point homography,
// and applies one of four scan filters. Also provides the raster codec and
// the upload compression helper.

pub mod codec;
pub mod crop;
pub mod detect;
pub mod filter;
pub mod perspective;
pub mod pipeline;
pub mod raster;

// Re-export the primary types so callers can use `docscan_document::ScanPipeline` etc.
pub use codec::{Compressed, PassReason, Quality, compress_image};
pub use crop::{CommittedCrop, CropSession, DisplayPoint, DisplayProjection, PreviewOptions, Viewport};
pub use detect::{
    ContourDetector, DetectorState, DocumentDetector, EdgeDetector, QuadCandidate, QuadrilateralFinder,
    order_corners,
};
pub use filter::{FilterEngine, Filtered};
pub use perspective::{Correction, PerspectiveCorrector};
pub use pipeline::{CancellationFlag, ScanJob, ScanOutcome, ScanPipeline};
pub use raster::{ProcessedImage, RasterImage};
