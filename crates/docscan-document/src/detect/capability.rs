// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The detection capability: a pluggable "image in, quadrilateral candidates
// out" service that is loaded once, asynchronously, and may be unavailable.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use docscan_core::config::DetectionConfig;
use docscan_core::error::DocscanError;
use image::imageops::FilterType;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::edges::EdgeDetector;
use super::quad::{QuadCandidate, find_candidates};
use crate::raster::RasterImage;

/// Anything that can propose document quadrilaterals for an image.
///
/// The contract is deliberately narrow: zero or more 4-vertex candidates
/// with their enclosed area, in the image's own pixel coordinates. Picking
/// one (or falling back) is the caller's job.
pub trait DocumentDetector: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    fn candidates(&self, image: &RasterImage) -> Vec<QuadCandidate>;
}

/// Built-in detector: edge map plus contour search, run on a copy downscaled
/// to `max_dimension` with corners mapped back to full resolution.
#[derive(Debug, Clone)]
pub struct ContourDetector {
    config: DetectionConfig,
    edges: EdgeDetector,
}

impl ContourDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            edges: EdgeDetector::new(config.clone()),
            config,
        }
    }
}

impl DocumentDetector for ContourDetector {
    fn name(&self) -> &str {
        "contour"
    }

    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    fn candidates(&self, image: &RasterImage) -> Vec<QuadCandidate> {
        let (width, height) = image.dimensions();
        let largest = width.max(height);
        let max_dim = self.config.max_dimension.max(1);

        let (working, scale) = if largest > max_dim {
            let scale = max_dim as f64 / largest as f64;
            let w = ((width as f64 * scale).round() as u32).max(1);
            let h = ((height as f64 * scale).round() as u32).max(1);
            let small = image::imageops::resize(image.as_rgba(), w, h, FilterType::Triangle);
            match RasterImage::from_rgba(small) {
                Ok(raster) => (Cow::Owned(raster), scale),
                Err(_) => (Cow::Borrowed(image), 1.0),
            }
        } else {
            (Cow::Borrowed(image), 1.0)
        };
        debug!(scale, "Detection working copy prepared");

        let edges = self.edges.detect(&working);
        find_candidates(&edges, &self.config)
            .into_iter()
            .map(|c| QuadCandidate {
                corners: c.corners.scaled(1.0 / scale),
                area: c.area / (scale * scale),
            })
            .collect()
    }
}

/// Why the detection capability could not be brought up.
#[derive(Debug, Error)]
pub enum DetectorInitError {
    #[error("detector failed to load: {0}")]
    Load(String),

    #[error("detector did not load within {0:?}")]
    TimedOut(Duration),
}

/// One-shot initialization state of the detection capability.
///
/// `Uninitialized` moves to `Ready` or `Unavailable` exactly once. Both are
/// terminal: a failed load is never retried, and every detection made while
/// `Unavailable` uses the fallback rectangle.
#[derive(Clone, Default)]
pub enum DetectorState {
    #[default]
    Uninitialized,
    Ready(Arc<dyn DocumentDetector>),
    Unavailable(String),
}

impl std::fmt::Debug for DetectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorState::Uninitialized => f.write_str("Uninitialized"),
            DetectorState::Ready(detector) => write!(f, "Ready({})", detector.name()),
            DetectorState::Unavailable(reason) => write!(f, "Unavailable({reason})"),
        }
    }
}

impl DetectorState {
    /// Already-loaded detector, for callers that construct it synchronously.
    pub fn ready(detector: impl DocumentDetector + 'static) -> Self {
        DetectorState::Ready(Arc::new(detector))
    }

    /// Run `loader` if nothing has been attempted yet. Later calls are no-ops.
    pub async fn initialize<F>(&mut self, loader: F) -> &DetectorState
    where
        F: Future<Output = Result<Arc<dyn DocumentDetector>, DetectorInitError>>,
    {
        if !matches!(self, DetectorState::Uninitialized) {
            debug!(state = ?self, "Detector already initialized; skipping");
            return self;
        }

        *self = match loader.await {
            Ok(detector) => {
                info!(detector = detector.name(), "Document detector ready");
                DetectorState::Ready(detector)
            }
            Err(err) => {
                warn!(error = %err, "Document detector unavailable; corners will use the default rectangle");
                DetectorState::Unavailable(err.to_string())
            }
        };
        self
    }

    /// [`initialize`](Self::initialize) with an upper bound on load time.
    pub async fn initialize_with_timeout<F>(&mut self, loader: F, timeout: Duration) -> &DetectorState
    where
        F: Future<Output = Result<Arc<dyn DocumentDetector>, DetectorInitError>>,
    {
        self.initialize(async move {
            tokio::time::timeout(timeout, loader)
                .await
                .unwrap_or(Err(DetectorInitError::TimedOut(timeout)))
        })
        .await
    }

    pub fn detector(&self) -> Option<&Arc<dyn DocumentDetector>> {
        match self {
            DetectorState::Ready(detector) => Some(detector),
            _ => None,
        }
    }

    /// The loaded detector, or `DetectorUnavailable` for callers that cannot
    /// accept the default rectangle.
    pub fn require(&self) -> docscan_core::error::Result<&Arc<dyn DocumentDetector>> {
        match self {
            DetectorState::Ready(detector) => Ok(detector),
            DetectorState::Uninitialized => {
                Err(DocscanError::DetectorUnavailable("not initialized".into()))
            }
            DetectorState::Unavailable(reason) => Err(DocscanError::DetectorUnavailable(reason.clone())),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, DetectorState::Ready(_))
    }
}

/// Loader for the built-in contour detector.
pub async fn load_contour_detector(
    config: DetectionConfig,
) -> Result<Arc<dyn DocumentDetector>, DetectorInitError> {
    if config.max_dimension == 0 {
        return Err(DetectorInitError::Load("max_dimension must be positive".into()));
    }
    Ok(Arc::new(ContourDetector::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn page_on_desk(width: u32, height: u32) -> RasterImage {
        let (x0, y0, x1, y1) = (width / 5, height / 6, width * 4 / 5, height * 5 / 6);
        let img = RgbaImage::from_fn(width, height, |x, y| {
            if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
                Rgba([240, 238, 232, 255])
            } else {
                Rgba([60, 45, 35, 255])
            }
        });
        RasterImage::from_rgba(img).unwrap()
    }

    #[tokio::test]
    async fn failed_load_is_terminal() {
        let mut state = DetectorState::default();
        state
            .initialize(async { Err(DetectorInitError::Load("network down".into())) })
            .await;
        assert!(matches!(state, DetectorState::Unavailable(_)));
        assert!(matches!(state.require(), Err(DocscanError::DetectorUnavailable(_))));

        // A second, successful loader is ignored.
        state
            .initialize(load_contour_detector(DetectionConfig::default()))
            .await;
        assert!(!state.is_ready());
    }

    #[tokio::test]
    async fn slow_loader_times_out() {
        let mut state = DetectorState::default();
        state
            .initialize_with_timeout(
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    load_contour_detector(DetectionConfig::default()).await
                },
                Duration::from_millis(10),
            )
            .await;
        match &state {
            DetectorState::Unavailable(reason) => assert!(reason.contains("did not load")),
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn builtin_loader_becomes_ready() {
        let mut state = DetectorState::default();
        state
            .initialize(load_contour_detector(DetectionConfig::default()))
            .await;
        assert!(state.is_ready());
        assert_eq!(state.detector().unwrap().name(), "contour");
    }

    #[test]
    fn downscaled_candidates_map_back_to_full_resolution() {
        let config = DetectionConfig {
            max_dimension: 200,
            ..DetectionConfig::default()
        };
        let raster = page_on_desk(500, 360);
        let candidates = ContourDetector::new(config).candidates(&raster);
        assert!(!candidates.is_empty(), "page not detected");

        let best = candidates
            .iter()
            .max_by(|a, b| a.area.total_cmp(&b.area))
            .unwrap();
        let tl = best.corners.top_left();
        let br = best.corners.bottom_right();
        assert!((tl.x - 100.0).abs() < 12.0 && (tl.y - 60.0).abs() < 12.0, "{tl:?}");
        assert!((br.x - 400.0).abs() < 12.0 && (br.y - 300.0).abs() < 12.0, "{br:?}");
    }
}
