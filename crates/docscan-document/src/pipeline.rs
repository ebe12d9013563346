// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end scan pipeline: decode, detect, crop session, perspective
// correction, filter.
//
// Detection, correction, and filtering degrade instead of failing; only
// decoding (and cancellation / background-task failure in the async paths)
// produce an `Err`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use docscan_core::error::{DocscanError, Result};
use docscan_core::{DetectionResult, FilterKind, ScanConfig};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::codec;
use crate::crop::{CommittedCrop, CropSession, Viewport};
use crate::detect::{DetectorState, QuadrilateralFinder, detect_document, load_contour_detector};
use crate::filter::{FilterEngine, Filtered};
use crate::perspective::{Correction, PerspectiveCorrector};
use crate::raster::{ProcessedImage, RasterImage};

/// Upper bound on bringing up the detection capability.
pub const DETECTOR_LOAD_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared cancel signal, checked between pipeline stages.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(DocscanError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Result of correcting and filtering one page.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    /// False when the corners were degenerate and the page was not warped.
    pub corrected: bool,
    pub filtered: Filtered,
}

impl ScanOutcome {
    pub fn image(&self) -> &ProcessedImage {
        self.filtered.image()
    }

    pub fn into_image(self) -> ProcessedImage {
        self.filtered.into_image()
    }
}

/// Stateless stages plus the one-shot detection capability.
#[derive(Debug, Clone)]
pub struct ScanPipeline {
    config: ScanConfig,
    detector: DetectorState,
    finder: QuadrilateralFinder,
    corrector: PerspectiveCorrector,
    engine: FilterEngine,
}

impl ScanPipeline {
    /// Pipeline with the detection capability not yet initialized.
    pub fn new(config: ScanConfig) -> Self {
        Self::with_detector(config, DetectorState::Uninitialized)
    }

    pub fn with_detector(config: ScanConfig, detector: DetectorState) -> Self {
        Self {
            finder: QuadrilateralFinder::new(config.detection.clone()),
            config,
            detector,
            corrector: PerspectiveCorrector::new(),
            engine: FilterEngine::new(),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn detector_state(&self) -> &DetectorState {
        &self.detector
    }

    /// Load the built-in contour detector, once. Later calls do nothing.
    pub async fn initialize_detector(&mut self) -> &DetectorState {
        let loader = load_contour_detector(self.config.detection.clone());
        self.detector
            .initialize_with_timeout(loader, DETECTOR_LOAD_TIMEOUT)
            .await
    }

    /// Decode an encoded capture. The only stage whose failure is fatal.
    pub fn decode(&self, data: &[u8]) -> Result<RasterImage> {
        codec::decode(data)
    }

    pub fn detect(&self, raster: &RasterImage) -> DetectionResult {
        if matches!(self.detector, DetectorState::Uninitialized) {
            debug!("Detector not initialized; using default rectangle");
        }
        detect_document(&self.detector, &self.finder, raster)
    }

    pub fn start_session(
        &self,
        detection: &DetectionResult,
        raster: &RasterImage,
        viewport: Viewport,
    ) -> Result<CropSession> {
        CropSession::initialize(
            detection,
            raster.width(),
            raster.height(),
            viewport,
            self.config.crop.clone(),
        )
    }

    /// Apply the committed rotation, then warp.
    pub fn correct(&self, raster: &RasterImage, crop: &CommittedCrop) -> Correction {
        correct_committed(&self.corrector, raster, crop)
    }

    pub fn filter(&self, raster: &RasterImage, kind: FilterKind) -> Filtered {
        self.engine.apply(kind, raster)
    }

    /// Synchronous correct-then-filter.
    #[instrument(skip_all, fields(filter = %kind))]
    pub fn process(&self, raster: &RasterImage, crop: &CommittedCrop, kind: FilterKind) -> ScanOutcome {
        let correction = self.correct(raster, crop);
        let corrected = correction.is_corrected();
        let filtered = self.engine.apply(kind, correction.image());
        ScanOutcome { corrected, filtered }
    }

    /// Correct and filter on the blocking pool, checking `cancel` before,
    /// between, and after the two stages.
    #[instrument(skip_all, fields(filter = %kind))]
    pub async fn correct_and_filter_async(
        &self,
        raster: RasterImage,
        crop: CommittedCrop,
        kind: FilterKind,
        cancel: &CancellationFlag,
    ) -> Result<ScanOutcome> {
        cancel.check()?;

        let corrector = self.corrector;
        let correction = tokio::task::spawn_blocking(move || correct_committed(&corrector, &raster, &crop))
            .await
            .map_err(|e| DocscanError::BackgroundTask(e.to_string()))?;
        let corrected = correction.is_corrected();
        cancel.check()?;

        let filtered = self.filter_async(correction.into_image(), kind, cancel).await?;
        Ok(ScanOutcome { corrected, filtered })
    }

    /// Filter on the blocking pool.
    pub async fn filter_async(
        &self,
        raster: RasterImage,
        kind: FilterKind,
        cancel: &CancellationFlag,
    ) -> Result<Filtered> {
        cancel.check()?;
        let engine = self.engine;
        let filtered = tokio::task::spawn_blocking(move || engine.apply(kind, &raster))
            .await
            .map_err(|e| DocscanError::BackgroundTask(e.to_string()))?;
        cancel.check()?;
        Ok(filtered)
    }

    /// Non-interactive scan of an encoded capture: detected corners are
    /// committed as-is.
    #[instrument(skip_all, fields(data_len = data.len(), filter = %kind))]
    pub fn auto_scan(&self, data: &[u8], kind: FilterKind) -> Result<ScanOutcome> {
        let raster = self.decode(data)?;
        let detection = self.detect(&raster);
        let crop = CommittedCrop {
            corners: detection.corners,
            rotation: docscan_core::Rotation::Deg0,
        };
        Ok(self.process(&raster, &crop, kind))
    }
}

fn correct_committed(corrector: &PerspectiveCorrector, raster: &RasterImage, crop: &CommittedCrop) -> Correction {
    let rotated = raster.rotated(crop.rotation);
    corrector.correct(&rotated, &crop.corners)
}

/// Everything one capture owns between decode and export.
///
/// Dropping the job, or calling [`cancel`](Self::cancel), releases every
/// intermediate raster; nothing outlives it.
#[derive(Debug)]
pub struct ScanJob {
    id: Uuid,
    started_at: DateTime<Utc>,
    original: RasterImage,
    detection: DetectionResult,
    session: Option<CropSession>,
    committed: Option<CommittedCrop>,
    cancel: CancellationFlag,
}

impl ScanJob {
    /// Decode, detect, and open a crop session for `viewport`.
    #[instrument(skip(pipeline, data), fields(data_len = data.len()))]
    pub fn start(pipeline: &ScanPipeline, data: &[u8], viewport: Viewport) -> Result<Self> {
        let original = pipeline.decode(data)?;
        Self::from_raster(pipeline, original, viewport)
    }

    pub fn from_raster(pipeline: &ScanPipeline, original: RasterImage, viewport: Viewport) -> Result<Self> {
        let detection = pipeline.detect(&original);
        let session = pipeline.start_session(&detection, &original, viewport)?;
        let id = Uuid::new_v4();
        info!(job_id = %id, source = ?detection.source, "Scan job started");
        Ok(Self {
            id,
            started_at: Utc::now(),
            original,
            detection,
            session: Some(session),
            committed: None,
            cancel: CancellationFlag::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn original(&self) -> &RasterImage {
        &self.original
    }

    pub fn detection(&self) -> &DetectionResult {
        &self.detection
    }

    pub fn session(&self) -> Result<&CropSession> {
        self.session.as_ref().ok_or(DocscanError::SessionClosed)
    }

    pub fn session_mut(&mut self) -> Result<&mut CropSession> {
        self.session.as_mut().ok_or(DocscanError::SessionClosed)
    }

    /// A handle that cancels this job from another task.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Close the crop session. Fails if it was already committed.
    pub fn commit(&mut self) -> Result<CommittedCrop> {
        let session = self.session.take().ok_or(DocscanError::SessionClosed)?;
        let crop = session.commit();
        self.committed = Some(crop);
        Ok(crop)
    }

    /// Correct and filter. Commits the session first if that has not
    /// happened yet, so correction always sees final corners.
    pub async fn finish(mut self, pipeline: &ScanPipeline, kind: FilterKind) -> Result<ScanOutcome> {
        let crop = match self.committed {
            Some(crop) => crop,
            None => self.commit()?,
        };
        let cancel = self.cancel.clone();
        let outcome = pipeline
            .correct_and_filter_async(self.original, crop, kind, &cancel)
            .await;
        match &outcome {
            Ok(_) => {
                let elapsed_ms = (Utc::now() - self.started_at).num_milliseconds();
                info!(job_id = %self.id, elapsed_ms, "Scan job finished");
            }
            Err(DocscanError::Cancelled) => info!(job_id = %self.id, "Scan cancelled during processing"),
            Err(err) => warn!(job_id = %self.id, error = %err, "Scan job failed"),
        }
        outcome
    }

    /// Abort the capture. In-flight work holding this job's flag stops at
    /// its next stage boundary.
    pub fn cancel(self) {
        self.cancel.cancel();
        warn!(
            job_id = %self.id,
            width = self.original.width(),
            height = self.original.height(),
            "Scan job cancelled; discarding intermediate images"
        );
    }
}
