// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Interactive corner correction.

use docscan_core::config::CropConfig;
use docscan_core::error::{DocscanError, Result};
use docscan_core::{CropSessionSnapshot, Corners, DetectionResult, Point2D, Rotation};
use tracing::{debug, info, instrument};

use super::projection::{DisplayPoint, DisplayProjection, Viewport, rotate_point_cw};
use crate::detect::order_corners;

/// Output of [`CropSession::commit`]: the corners to warp, expressed in the
/// pixel grid of the source image after `rotation` has been applied to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommittedCrop {
    pub corners: Corners,
    pub rotation: Rotation,
}

/// Human refinement of detected corners.
///
/// A plain value owned by the caller; the methods below are its only
/// mutators. Zoom and pan change the display projection only, while drags
/// and rotation change the working corners. Dropping the session cancels it.
#[derive(Debug, Clone)]
pub struct CropSession {
    config: CropConfig,
    image_width: u32,
    image_height: u32,
    viewport: Viewport,
    initial: Corners,
    corners: Corners,
    zoom: f64,
    pan: DisplayPoint,
    rotation: Rotation,
    dragging: Option<usize>,
}

impl CropSession {
    /// Start a session from a detection result.
    ///
    /// Corners are copied (and clamped into the image); the detection result
    /// itself is never touched again.
    #[instrument(skip(detection, config), fields(source = ?detection.source))]
    pub fn initialize(
        detection: &DetectionResult,
        image_width: u32,
        image_height: u32,
        viewport: Viewport,
        config: CropConfig,
    ) -> Result<Self> {
        if image_width == 0 || image_height == 0 {
            return Err(DocscanError::InvalidDimensions {
                width: image_width,
                height: image_height,
            });
        }
        if viewport.width == 0 || viewport.height == 0 {
            return Err(DocscanError::InvalidDimensions {
                width: viewport.width,
                height: viewport.height,
            });
        }

        let (w, h) = (image_width as f64, image_height as f64);
        let corners = Corners::new(
            detection
                .corners
                .points()
                .map(|p| Point2D::new(p.x.clamp(0.0, w), p.y.clamp(0.0, h))),
        );
        info!(?corners, "Crop session started");

        Ok(Self {
            config,
            image_width,
            image_height,
            viewport,
            initial: corners,
            corners,
            zoom: 1.0,
            pan: DisplayPoint::default(),
            rotation: Rotation::Deg0,
            dragging: None,
        })
    }

    /// The projection for the current state. Both hit-testing and the
    /// preview renderer go through this.
    pub fn projection(&self) -> DisplayProjection {
        DisplayProjection::new(
            self.image_width,
            self.image_height,
            self.viewport,
            self.zoom,
            self.pan,
            self.rotation,
        )
    }

    /// Working corners, in the rotated frame.
    pub fn corners(&self) -> &Corners {
        &self.corners
    }

    pub fn display_corners(&self) -> [DisplayPoint; 4] {
        let proj = self.projection();
        self.corners.points().map(|p| proj.to_display(p))
    }

    pub fn zoom_level(&self) -> f64 {
        self.zoom
    }

    pub fn pan_offset(&self) -> DisplayPoint {
        self.pan
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn dragging_index(&self) -> Option<usize> {
        self.dragging
    }

    pub fn image_dimensions(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Resize the display canvas (e.g. on device rotation).
    pub fn set_viewport(&mut self, viewport: Viewport) {
        if viewport.width > 0 && viewport.height > 0 {
            self.viewport = viewport;
        }
    }

    /// Index of the corner handle under `point`, if any.
    ///
    /// A handle is hit when its projected position is strictly closer than
    /// `hit_radius` display pixels. If several qualify the nearest wins, and
    /// the lower index on an exact tie.
    pub fn hit_test(&self, point: DisplayPoint) -> Option<usize> {
        self.display_corners()
            .iter()
            .enumerate()
            .map(|(i, d)| (i, d.distance(&point)))
            .filter(|(_, dist)| *dist < self.config.hit_radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Make `index` the active handle. Out-of-range indices are ignored.
    pub fn begin_drag(&mut self, index: usize) -> bool {
        if index >= 4 {
            return false;
        }
        debug!(index, "Drag started");
        self.dragging = Some(index);
        true
    }

    /// Move the active handle to the image position under `point`.
    ///
    /// The position is clamped to the (rotated) image. Returns `false` when
    /// nothing is being dragged or the move is below the jitter threshold.
    pub fn drag(&mut self, point: DisplayPoint) -> bool {
        let Some(index) = self.dragging else {
            return false;
        };
        let proj = self.projection();
        let target = proj.clamp(proj.to_image(point));
        let current = self.corners.0[index];

        let min_move = self.config.min_move;
        if (target.x - current.x).abs() < min_move && (target.y - current.y).abs() < min_move {
            return false;
        }
        self.corners.0[index] = target;
        true
    }

    pub fn end_drag(&mut self) {
        if let Some(index) = self.dragging.take() {
            debug!(index, corner = ?self.corners.0[index], "Drag ended");
        }
    }

    /// Turn the image a quarter clockwise, carrying the corners along.
    pub fn rotate(&mut self) {
        let center = self.projection().image_center();
        self.corners = Corners::new(self.corners.points().map(|p| rotate_point_cw(p, center)));
        self.rotation = self.rotation.next();
        debug!(degrees = self.rotation.degrees(), "Crop rotated");
    }

    /// Adjust zoom by `delta`, clamped to the configured range.
    pub fn zoom(&mut self, delta: f64) {
        if !delta.is_finite() {
            return;
        }
        self.zoom = (self.zoom + delta).clamp(self.config.zoom_min, self.config.zoom_max);
    }

    pub fn zoom_in(&mut self) {
        self.zoom(self.config.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.zoom(-self.config.zoom_step);
    }

    /// Back to fit-to-viewport with no pan.
    pub fn reset_zoom(&mut self) {
        self.zoom = 1.0;
        self.pan = DisplayPoint::default();
    }

    /// Shift the view by a display-pixel offset.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        if dx.is_finite() && dy.is_finite() {
            self.pan = DisplayPoint::new(self.pan.x + dx, self.pan.y + dy);
        }
    }

    /// Restore corners, zoom, pan and rotation to their initial values.
    pub fn reset(&mut self) {
        self.corners = self.initial;
        self.rotation = Rotation::Deg0;
        self.dragging = None;
        self.reset_zoom();
        debug!("Crop session reset");
    }

    pub fn snapshot(&self) -> CropSessionSnapshot {
        CropSessionSnapshot {
            corners: self.corners,
            zoom: self.zoom,
            rotation_degrees: self.rotation.degrees(),
            dragging_index: self.dragging,
        }
    }

    /// End the session.
    ///
    /// Corners are translated into the rotated image's pixel grid and put
    /// back into canonical order, since a quarter turn moves each stored
    /// corner into its neighbour's role.
    #[instrument(skip(self), fields(rotation = self.rotation.degrees()))]
    pub fn commit(self) -> CommittedCrop {
        let origin = self.projection().frame_origin();
        let translated = self
            .corners
            .points()
            .map(|p| Point2D::new(p.x - origin.x, p.y - origin.y));
        let corners = order_corners(translated);
        info!(?corners, "Crop committed");
        CommittedCrop {
            corners,
            rotation: self.rotation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscan_core::DetectionSource;

    fn session(width: u32, height: u32, corners: Corners) -> CropSession {
        let detection = DetectionResult {
            corners,
            source: DetectionSource::Auto,
        };
        CropSession::initialize(
            &detection,
            width,
            height,
            Viewport::new(width, height),
            CropConfig::default(),
        )
        .unwrap()
    }

    fn close(a: Point2D, b: Point2D, tol: f64) -> bool {
        (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        let detection = DetectionResult {
            corners: Corners::rectangle(0.0, 0.0, 1.0, 1.0),
            source: DetectionSource::Fallback,
        };
        let err = CropSession::initialize(&detection, 0, 10, Viewport::new(10, 10), CropConfig::default())
            .unwrap_err();
        assert!(matches!(err, DocscanError::InvalidDimensions { .. }));
    }

    #[test]
    fn hit_test_finds_handles_within_radius() {
        // Viewport equals the image, so display == image coordinates.
        let s = session(400, 300, Corners::rectangle(50.0, 50.0, 350.0, 250.0));
        assert_eq!(s.hit_test(DisplayPoint::new(60.0, 60.0)), Some(0));
        assert_eq!(s.hit_test(DisplayPoint::new(345.0, 255.0)), Some(2));
        assert_eq!(s.hit_test(DisplayPoint::new(200.0, 150.0)), None);
        // Exactly on the radius is a miss.
        assert_eq!(s.hit_test(DisplayPoint::new(75.0, 50.0)), None);
    }

    #[test]
    fn hit_test_tracks_zoom() {
        let mut s = session(400, 300, Corners::rectangle(50.0, 50.0, 350.0, 250.0));
        s.zoom(1.0);
        // At zoom 2 the top-left handle projects to (-100, -50).
        assert_eq!(s.display_corners()[0], DisplayPoint::new(-100.0, -50.0));
        assert_eq!(s.hit_test(DisplayPoint::new(-95.0, -45.0)), Some(0));
        assert_eq!(s.hit_test(DisplayPoint::new(60.0, 60.0)), None);
    }

    #[test]
    fn drag_moves_and_clamps() {
        let mut s = session(400, 300, Corners::rectangle(50.0, 50.0, 350.0, 250.0));
        assert!(!s.drag(DisplayPoint::new(10.0, 10.0)), "drag without an active handle");

        assert!(s.begin_drag(0));
        assert!(s.drag(DisplayPoint::new(20.0, 30.0)));
        assert_eq!(s.corners().top_left(), Point2D::new(20.0, 30.0));

        assert!(s.drag(DisplayPoint::new(-80.0, 999.0)));
        assert_eq!(s.corners().top_left(), Point2D::new(0.0, 300.0));

        s.end_drag();
        assert_eq!(s.dragging_index(), None);
        assert!(!s.drag(DisplayPoint::new(100.0, 100.0)));
        assert_eq!(s.corners().top_left(), Point2D::new(0.0, 300.0));
    }

    #[test]
    fn sub_pixel_jitter_is_ignored() {
        let mut s = session(400, 300, Corners::rectangle(50.0, 50.0, 350.0, 250.0));
        s.begin_drag(1);
        assert!(!s.drag(DisplayPoint::new(350.4, 49.7)));
        assert_eq!(s.corners().top_right(), Point2D::new(350.0, 50.0));
    }

    #[test]
    fn zoom_is_clamped_and_leaves_corners() {
        let mut s = session(400, 300, Corners::rectangle(50.0, 50.0, 350.0, 250.0));
        let before = *s.corners();
        for _ in 0..20 {
            s.zoom_in();
        }
        assert_eq!(s.zoom_level(), 3.0);
        s.zoom(-10.0);
        assert_eq!(s.zoom_level(), 0.5);
        s.pan(15.0, -5.0);
        s.reset_zoom();
        assert_eq!(s.zoom_level(), 1.0);
        assert_eq!(s.pan_offset(), DisplayPoint::default());
        assert_eq!(*s.corners(), before);
    }

    #[test]
    fn four_rotations_round_trip() {
        let original = Corners::new([
            Point2D::new(31.5, 12.25),
            Point2D::new(377.0, 40.0),
            Point2D::new(360.75, 288.0),
            Point2D::new(20.0, 260.5),
        ]);
        let mut s = session(400, 300, original);
        for _ in 0..4 {
            s.rotate();
        }
        assert_eq!(s.rotation(), Rotation::Deg0);
        for (a, b) in s.corners().points().iter().zip(original.points()) {
            assert!(close(*a, *b, 1e-3), "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut s = session(400, 300, Corners::rectangle(50.0, 50.0, 350.0, 250.0));
        s.begin_drag(3);
        s.drag(DisplayPoint::new(10.0, 290.0));
        s.rotate();
        s.zoom_in();
        s.reset();
        assert_eq!(*s.corners(), Corners::rectangle(50.0, 50.0, 350.0, 250.0));
        assert_eq!(s.rotation(), Rotation::Deg0);
        assert_eq!(s.zoom_level(), 1.0);
        assert_eq!(s.dragging_index(), None);
    }

    #[test]
    fn commit_after_rotation_is_in_rotated_pixel_grid() {
        let mut s = session(400, 300, Corners::rectangle(50.0, 50.0, 350.0, 250.0));
        s.rotate();
        let committed = s.commit();
        assert_eq!(committed.rotation, Rotation::Deg90);
        // Rotated image is 300x400; the crop is 200 wide and 300 tall.
        let expected = Corners::rectangle(50.0, 50.0, 250.0, 350.0);
        for (a, b) in committed.corners.points().iter().zip(expected.points()) {
            assert!(close(*a, *b, 1e-9), "{a:?} vs {b:?}");
        }
        assert!(committed.corners.within(300, 400));
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut s = session(400, 300, Corners::rectangle(50.0, 50.0, 350.0, 250.0));
        s.begin_drag(2);
        s.rotate();
        let snap = s.snapshot();
        assert_eq!(snap.rotation_degrees, 90);
        assert_eq!(snap.dragging_index, Some(2));
        assert_eq!(snap.zoom, 1.0);
    }
}
