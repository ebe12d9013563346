// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The single image <-> display mapping shared by gesture handling and
// preview rendering.
//
// Working corners live in the *rotated frame*: original image coordinates
// after every quarter turn has been applied about the original image centre.
// The rotated image is therefore still centred on that point, with
// dimensions swapped for 90 and 270 degrees. The projection letterboxes the
// rotated image into the viewport, then applies zoom and pan.

use docscan_core::{Point2D, Rotation};
use serde::{Deserialize, Serialize};

/// A point on the display canvas, in display pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DisplayPoint {
    pub x: f64,
    pub y: f64,
}

impl DisplayPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &DisplayPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Size of the display canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> DisplayPoint {
        DisplayPoint::new(self.width as f64 / 2.0, self.height as f64 / 2.0)
    }
}

/// Rotate `p` a quarter turn clockwise (on screen, y down) about `center`:
/// `(x, y) -> (cx - (y - cy), cy + (x - cx))`.
pub fn rotate_point_cw(p: Point2D, center: Point2D) -> Point2D {
    Point2D::new(center.x - (p.y - center.y), center.y + (p.x - center.x))
}

/// Inverse of [`rotate_point_cw`].
pub fn rotate_point_ccw(p: Point2D, center: Point2D) -> Point2D {
    Point2D::new(center.x + (p.y - center.y), center.y - (p.x - center.x))
}

/// Number of clockwise quarter turns in a rotation.
pub(crate) fn quarter_turns(rotation: Rotation) -> u16 {
    rotation.degrees() / 90
}

/// Image-to-display mapping for one session state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayProjection {
    image_width: f64,
    image_height: f64,
    viewport: Viewport,
    zoom: f64,
    pan: DisplayPoint,
    rotation: Rotation,
}

impl DisplayProjection {
    pub fn new(
        image_width: u32,
        image_height: u32,
        viewport: Viewport,
        zoom: f64,
        pan: DisplayPoint,
        rotation: Rotation,
    ) -> Self {
        Self {
            image_width: image_width as f64,
            image_height: image_height as f64,
            viewport,
            zoom,
            pan,
            rotation,
        }
    }

    /// Centre of the original image; also the centre of every rotated frame.
    pub fn image_center(&self) -> Point2D {
        Point2D::new(self.image_width / 2.0, self.image_height / 2.0)
    }

    /// Width and height of the image as currently rotated.
    pub fn rotated_dimensions(&self) -> (f64, f64) {
        if quarter_turns(self.rotation) % 2 == 1 {
            (self.image_height, self.image_width)
        } else {
            (self.image_width, self.image_height)
        }
    }

    /// Top-left corner of the rotated image inside the rotated frame.
    pub fn frame_origin(&self) -> Point2D {
        let c = self.image_center();
        let (rw, rh) = self.rotated_dimensions();
        Point2D::new(c.x - rw / 2.0, c.y - rh / 2.0)
    }

    /// Display pixels per image pixel: letterbox fit times zoom.
    pub fn scale(&self) -> f64 {
        let (rw, rh) = self.rotated_dimensions();
        if rw <= 0.0 || rh <= 0.0 {
            return self.zoom;
        }
        let fit = (self.viewport.width as f64 / rw).min(self.viewport.height as f64 / rh);
        fit * self.zoom
    }

    pub fn to_display(&self, p: Point2D) -> DisplayPoint {
        let s = self.scale();
        let c = self.image_center();
        let v = self.viewport.center();
        DisplayPoint::new(
            v.x + (p.x - c.x) * s + self.pan.x,
            v.y + (p.y - c.y) * s + self.pan.y,
        )
    }

    /// Inverse of [`to_display`](Self::to_display). Not clamped.
    pub fn to_image(&self, d: DisplayPoint) -> Point2D {
        let s = self.scale();
        let c = self.image_center();
        let v = self.viewport.center();
        if s <= 0.0 || !s.is_finite() {
            return c;
        }
        Point2D::new(
            c.x + (d.x - v.x - self.pan.x) / s,
            c.y + (d.y - v.y - self.pan.y) / s,
        )
    }

    /// Clamp a rotated-frame point into the rotated image.
    pub fn clamp(&self, p: Point2D) -> Point2D {
        let o = self.frame_origin();
        let (rw, rh) = self.rotated_dimensions();
        Point2D::new(p.x.clamp(o.x, o.x + rw), p.y.clamp(o.y, o.y + rh))
    }

    /// Map a rotated-frame point back to the unrotated image it came from.
    pub fn to_source(&self, p: Point2D) -> Point2D {
        let c = self.image_center();
        (0..quarter_turns(self.rotation)).fold(p, |acc, _| rotate_point_ccw(acc, c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Point2D, b: Point2D) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn rotation_formula_moves_right_to_below() {
        let c = Point2D::new(200.0, 150.0);
        let r = rotate_point_cw(Point2D::new(50.0, 50.0), c);
        assert!(approx(r, Point2D::new(200.0 - (50.0 - 150.0), 150.0 + (50.0 - 200.0))));
        assert!(approx(rotate_point_ccw(r, c), Point2D::new(50.0, 50.0)));
    }

    #[test]
    fn letterbox_fit_centres_the_image() {
        // 400x300 into 800x800: fit 2.0, image spans y 100..700.
        let proj = DisplayProjection::new(
            400,
            300,
            Viewport::new(800, 800),
            1.0,
            DisplayPoint::default(),
            Rotation::Deg0,
        );
        assert_eq!(proj.scale(), 2.0);
        assert_eq!(proj.to_display(Point2D::new(0.0, 0.0)), DisplayPoint::new(0.0, 100.0));
        assert_eq!(proj.to_display(Point2D::new(400.0, 300.0)), DisplayPoint::new(800.0, 700.0));
    }

    #[test]
    fn to_image_inverts_to_display() {
        let proj = DisplayProjection::new(
            640,
            480,
            Viewport::new(390, 844),
            1.75,
            DisplayPoint::new(-12.5, 30.0),
            Rotation::Deg90,
        );
        for p in [Point2D::new(0.0, 0.0), Point2D::new(123.4, 56.7), Point2D::new(640.0, 480.0)] {
            assert!(approx(proj.to_image(proj.to_display(p)), p));
        }
    }

    #[test]
    fn rotated_frame_swaps_dimensions() {
        let proj = DisplayProjection::new(
            400,
            300,
            Viewport::new(300, 400),
            1.0,
            DisplayPoint::default(),
            Rotation::Deg90,
        );
        assert_eq!(proj.rotated_dimensions(), (300.0, 400.0));
        assert_eq!(proj.frame_origin(), Point2D::new(50.0, -50.0));
        // Portrait viewport exactly fits the rotated image.
        assert_eq!(proj.scale(), 1.0);
        assert_eq!(proj.clamp(Point2D::new(0.0, 500.0)), Point2D::new(50.0, 350.0));
    }

    #[test]
    fn to_source_undoes_rotation() {
        let proj = DisplayProjection::new(
            400,
            300,
            Viewport::new(100, 100),
            1.0,
            DisplayPoint::default(),
            Rotation::Deg270,
        );
        let c = proj.image_center();
        let original = Point2D::new(10.0, 20.0);
        let rotated = (0..3).fold(original, |p, _| rotate_point_cw(p, c));
        assert!(approx(proj.to_source(rotated), original));
    }
}
