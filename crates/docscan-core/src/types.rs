// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Docscan document pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{DocscanError, Result};

/// An image-space coordinate (never display-space).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Index of a corner inside [`Corners`].
pub const TOP_LEFT: usize = 0;
pub const TOP_RIGHT: usize = 1;
pub const BOTTOM_RIGHT: usize = 2;
pub const BOTTOM_LEFT: usize = 3;

/// Exactly four corners in canonical order: top-left, top-right,
/// bottom-right, bottom-left.
///
/// The type only fixes the count. Ordering and bounds are established by the
/// producer (the corner orderer, the fallback rectangle, or a clamped drag)
/// and can be checked with [`Corners::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Corners(pub [Point2D; 4]);

impl Corners {
    pub fn new(points: [Point2D; 4]) -> Self {
        Self(points)
    }

    /// Axis-aligned rectangle spanning `(x0, y0)`..`(x1, y1)`.
    pub fn rectangle(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self([
            Point2D::new(x0, y0),
            Point2D::new(x1, y0),
            Point2D::new(x1, y1),
            Point2D::new(x0, y1),
        ])
    }

    pub fn points(&self) -> &[Point2D; 4] {
        &self.0
    }

    pub fn top_left(&self) -> Point2D {
        self.0[TOP_LEFT]
    }

    pub fn top_right(&self) -> Point2D {
        self.0[TOP_RIGHT]
    }

    pub fn bottom_right(&self) -> Point2D {
        self.0[BOTTOM_RIGHT]
    }

    pub fn bottom_left(&self) -> Point2D {
        self.0[BOTTOM_LEFT]
    }

    /// Enclosed area via the shoelace formula.
    pub fn area(&self) -> f64 {
        let pts = &self.0;
        let mut twice = 0.0;
        for i in 0..4 {
            let j = (i + 1) % 4;
            twice += pts[i].x * pts[j].y - pts[j].x * pts[i].y;
        }
        twice.abs() / 2.0
    }

    /// True when every corner lies in `[0, width] x [0, height]`.
    pub fn within(&self, width: u32, height: u32) -> bool {
        let (w, h) = (width as f64, height as f64);
        self.0
            .iter()
            .all(|p| p.x >= 0.0 && p.x <= w && p.y >= 0.0 && p.y <= h)
    }

    /// True when neither pair of opposite edges crosses.
    pub fn is_simple(&self) -> bool {
        let [a, b, c, d] = self.0;
        !segments_cross(a, b, c, d) && !segments_cross(b, c, d, a)
    }

    /// Check bounds and simplicity against an owning image.
    pub fn validate(&self, width: u32, height: u32) -> Result<()> {
        if !self.within(width, height) {
            return Err(DocscanError::InvalidCorners(format!(
                "{:?} outside {}x{}",
                self.0, width, height
            )));
        }
        if !self.is_simple() {
            return Err(DocscanError::InvalidCorners(
                "quadrilateral is self-intersecting".into(),
            ));
        }
        Ok(())
    }

    /// Scale every coordinate by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self(self.0.map(|p| Point2D::new(p.x * factor, p.y * factor)))
    }
}

fn orientation(p: Point2D, q: Point2D, r: Point2D) -> f64 {
    (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x)
}

/// Proper crossing of segments `p1p2` and `p3p4` (shared endpoints and
/// collinear touching do not count).
fn segments_cross(p1: Point2D, p2: Point2D, p3: Point2D, p4: Point2D) -> bool {
    let d1 = orientation(p3, p4, p1);
    let d2 = orientation(p3, p4, p2);
    let d3 = orientation(p1, p2, p3);
    let d4 = orientation(p1, p2, p4);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// Where a set of detected corners came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    /// A quadrilateral was found in the edge map.
    Auto,
    /// Nothing qualified; the default inset rectangle was synthesized.
    Fallback,
}

/// Output of quadrilateral detection. Created once per captured image and
/// never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub corners: Corners,
    pub source: DetectionSource,
}

/// The four document filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Background-normalizing "magic" filter.
    Auto,
    /// Sauvola binarization.
    BlackAndWhite,
    /// Tiled equalization with whitening and sharpening.
    Grayscale,
    /// Saturation and contrast boost with background whitening.
    Color,
}

impl FilterKind {
    pub const ALL: [FilterKind; 4] = [
        FilterKind::Auto,
        FilterKind::BlackAndWhite,
        FilterKind::Grayscale,
        FilterKind::Color,
    ];

    /// Filters offered by the capture UI. `Auto` is implemented but not listed.
    pub const EXPOSED: [FilterKind; 3] = [
        FilterKind::BlackAndWhite,
        FilterKind::Grayscale,
        FilterKind::Color,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Auto => "auto",
            FilterKind::BlackAndWhite => "bw",
            FilterKind::Grayscale => "grayscale",
            FilterKind::Color => "color",
        }
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FilterKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" | "magic" => Ok(FilterKind::Auto),
            "bw" | "black-and-white" | "black_and_white" => Ok(FilterKind::BlackAndWhite),
            "grayscale" | "gray" | "grey" => Ok(FilterKind::Grayscale),
            "color" | "colour" => Ok(FilterKind::Color),
            other => Err(format!("unknown filter kind: {other}")),
        }
    }
}

/// Quarter-turn rotation applied in the crop session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Advance by 90 degrees, wrapping at 360.
    pub fn next(&self) -> Self {
        match self {
            Rotation::Deg0 => Rotation::Deg90,
            Rotation::Deg90 => Rotation::Deg180,
            Rotation::Deg180 => Rotation::Deg270,
            Rotation::Deg270 => Rotation::Deg0,
        }
    }
}

/// Serializable view of a crop session, for UI bridges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropSessionSnapshot {
    pub corners: Corners,
    pub zoom: f64,
    pub rotation_degrees: u16,
    pub dragging_index: Option<usize>,
}
