// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quadrilateral search over an edge map, and the default rectangle used when
// nothing qualifies.

use docscan_core::config::DetectionConfig;
use docscan_core::{Corners, DetectionResult, DetectionSource, Point2D};
use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use tracing::{debug, info, instrument, warn};

use super::order::order_corners;

/// A 4-vertex polygon found in an edge map, with the area of the contour it
/// was approximated from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadCandidate {
    pub corners: Corners,
    pub area: f64,
}

/// Shoelace area of a closed integer contour.
fn contour_area(points: &[Point<i32>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice = 0.0f64;
    for i in 0..n {
        let j = (i + 1) % n;
        twice += points[i].x as f64 * points[j].y as f64 - points[j].x as f64 * points[i].y as f64;
    }
    twice.abs() / 2.0
}

/// Index of the contour point farthest from `from`.
fn farthest_from(points: &[Point<i32>], from: Point<i32>) -> usize {
    let mut best = (0, -1i64);
    for (i, p) in points.iter().enumerate() {
        let (dx, dy) = ((p.x - from.x) as i64, (p.y - from.y) as i64);
        let d = dx * dx + dy * dy;
        if d > best.1 {
            best = (i, d);
        }
    }
    best.0
}

/// Douglas-Peucker on a closed contour, returning indices into `points` in
/// traversal order.
///
/// The curve is split at two extreme points (the point farthest from the
/// trace start, and the point farthest from that) and each half is simplified
/// as an open polyline. Both split points are hull vertices, so the arbitrary
/// raster-scan start of the trace never becomes a forced vertex.
fn approximate(points: &[Point<i32>], epsilon: f64) -> Vec<usize> {
    let n = points.len();
    if n < 3 {
        return (0..n).collect();
    }
    let epsilon = epsilon.max(1e-6);

    let first = farthest_from(points, points[0]);
    let ring: Vec<Point<i32>> = points[first..].iter().chain(&points[..first]).copied().collect();
    let split = farthest_from(&ring, ring[0]);
    if split == 0 {
        return vec![first];
    }

    let mut closing = ring[split..].to_vec();
    closing.push(ring[0]);

    let mut vertices = approximate_polygon_dp(&ring[..=split], epsilon, false);
    vertices.pop();
    let mut back = approximate_polygon_dp(&closing, epsilon, false);
    back.pop();
    vertices.extend(back);

    // Map simplified points back to ring positions; DP output is in order.
    let mut indices = Vec::with_capacity(vertices.len());
    let mut cursor = 0;
    for v in vertices {
        if let Some(offset) = ring[cursor..].iter().position(|p| *p == v) {
            cursor += offset;
            indices.push((cursor + first) % n);
        }
    }
    indices
}

/// Move each of four vertices to the contour point farthest from the chord
/// joining its neighbours.
///
/// The arc between two neighbouring vertices holds exactly the two edges that
/// meet at the corner, so the farthest point is the corner itself rather than
/// whichever pixel of a flat run the simplification happened to keep.
fn refine_vertices(points: &[Point<i32>], mut indices: [usize; 4]) -> [usize; 4] {
    let n = points.len();
    for _ in 0..2 {
        for i in 0..4 {
            let prev = indices[(i + 3) % 4];
            let next = indices[(i + 1) % 4];
            let (a, b) = (points[prev], points[next]);
            let (ex, ey) = ((b.x - a.x) as i64, (b.y - a.y) as i64);
            if ex == 0 && ey == 0 {
                continue;
            }
            let span = (next + n - prev) % n;
            let mut best = (indices[i], -1i64);
            for step in 1..span {
                let k = (prev + step) % n;
                let p = points[k];
                let cross = (ex * (p.y - a.y) as i64 - ey * (p.x - a.x) as i64).abs();
                if cross > best.1 {
                    best = (k, cross);
                }
            }
            indices[i] = best.0;
        }
    }
    indices
}

fn to_corner_points(points: &[Point<i32>], indices: &[usize]) -> Option<[Point2D; 4]> {
    let indices: [usize; 4] = indices.try_into().ok()?;
    let refined = refine_vertices(points, indices);
    Some(refined.map(|i| Point2D::new(points[i].x as f64, points[i].y as f64)))
}

/// Extract every 4-vertex candidate from an edge map.
///
/// Only outer borders are traced. Contours enclosing less than
/// `min_area_ratio` of the image are dropped. The rest are approximated with
/// `loose_epsilon * perimeter`; 5-8 vertex results are retried with
/// `strict_epsilon * perimeter`. Candidates come out corner-ordered and are
/// kept only when they form a simple quadrilateral.
#[instrument(skip(edges, config), fields(width = edges.width(), height = edges.height()))]
pub fn find_candidates(edges: &GrayImage, config: &DetectionConfig) -> Vec<QuadCandidate> {
    let (width, height) = edges.dimensions();
    let min_area = width as f64 * height as f64 * config.min_area_ratio;

    let contours = find_contours::<i32>(edges);
    debug!(contours = contours.len(), min_area, "Contours traced");

    let mut candidates = Vec::new();
    for contour in contours.iter().filter(|c| c.border_type == BorderType::Outer) {
        let area = contour_area(&contour.points);
        if area < min_area {
            continue;
        }

        let perimeter = arc_length(&contour.points, true);
        let mut approx = approximate(&contour.points, config.loose_epsilon * perimeter);
        if (5..=8).contains(&approx.len()) {
            approx = approximate(&contour.points, config.strict_epsilon * perimeter);
        }

        let Some(points) = to_corner_points(&contour.points, &approx) else {
            debug!(vertices = approx.len(), area, "Contour is not a quadrilateral");
            continue;
        };

        let corners = order_corners(points);
        if !corners.is_simple() {
            debug!(?corners, "Ordered quadrilateral self-intersects; skipping");
            continue;
        }
        candidates.push(QuadCandidate { corners, area });
    }

    debug!(candidates = candidates.len(), "Quadrilateral candidates found");
    candidates
}

/// The default rectangle, inset by `inset` of the width/height on every side.
pub fn fallback_corners(width: u32, height: u32, inset: f64) -> Corners {
    let (w, h) = (width as f64, height as f64);
    let (dx, dy) = (w * inset, h * inset);
    Corners::rectangle(dx, dy, w - dx, h - dy)
}

/// Chooses the document quadrilateral among candidates.
#[derive(Debug, Clone)]
pub struct QuadrilateralFinder {
    config: DetectionConfig,
}

impl QuadrilateralFinder {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Pick the largest qualifying candidate for a `width x height` image,
    /// or synthesize the fallback rectangle. Always yields four in-bounds,
    /// canonically ordered corners.
    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    pub fn select(&self, candidates: &[QuadCandidate], width: u32, height: u32) -> DetectionResult {
        let min_area = width as f64 * height as f64 * self.config.min_area_ratio;

        let best = candidates
            .iter()
            .filter(|c| c.area >= min_area && c.area.is_finite())
            .map(|c| QuadCandidate {
                corners: clamp_corners(&c.corners, width, height),
                area: c.area,
            })
            .filter(|c| c.corners.is_simple() && c.corners.area() > 0.0)
            .max_by(|a, b| a.area.total_cmp(&b.area));

        match best {
            Some(candidate) => {
                info!(area = candidate.area, corners = ?candidate.corners, "Document quadrilateral detected");
                DetectionResult {
                    corners: candidate.corners,
                    source: DetectionSource::Auto,
                }
            }
            None => self.fallback(width, height),
        }
    }

    /// Default inset rectangle, tagged as a fallback.
    pub fn fallback(&self, width: u32, height: u32) -> DetectionResult {
        let corners = fallback_corners(width, height, self.config.fallback_inset);
        warn!(width, height, "No document quadrilateral found; using default rectangle");
        DetectionResult {
            corners,
            source: DetectionSource::Fallback,
        }
    }

    /// Full search on an edge map: candidates, then selection.
    pub fn find(&self, edges: &GrayImage) -> DetectionResult {
        let candidates = find_candidates(edges, &self.config);
        self.select(&candidates, edges.width(), edges.height())
    }
}

impl Default for QuadrilateralFinder {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}

fn clamp_corners(corners: &Corners, width: u32, height: u32) -> Corners {
    let (w, h) = (width as f64, height as f64);
    Corners::new(
        corners
            .points()
            .map(|p| Point2D::new(p.x.clamp(0.0, w), p.y.clamp(0.0, h))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_hollow_polygon_mut;

    fn outline(width: u32, height: u32, poly: &[(f32, f32)]) -> GrayImage {
        let mut img = GrayImage::new(width, height);
        let points: Vec<imageproc::point::Point<f32>> =
            poly.iter().map(|&(x, y)| imageproc::point::Point::new(x, y)).collect();
        draw_hollow_polygon_mut(&mut img, &points, Luma([255u8]));
        img
    }

    #[test]
    fn fallback_is_five_percent_inset() {
        let c = fallback_corners(800, 600, 0.05);
        assert_eq!(c, Corners::rectangle(40.0, 30.0, 760.0, 570.0));
    }

    #[test]
    fn empty_edge_map_falls_back() {
        let result = QuadrilateralFinder::default().find(&GrayImage::new(200, 100));
        assert_eq!(result.source, DetectionSource::Fallback);
        assert_eq!(result.corners, Corners::rectangle(10.0, 5.0, 190.0, 95.0));
    }

    #[test]
    fn drawn_quadrilateral_is_found() {
        let quad = [(50.0, 40.0), (260.0, 55.0), (250.0, 190.0), (45.0, 170.0)];
        let edges = outline(300, 220, &quad);
        let result = QuadrilateralFinder::default().find(&edges);

        assert_eq!(result.source, DetectionSource::Auto);
        for (found, expected) in result.corners.points().iter().zip(quad) {
            assert!(
                (found.x - expected.0 as f64).abs() <= 3.0 && (found.y - expected.1 as f64).abs() <= 3.0,
                "found {:?}, expected {:?}",
                found,
                expected
            );
        }
    }

    /// Page outline with a one-pixel bump on the top edge, so the contour
    /// trace starts partway along that edge instead of at a corner.
    fn bumped_page() -> GrayImage {
        let mut img = outline(320, 240, &[(60.0, 40.0), (259.0, 40.0), (259.0, 199.0), (60.0, 199.0)]);
        img.put_pixel(76, 39, Luma([255u8]));
        img
    }

    #[test]
    fn trace_start_is_not_forced_into_the_polygon() {
        let edges = bumped_page();
        let contour = find_contours::<i32>(&edges)
            .into_iter()
            .find(|c| c.border_type == BorderType::Outer)
            .unwrap();
        assert_eq!(contour.points[0], Point::new(76, 39));

        let perimeter = arc_length(&contour.points, true);
        let vertices: Vec<Point<i32>> = approximate(&contour.points, 0.03 * perimeter)
            .into_iter()
            .map(|i| contour.points[i])
            .collect();
        assert_eq!(vertices.len(), 4, "{vertices:?}");
        assert!(!vertices.contains(&Point::new(76, 39)), "{vertices:?}");
    }

    #[test]
    fn bumped_page_corners_are_found() {
        let result = QuadrilateralFinder::default().find(&bumped_page());
        assert_eq!(result.source, DetectionSource::Auto);
        let expected = [(60.0, 40.0), (259.0, 40.0), (259.0, 199.0), (60.0, 199.0)];
        for (found, (x, y)) in result.corners.points().iter().zip(expected) {
            assert!(
                (found.x - x).abs() <= 1.0 && (found.y - y).abs() <= 1.0,
                "found {found:?}, expected ({x}, {y})"
            );
        }
    }

    #[test]
    fn candidate_at_exactly_the_minimum_area_is_kept() {
        // 10% of 100x100.
        let candidate = QuadCandidate {
            corners: Corners::rectangle(0.0, 0.0, 50.0, 20.0),
            area: 1000.0,
        };
        let result = QuadrilateralFinder::default().select(&[candidate], 100, 100);
        assert_eq!(result.source, DetectionSource::Auto);
        assert_eq!(result.corners, candidate.corners);
    }

    #[test]
    fn small_quadrilateral_is_ignored() {
        // About 2% of the frame.
        let edges = outline(300, 200, &[(10.0, 10.0), (40.0, 10.0), (40.0, 30.0), (10.0, 30.0)]);
        let result = QuadrilateralFinder::default().find(&edges);
        assert_eq!(result.source, DetectionSource::Fallback);
    }

    #[test]
    fn pentagon_is_not_a_candidate() {
        let edges = outline(
            300,
            300,
            &[(150.0, 20.0), (280.0, 120.0), (230.0, 280.0), (70.0, 280.0), (20.0, 120.0)],
        );
        let candidates = find_candidates(&edges, &DetectionConfig::default());
        assert!(candidates.is_empty(), "{candidates:?}");
    }

    #[test]
    fn largest_candidate_wins() {
        let small = QuadCandidate {
            corners: Corners::rectangle(10.0, 10.0, 60.0, 60.0),
            area: 2500.0,
        };
        let large = QuadCandidate {
            corners: Corners::rectangle(5.0, 5.0, 95.0, 95.0),
            area: 8100.0,
        };
        let result = QuadrilateralFinder::default().select(&[small, large], 100, 100);
        assert_eq!(result.source, DetectionSource::Auto);
        assert_eq!(result.corners, large.corners);
    }

    #[test]
    fn out_of_bounds_candidate_is_clamped() {
        let candidate = QuadCandidate {
            corners: Corners::rectangle(-5.0, 2.0, 120.0, 90.0),
            area: 9000.0,
        };
        let result = QuadrilateralFinder::default().select(&[candidate], 100, 100);
        assert!(result.corners.within(100, 100));
    }
}
