// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Canonical corner ordering.

use docscan_core::{Corners, Point2D};

/// Reorder four points into top-left, top-right, bottom-right, bottom-left.
///
/// Top-left minimizes `x + y`, bottom-right maximizes it, top-right minimizes
/// `y - x`, bottom-left maximizes it. Ties resolve to the lowest input index,
/// so the result is deterministic.
///
/// When the sum/difference heuristic assigns one point to two roles (possible
/// for strongly rotated quads), the points are instead sorted clockwise around
/// their centroid starting from the minimal `x + y` point.
pub fn order_corners(points: [Point2D; 4]) -> Corners {
    let sum = |p: &Point2D| p.x + p.y;
    let diff = |p: &Point2D| p.y - p.x;

    let tl = arg_by(&points, sum, false);
    let br = arg_by(&points, sum, true);
    let tr = arg_by(&points, diff, false);
    let bl = arg_by(&points, diff, true);

    let mut roles = [tl, tr, br, bl];
    roles.sort_unstable();
    let distinct = roles.windows(2).all(|w| w[0] != w[1]);

    if distinct {
        Corners::new([points[tl], points[tr], points[br], points[bl]])
    } else {
        order_by_angle(points)
    }
}

/// Index of the point minimizing (or maximizing) `key`; first wins on ties.
fn arg_by(points: &[Point2D; 4], key: impl Fn(&Point2D) -> f64, max: bool) -> usize {
    let mut best = 0;
    for i in 1..4 {
        let better = if max {
            key(&points[i]) > key(&points[best])
        } else {
            key(&points[i]) < key(&points[best])
        };
        if better {
            best = i;
        }
    }
    best
}

fn order_by_angle(points: [Point2D; 4]) -> Corners {
    let cx = points.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / 4.0;

    let mut sorted = points;
    // Image y grows downward, so increasing atan2 is clockwise on screen.
    sorted.sort_by(|a, b| {
        let ta = (a.y - cy).atan2(a.x - cx);
        let tb = (b.y - cy).atan2(b.x - cx);
        ta.total_cmp(&tb)
    });

    let start = arg_by(&sorted, |p| p.x + p.y, false);
    Corners::new(std::array::from_fn(|i| sorted[(start + i) % 4]))
}
