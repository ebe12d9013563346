// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Masked crop preview: the image letterboxed into the viewport, everything
// outside the working quadrilateral darkened, the outline and four handles
// drawn on top.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use tracing::instrument;

use super::projection::DisplayPoint;
use super::session::CropSession;
use crate::raster::RasterImage;

/// Rendering knobs for [`render_preview`].
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewOptions {
    /// Multiplier for pixels outside the quadrilateral.
    pub mask_factor: f32,
    pub background: Rgba<u8>,
    pub outline: Rgba<u8>,
    pub handle_fill: Rgba<u8>,
    pub handle_radius: i32,
    /// Rule-of-thirds guides inside the quadrilateral.
    pub show_grid: bool,
    pub grid: Rgba<u8>,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            mask_factor: 0.3,
            background: Rgba([0, 0, 0, 255]),
            outline: Rgba([59, 130, 246, 255]),
            handle_fill: Rgba([255, 255, 255, 255]),
            handle_radius: 10,
            show_grid: false,
            grid: Rgba([255, 255, 255, 160]),
        }
    }
}

/// Even-odd point-in-polygon test.
fn contains(poly: &[DisplayPoint; 4], p: DisplayPoint) -> bool {
    let mut inside = false;
    let mut j = poly.len() - 1;
    for i in 0..poly.len() {
        let (a, b) = (poly[i], poly[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn lerp(a: DisplayPoint, b: DisplayPoint, t: f64) -> DisplayPoint {
    DisplayPoint::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

fn as_f32(p: DisplayPoint) -> (f32, f32) {
    (p.x as f32, p.y as f32)
}

/// Render the session's current view of `image` onto a viewport-sized canvas.
///
/// Handle and outline positions come from [`CropSession::display_corners`],
/// the same mapping used by [`CropSession::hit_test`].
#[instrument(skip_all, fields(rotation = session.rotation().degrees(), zoom = session.zoom_level()))]
pub fn render_preview(image: &RasterImage, session: &CropSession, options: &PreviewOptions) -> RgbaImage {
    let viewport = session.viewport();
    let proj = session.projection();
    let quad = session.display_corners();
    let src = image.as_rgba();
    let (sw, sh) = (src.width() as f64, src.height() as f64);
    let mask = options.mask_factor.clamp(0.0, 1.0);

    let mut canvas = RgbaImage::from_fn(viewport.width, viewport.height, |x, y| {
        let d = DisplayPoint::new(x as f64 + 0.5, y as f64 + 0.5);
        let s = proj.to_source(proj.to_image(d));
        if s.x < 0.0 || s.y < 0.0 || s.x >= sw || s.y >= sh {
            return options.background;
        }
        let px = *src.get_pixel(s.x as u32, s.y as u32);
        if contains(&quad, d) {
            px
        } else {
            let [r, g, b, a] = px.0;
            let dim = |c: u8| (c as f32 * mask).round() as u8;
            Rgba([dim(r), dim(g), dim(b), a])
        }
    });

    if options.show_grid {
        let [tl, tr, br, bl] = quad;
        for t in [1.0 / 3.0, 2.0 / 3.0] {
            draw_line_segment_mut(&mut canvas, as_f32(lerp(tl, tr, t)), as_f32(lerp(bl, br, t)), options.grid);
            draw_line_segment_mut(&mut canvas, as_f32(lerp(tl, bl, t)), as_f32(lerp(tr, br, t)), options.grid);
        }
    }

    for i in 0..4 {
        draw_line_segment_mut(&mut canvas, as_f32(quad[i]), as_f32(quad[(i + 1) % 4]), options.outline);
    }
    for (i, p) in quad.iter().enumerate() {
        let center = (p.x.round() as i32, p.y.round() as i32);
        let active = session.dragging_index() == Some(i);
        let radius = if active { options.handle_radius + 4 } else { options.handle_radius };
        draw_filled_circle_mut(&mut canvas, center, radius, options.outline);
        draw_filled_circle_mut(&mut canvas, center, (radius - 3).max(1), options.handle_fill);
    }

    canvas
}
