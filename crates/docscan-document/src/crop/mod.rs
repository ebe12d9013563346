// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Manual crop refinement: session state machine, display projection, and
// preview compositor.

pub mod preview;
pub mod projection;
pub mod session;

pub use preview::{PreviewOptions, render_preview};
pub use projection::{DisplayPoint, DisplayProjection, Viewport, rotate_point_ccw, rotate_point_cw};
pub use session::{CommittedCrop, CropSession};
