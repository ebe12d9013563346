// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Docscan.
//
// Only hard failures live here. Detection, geometry, and filter degradation
// are reported through values (fallback corners, pass-through outcomes) and
// never surface as an `Err`.

use thiserror::Error;

/// Top-level error type for all Docscan operations.
#[derive(Debug, Error)]
pub enum DocscanError {
    // -- Raster boundary --
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("invalid raster dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    // -- Geometry / session --
    #[error("invalid corners: {0}")]
    InvalidCorners(String),

    #[error("crop session already closed")]
    SessionClosed,

    // -- Execution --
    #[error("scan cancelled")]
    Cancelled,

    #[error("document detector unavailable: {0}")]
    DetectorUnavailable(String),

    #[error("background task failed: {0}")]
    BackgroundTask(String),

    // -- Storage / serialization --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocscanError>;
