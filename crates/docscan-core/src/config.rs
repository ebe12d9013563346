// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::FilterKind;

/// All tunables for a scan, grouped by stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub detection: DetectionConfig,
    pub crop: CropConfig,
    pub compression: CompressionConfig,
    pub output: OutputConfig,
}

impl ScanConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Edge detection and quadrilateral search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Longest side of the downscaled copy used for detection.
    pub max_dimension: u32,
    /// Minimum contour area as a fraction of the image area.
    pub min_area_ratio: f64,
    /// Polygon approximation tolerance, as a fraction of the perimeter.
    pub loose_epsilon: f64,
    /// Retry tolerance for 5-8 vertex approximations.
    pub strict_epsilon: f64,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Gaussian sigma, roughly a 5x5 kernel.
    pub blur_sigma: f32,
    /// Closing radius; 2 gives a 5x5 square element.
    pub closing_radius: u8,
    /// Tiles per side for local contrast normalization.
    pub clahe_grid: u32,
    /// Clip limit relative to a uniform histogram.
    pub clahe_clip: f32,
    /// Fallback rectangle inset, as a fraction of width/height.
    pub fallback_inset: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_dimension: 800,
            min_area_ratio: 0.10,
            loose_epsilon: 0.015,
            strict_epsilon: 0.03,
            canny_low: 30.0,
            canny_high: 120.0,
            blur_sigma: 1.1,
            closing_radius: 2,
            clahe_grid: 8,
            clahe_clip: 2.0,
            fallback_inset: 0.05,
        }
    }
}

/// Interactive corner correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    /// Hit-test radius in display pixels.
    pub hit_radius: f64,
    pub zoom_min: f64,
    pub zoom_max: f64,
    pub zoom_step: f64,
    /// Drags moving less than this many image pixels on both axes are ignored.
    pub min_move: f64,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            hit_radius: 25.0,
            zoom_min: 0.5,
            zoom_max: 3.0,
            zoom_step: 0.25,
            min_move: 1.0,
        }
    }
}

/// Upload compression helper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Inputs smaller than this pass through untouched.
    pub passthrough_below_bytes: usize,
    /// Longest side after downscaling.
    pub max_dimension: u32,
    /// JPEG quality, 1-100.
    pub quality: u8,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            passthrough_below_bytes: 200 * 1024,
            max_dimension: 1600,
            quality: 80,
        }
    }
}

/// Final export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub default_filter: FilterKind,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_filter: FilterKind::Color,
            jpeg_quality: 98,
        }
    }
}
