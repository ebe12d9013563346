// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan filters — magic/auto, black-and-white, enhanced grayscale, and vivid
// colour, built on the shared primitives.

pub mod primitives;
pub mod variants;

use docscan_core::FilterKind;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::raster::{ProcessedImage, RasterImage};

/// Why a filter gave up. Never escapes the engine: it is logged and the
/// input is passed through instead.
#[derive(Debug, Error, PartialEq)]
pub enum FilterFailure {
    #[error("image {width}x{height} is smaller than the {min}px filter window")]
    TooSmall { width: u32, height: u32, min: u32 },

    #[error("non-finite value in {stage}")]
    NonFinite { stage: &'static str },
}

/// Smallest side length any filter accepts.
pub const MIN_FILTER_SIDE: u32 = 2;

/// Outcome of [`FilterEngine::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Filtered {
    /// The filter ran and produced a new image.
    Applied(ProcessedImage),
    /// The filter failed; the image is an unmodified copy of the input.
    PassThrough(ProcessedImage),
}

impl Filtered {
    pub fn is_applied(&self) -> bool {
        matches!(self, Filtered::Applied(_))
    }

    pub fn image(&self) -> &ProcessedImage {
        match self {
            Filtered::Applied(image) | Filtered::PassThrough(image) => image,
        }
    }

    pub fn into_image(self) -> ProcessedImage {
        match self {
            Filtered::Applied(image) | Filtered::PassThrough(image) => image,
        }
    }
}

/// Applies one of the four document filters to an already-flattened raster.
///
/// Every filter is pure: the input is only read, and the result is a fresh
/// buffer of the same size.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterEngine;

impl FilterEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run `kind` over `input`, degrading to a pass-through copy on failure.
    #[instrument(skip(self, input), fields(width = input.width(), height = input.height()))]
    pub fn apply(&self, kind: FilterKind, input: &RasterImage) -> Filtered {
        match self.try_apply(kind, input) {
            Ok(output) => {
                info!(filter = %kind, "Filter applied");
                Filtered::Applied(ProcessedImage::new(output, kind))
            }
            Err(failure) => {
                warn!(filter = %kind, error = %failure, "Filter failed; keeping unfiltered image");
                Filtered::PassThrough(ProcessedImage::new(input.clone(), kind))
            }
        }
    }

    /// Run `kind`, surfacing the failure instead of passing through.
    pub fn try_apply(&self, kind: FilterKind, input: &RasterImage) -> Result<RasterImage, FilterFailure> {
        let (width, height) = input.dimensions();
        if width < MIN_FILTER_SIDE || height < MIN_FILTER_SIDE {
            return Err(FilterFailure::TooSmall {
                width,
                height,
                min: MIN_FILTER_SIDE,
            });
        }

        let pixels = match kind {
            FilterKind::Auto => variants::magic(input)?,
            FilterKind::BlackAndWhite => variants::black_and_white(input),
            FilterKind::Grayscale => variants::enhanced_grayscale(input),
            FilterKind::Color => variants::vivid_color(input),
        };

        RasterImage::from_rgba(pixels).map_err(|_| FilterFailure::TooSmall {
            width,
            height,
            min: MIN_FILTER_SIDE,
        })
    }
}
