// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for inspectors using the document scanner.
//
// Every technical error is mapped to plain language with a clear suggestion.
// The severity level drives how the capture screen presents it.

use crate::error::DocscanError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Worth retrying as-is (background worker hiccup, interrupted write).
    Transient,
    /// The user must do something (retake the photo, re-place corners).
    ActionRequired,
    /// Cannot be fixed by retrying (corrupt file, unsupported format).
    Permanent,
}

/// A human-readable error with a plain message and an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Short summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether the caller may retry automatically.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `DocscanError` into a `HumanError`.
pub fn humanize_error(err: &DocscanError) -> HumanError {
    match err {
        DocscanError::Decode(detail) => {
            if detail.contains("format") || detail.contains("Unsupported") {
                HumanError {
                    message: "This file is not a photo we can read.".into(),
                    suggestion: "Take the picture again with the camera, or choose a JPEG or PNG image.".into(),
                    retriable: false,
                    severity: Severity::Permanent,
                }
            } else {
                HumanError {
                    message: "The photo could not be opened.".into(),
                    suggestion: "The file may be damaged. Please take the picture again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            }
        }

        DocscanError::Encode(_) => HumanError {
            message: "The scanned page could not be saved.".into(),
            suggestion: "Try again. If this keeps happening, free up some storage on the device.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        DocscanError::InvalidDimensions { .. } => HumanError {
            message: "The photo is empty.".into(),
            suggestion: "Please take the picture again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        DocscanError::InvalidCorners(_) => HumanError {
            message: "The page corners don't form a proper shape.".into(),
            suggestion: "Drag the four corner handles onto the corners of the document, without crossing them.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        DocscanError::SessionClosed => HumanError {
            message: "This crop has already been applied.".into(),
            suggestion: "Open the page again to adjust its corners.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        DocscanError::Cancelled => HumanError {
            message: "The scan was cancelled.".into(),
            suggestion: "Start a new scan when you are ready.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        DocscanError::DetectorUnavailable(_) => HumanError {
            message: "Automatic edge detection is not available.".into(),
            suggestion: "Place the four corners by hand; the rest of the scan works normally.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        DocscanError::BackgroundTask(_) => HumanError {
            message: "Processing the page was interrupted.".into(),
            suggestion: "Try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        DocscanError::Io(io) => match io.kind() {
            std::io::ErrorKind::NotFound => HumanError {
                message: "The photo file could not be found.".into(),
                suggestion: "Choose the picture again.".into(),
                retriable: false,
                severity: Severity::ActionRequired,
            },
            std::io::ErrorKind::PermissionDenied => HumanError {
                message: "The app is not allowed to read or save this file.".into(),
                suggestion: "Allow access to photos and files in the device settings.".into(),
                retriable: false,
                severity: Severity::ActionRequired,
            },
            _ => HumanError {
                message: "Reading or saving the file failed.".into(),
                suggestion: format!("Try again. (Detail: {io})"),
                retriable: true,
                severity: Severity::Transient,
            },
        },

        DocscanError::Serialization(_) => HumanError {
            message: "The scanner settings are damaged.".into(),
            suggestion: "Reset the scanner settings to their defaults.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
    }
}
