// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for cardscan.

use thiserror::Error;

/// Top-level error type for all cardscan operations.
///
/// A failed detection is *not* an error: it is reported through
/// `accepted = false` on the detection result. Everything here is fatal for
/// the current image only.
#[derive(Debug, Error)]
pub enum CardScanError {
    // -- Precondition violations --
    #[error("invalid input image: {0}")]
    InvalidImage(String),

    #[error("degenerate quadrilateral: {0}")]
    DegenerateQuad(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -- Rectification --
    #[error("rectification failed: {0}")]
    Rectification(String),

    // -- Front end (decode / encode / files) --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CardScanError>;

/// How a caller processing a batch of images should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input for this image (empty buffer, degenerate corners, bad
    /// config). Skip the image and report it.
    Precondition,
    /// The quadrilateral was found but could not be warped. Skip and report.
    Rectification,
    /// Decoding, encoding, or file system trouble outside the detector.
    Environment,
}

/// Classify a `CardScanError` for batch-level reporting.
pub fn classify_error(err: &CardScanError) -> ErrorClass {
    match err {
        CardScanError::InvalidImage(_)
        | CardScanError::DegenerateQuad(_)
        | CardScanError::InvalidConfig(_) => ErrorClass::Precondition,
        CardScanError::Rectification(_) => ErrorClass::Rectification,
        CardScanError::ImageError(_)
        | CardScanError::Io(_)
        | CardScanError::Serialization(_) => ErrorClass::Environment,
    }
}
