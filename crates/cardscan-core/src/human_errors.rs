// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the command-line front end.
//
// Every technical error is mapped to a plain sentence with a clear suggestion.

use crate::error::{CardScanError, ErrorClass, classify_error};

/// A human-readable error with a plain message and an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// One-line summary.
    pub message: String,
    /// What the user should try next.
    pub suggestion: String,
    /// Batch handling class of the underlying error.
    pub class: ErrorClass,
}

/// Convert a `CardScanError` into a `HumanError`.
pub fn humanize_error(err: &CardScanError) -> HumanError {
    let class = classify_error(err);
    let (message, suggestion) = match err {
        CardScanError::InvalidImage(_) => (
            "The picture is empty or could not be read as a photo.",
            "Check that the file is a real photo with some width and height.",
        ),
        CardScanError::DegenerateQuad(_) => (
            "The card corners collapsed onto each other.",
            "Retake the photo so the whole card is visible and not edge-on.",
        ),
        CardScanError::InvalidConfig(_) => (
            "The detector settings are out of range.",
            "Fix the value named in the details, or remove it to use the default.",
        ),
        CardScanError::Rectification(_) => (
            "The card was found but could not be straightened.",
            "Try a photo taken more directly from above the card.",
        ),
        CardScanError::ImageError(_) => (
            "The picture could not be decoded or saved.",
            "Use a common format such as JPEG or PNG.",
        ),
        CardScanError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => (
                "The file or folder does not exist.",
                "Check the path and try again.",
            ),
            std::io::ErrorKind::PermissionDenied => (
                "Permission was denied while reading or writing a file.",
                "Choose a folder you are allowed to write to.",
            ),
            _ => (
                "A file could not be read or written.",
                "Check free disk space and the path, then try again.",
            ),
        },
        CardScanError::Serialization(_) => (
            "The settings file is not valid JSON.",
            "Fix the syntax error reported in the details.",
        ),
    };

    HumanError {
        message: message.into(),
        suggestion: suggestion.into(),
        class,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_gets_path_hint() {
        let err = CardScanError::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        let human = humanize_error(&err);
        assert!(human.suggestion.contains("path"));
        assert_eq!(human.class, ErrorClass::Environment);
    }

    #[test]
    fn rectification_keeps_class() {
        let human = humanize_error(&CardScanError::Rectification("0x0".into()));
        assert_eq!(human.class, ErrorClass::Rectification);
        assert!(!human.message.is_empty());
    }
}
