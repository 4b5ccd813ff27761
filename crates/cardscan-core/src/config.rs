// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Detector configuration. One section per pipeline stage; every stage receives
// only its own section.

use serde::{Deserialize, Serialize};

use crate::error::{CardScanError, Result};

/// Channel layout of the caller's input buffer.
///
/// Output images are always RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// Complete set of tunables for one detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Height the image is resized to before detection (default 500).
    /// `None` runs detection at the native resolution.
    pub working_height: Option<u32>,
    /// Channel order of the input buffer.
    pub channel_order: ChannelOrder,
    pub preprocess: PreprocessConfig,
    pub lines: LineConfig,
    pub candidates: CandidateConfig,
    pub search: SearchConfig,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            working_height: Some(500),
            channel_order: ChannelOrder::Rgb,
            preprocess: PreprocessConfig::default(),
            lines: LineConfig::default(),
            candidates: CandidateConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

/// Blur, closing, and Canny settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Side of the square Gaussian kernel. Must be odd.
    pub blur_kernel: u32,
    /// Side of the square closing element.
    pub morph_kernel: u32,
    /// Canny lower threshold (exclusive).
    pub canny_low: f32,
    /// Canny upper threshold.
    pub canny_high: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 7,
            morph_kernel: 9,
            canny_low: 0.0,
            canny_high: 84.0,
        }
    }
}

/// Region-growing segment detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Minimum Sobel magnitude for a pixel to join a region.
    pub magnitude_threshold: f32,
    /// Orientation tolerance around the seed, in degrees.
    pub angle_tolerance_deg: f32,
    /// Minimum segment length in pixels.
    pub min_length: f32,
    /// Fraction of region pixels that must lie within half the tolerance.
    pub min_aligned_fraction: f32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            magnitude_threshold: 200.0,
            angle_tolerance_deg: 22.5,
            min_length: 10.0,
            min_aligned_fraction: 0.6,
        }
    }
}

/// Line canvas rasterization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    pub segments: SegmentConfig,
    /// Pixels added at both ends of every drawn segment to bridge gaps.
    pub extension: i32,
    /// Stroke width on the horizontal / vertical canvases.
    pub thickness: u32,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            segments: SegmentConfig::default(),
            extension: 5,
            thickness: 2,
        }
    }
}

/// Corner candidate construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateConfig {
    /// Contours kept per canvas, longest perimeter first.
    pub lines_per_orientation: usize,
    /// Distance the contour extremes are pulled inward before sampling the
    /// endpoint.
    pub endpoint_inset: i32,
    /// Minimum distance between two retained candidates.
    pub min_distance: f64,
    /// Upper bound on retained candidates.
    pub max_candidates: usize,
    /// Factor applied to `min_distance` while the cap is exceeded.
    pub distance_growth: f64,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            lines_per_orientation: 2,
            endpoint_inset: 2,
            min_distance: 20.0,
            max_candidates: 16,
            distance_growth: 1.5,
        }
    }
}

/// Quadrilateral validity and selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Minimum quad area as a fraction of the working image area.
    pub min_area_ratio: f64,
    /// Maximum spread of interior angles, in degrees.
    pub max_angle_range: f64,
    /// Largest-area subsets kept before the angle tie-break.
    pub area_shortlist: usize,
    /// Largest edge-map contours tried by the contour detector.
    pub contour_shortlist: usize,
    /// Polygon simplification tolerance for edge-map contours.
    pub contour_epsilon: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_area_ratio: 0.25,
            max_angle_range: 40.0,
            area_shortlist: 5,
            contour_shortlist: 5,
            contour_epsilon: 80.0,
        }
    }
}

impl DetectConfig {
    /// Parse a (possibly partial) JSON document. Missing fields keep their
    /// defaults. The result is validated.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.working_height == Some(0) {
            return Err(invalid("working_height must be positive"));
        }

        let pre = &self.preprocess;
        if pre.blur_kernel == 0 || pre.blur_kernel % 2 == 0 {
            return Err(invalid(format!(
                "blur_kernel must be odd, got {}",
                pre.blur_kernel
            )));
        }
        if pre.morph_kernel == 0 || pre.morph_kernel > 511 {
            return Err(invalid(format!(
                "morph_kernel must be in 1..=511, got {}",
                pre.morph_kernel
            )));
        }
        if !(pre.canny_low >= 0.0 && pre.canny_high > pre.canny_low) {
            return Err(invalid(format!(
                "canny thresholds must satisfy 0 <= low < high, got {} / {}",
                pre.canny_low, pre.canny_high
            )));
        }

        let seg = &self.lines.segments;
        if !(seg.magnitude_threshold > 0.0) {
            return Err(invalid("segments.magnitude_threshold must be positive"));
        }
        if !(seg.angle_tolerance_deg > 0.0 && seg.angle_tolerance_deg < 90.0) {
            return Err(invalid("segments.angle_tolerance_deg must be in (0, 90)"));
        }
        if !(0.0..=1.0).contains(&seg.min_aligned_fraction) {
            return Err(invalid("segments.min_aligned_fraction must be in [0, 1]"));
        }
        if self.lines.extension < 0 || self.lines.thickness == 0 {
            return Err(invalid("lines.extension must be >= 0 and thickness >= 1"));
        }

        let cand = &self.candidates;
        if cand.lines_per_orientation == 0 || cand.endpoint_inset < 0 {
            return Err(invalid(
                "candidates.lines_per_orientation must be >= 1 and endpoint_inset >= 0",
            ));
        }
        if !(cand.min_distance > 0.0) {
            return Err(invalid("candidates.min_distance must be positive"));
        }
        if cand.max_candidates < 4 {
            return Err(invalid(format!(
                "candidates.max_candidates must be at least 4, got {}",
                cand.max_candidates
            )));
        }
        if !(cand.distance_growth > 1.0) {
            return Err(invalid("candidates.distance_growth must be greater than 1"));
        }

        let search = &self.search;
        if !(search.min_area_ratio > 0.0 && search.min_area_ratio <= 1.0) {
            return Err(invalid(format!(
                "search.min_area_ratio must be in (0, 1], got {}",
                search.min_area_ratio
            )));
        }
        if !(search.max_angle_range > 0.0) {
            return Err(invalid("search.max_angle_range must be positive"));
        }
        if search.area_shortlist == 0 || search.contour_shortlist == 0 {
            return Err(invalid("search shortlists must be at least 1"));
        }
        if !(search.contour_epsilon > 0.0) {
            return Err(invalid("search.contour_epsilon must be positive"));
        }

        Ok(())
    }
}

fn invalid(detail: impl Into<String>) -> CardScanError {
    CardScanError::InvalidConfig(detail.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DetectConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.working_height, Some(500));
        assert_eq!(config.preprocess.morph_kernel, 9);
        assert_eq!(config.preprocess.canny_high, 84.0);
        assert_eq!(config.candidates.endpoint_inset, 2);
        assert_eq!(config.candidates.min_distance, 20.0);
        assert_eq!(config.search.min_area_ratio, 0.25);
        assert_eq!(config.search.max_angle_range, 40.0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = DetectConfig::from_json(
            r#"{ "channel_order": "bgr", "search": { "max_angle_range": 30.0 } }"#,
        )
        .unwrap();
        assert_eq!(config.channel_order, ChannelOrder::Bgr);
        assert_eq!(config.search.max_angle_range, 30.0);
        assert_eq!(config.search.contour_epsilon, 80.0);
        assert_eq!(config.preprocess, PreprocessConfig::default());
    }

    #[test]
    fn null_working_height_disables_resize() {
        let config = DetectConfig::from_json(r#"{ "working_height": null }"#).unwrap();
        assert_eq!(config.working_height, None);
    }

    #[test]
    fn even_blur_kernel_rejected() {
        let mut config = DetectConfig::default();
        config.preprocess.blur_kernel = 6;
        assert!(matches!(
            config.validate(),
            Err(CardScanError::InvalidConfig(_))
        ));
    }

    #[test]
    fn small_candidate_cap_rejected() {
        let err = DetectConfig::from_json(r#"{ "candidates": { "max_candidates": 3 } }"#)
            .unwrap_err();
        assert!(err.to_string().contains("max_candidates"));
    }

    #[test]
    fn malformed_json_is_serialization_error() {
        let err = DetectConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, CardScanError::Serialization(_)));
    }
}
