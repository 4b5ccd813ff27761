// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Card detector: runs every stage on a downscaled working copy, maps the
// winning quadrilateral back to the original resolution, and rectifies it.

use std::borrow::Cow;

use cardscan_core::config::{ChannelOrder, DetectConfig};
use cardscan_core::error::{CardScanError, Result};
use cardscan_core::types::OrderedQuad;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use tracing::{debug, info, instrument, warn};

use crate::candidates::build_candidates;
use crate::lines::extract_lines;
use crate::order::try_order_points;
use crate::preprocess::preprocess;
use crate::quad::{QuadSource, find_quadrilateral, full_frame};
use crate::rectify::rectify;

/// Result of one detection run.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Rectified RGB image. When `accepted` is false this is the whole frame.
    pub image: RgbImage,
    /// Whether a plausible card outline was found.
    pub accepted: bool,
    /// Corners in original-image coordinates.
    pub quad: OrderedQuad,
    pub source: QuadSource,
}

/// Finds a card-shaped quadrilateral in a photo and rectifies it.
///
/// Holds nothing but its validated configuration, so one detector can be
/// shared across threads.
#[derive(Debug, Clone)]
pub struct CardDetector {
    config: DetectConfig,
}

impl Default for CardDetector {
    fn default() -> Self {
        Self {
            config: DetectConfig::default(),
        }
    }
}

impl CardDetector {
    // -- Construction ---------------------------------------------------------

    /// Create a detector, rejecting configurations the pipeline cannot run.
    pub fn new(config: DetectConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    // -- Detection ------------------------------------------------------------

    /// Convenience wrapper for decoded images of any pixel layout.
    pub fn detect_dynamic(&self, image: &DynamicImage) -> Result<Detection> {
        self.detect(&image.to_rgb8())
    }

    /// Run the full pipeline on `image`.
    ///
    /// ## Pipeline
    ///
    /// 1. Swap channels if the buffer is declared BGR
    /// 2. Resize to the working height (aspect ratio kept)
    /// 3. Edge map, line canvases, corner candidates
    /// 4. Quadrilateral search (candidates and edge contours)
    /// 5. Scale the winner back by the resize ratio and order its corners
    /// 6. Rectify the original-resolution image
    ///
    /// A missing card is not an error: the result has `accepted = false` and
    /// the full frame rectified.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect(&self, image: &RgbImage) -> Result<Detection> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CardScanError::InvalidImage(format!(
                "image has no pixels ({width}x{height})"
            )));
        }

        let original: Cow<'_, RgbImage> = match self.config.channel_order {
            ChannelOrder::Rgb => Cow::Borrowed(image),
            ChannelOrder::Bgr => Cow::Owned(swap_red_blue(image)),
        };

        let (working, ratio) = self.working_copy(&original);
        debug!(
            working_w = working.width(),
            working_h = working.height(),
            ratio,
            "Working copy prepared"
        );

        let edges = preprocess(&working, &self.config.preprocess)?;
        let canvases = extract_lines(&edges, &self.config.lines);
        let candidates = build_candidates(&canvases, &self.config.candidates);
        let found = find_quadrilateral(&candidates, &edges, &self.config.search);

        let corners = if found.accepted {
            found.quad.scaled(ratio)
        } else {
            warn!("No card outline found; rectifying the full frame");
            full_frame(width, height)
        };
        let quad = try_order_points(corners.corners)?;
        let rectified = rectify(&original, &quad)?;

        info!(
            accepted = found.accepted,
            source = ?found.source,
            out_w = rectified.width(),
            out_h = rectified.height(),
            "Card detection complete"
        );
        Ok(Detection {
            image: rectified,
            accepted: found.accepted,
            quad,
            source: found.source,
        })
    }

    /// Resize so the height equals the working height; the width is scaled by
    /// the same ratio and truncated. Returns the copy and original/working
    /// ratio.
    fn working_copy<'a>(&self, image: &'a RgbImage) -> (Cow<'a, RgbImage>, f64) {
        let Some(target_h) = self.config.working_height else {
            return (Cow::Borrowed(image), 1.0);
        };
        let (width, height) = image.dimensions();
        if target_h == height {
            return (Cow::Borrowed(image), 1.0);
        }

        let ratio = height as f64 / target_h as f64;
        let target_w = ((width as f64 / ratio) as u32).max(1);
        let resized = imageops::resize(image, target_w, target_h, FilterType::Triangle);
        (Cow::Owned(resized), ratio)
    }
}

fn swap_red_blue(image: &RgbImage) -> RgbImage {
    let mut swapped = image.clone();
    for pixel in swapped.pixels_mut() {
        pixel.0.swap(0, 2);
    }
    swapped
}
