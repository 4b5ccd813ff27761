// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preprocessing: grayscale, fixed-size Gaussian blur, grayscale closing, and
// Canny edge extraction. Produces the binary edge map every later stage reads.

use cardscan_core::config::PreprocessConfig;
use cardscan_core::error::{CardScanError, Result};
use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::separable_filter_equal;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use imageproc::morphology::{Mask, grayscale_close};
use tracing::{debug, instrument};

/// Turn an RGB image into a binary edge map (0 or 255).
///
/// ## Pipeline
///
/// 1. Convert to grayscale
/// 2. Separable Gaussian blur with a `blur_kernel`-tap kernel (7 by default)
/// 3. Grayscale morphological closing with a square element of side
///    `morph_kernel` to merge nearby fragments
/// 4. Canny edge detection on the closed image with thresholds `canny_low`
///    and `canny_high`, both exclusive (see [`canny`])
///
/// Returns `InvalidImage` when the buffer has no pixels.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn preprocess(image: &RgbImage, config: &PreprocessConfig) -> Result<GrayImage> {
    if image.width() == 0 || image.height() == 0 {
        return Err(CardScanError::InvalidImage(format!(
            "image has no pixels ({}x{})",
            image.width(),
            image.height()
        )));
    }

    let gray = image::imageops::grayscale(image);

    let kernel = gaussian_kernel(config.blur_kernel);
    let blurred: GrayImage = separable_filter_equal(&gray, &kernel);
    debug!(taps = kernel.len(), "Applied Gaussian blur");

    let radius = closing_radius(config.morph_kernel);
    let closed = grayscale_close(&blurred, &Mask::square(radius));
    debug!(radius, "Applied morphological closing");

    let edges = canny(&closed, config.canny_low.max(0.0), config.canny_high);

    debug!(
        edge_pixels = edges.pixels().filter(|p| p.0[0] > 0).count(),
        "Canny edge detection complete"
    );
    Ok(edges)
}

const TAN_22_5: f32 = 0.414_213_57;
const TAN_67_5: f32 = 2.414_213_5;

const NOT_EDGE: u8 = 0;
const WEAK: u8 = 1;
const STRONG: u8 = 2;

/// Canny edge detection on an image that is already smoothed.
///
/// 3x3 Sobel gradients with L1 magnitude `|gx| + |gy|`, non-maximum
/// suppression along one of four quantised directions, then 8-connected
/// hysteresis. A pixel is a candidate when its magnitude exceeds `low` and a
/// seed when it exceeds `high`. No extra smoothing is applied, unlike
/// `imageproc::edges::canny`.
pub(crate) fn canny(image: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (w, h) = image.dimensions();
    let (width, height) = (w as usize, h as usize);
    let gx = horizontal_sobel(image);
    let gy = vertical_sobel(image);

    let gradients: Vec<(f32, f32)> = gx
        .pixels()
        .zip(gy.pixels())
        .map(|(x, y)| (x.0[0] as f32, y.0[0] as f32))
        .collect();
    let magnitude: Vec<f32> = gradients.iter().map(|(dx, dy)| dx.abs() + dy.abs()).collect();

    let at = |x: usize, y: usize, (ox, oy): (isize, isize)| -> f32 {
        let (xn, yn) = (x as isize + ox, y as isize + oy);
        if xn < 0 || yn < 0 || xn >= width as isize || yn >= height as isize {
            0.0
        } else {
            magnitude[yn as usize * width + xn as usize]
        }
    };

    let mut state = vec![NOT_EDGE; magnitude.len()];
    let mut stack = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let m = magnitude[i];
            if m <= low {
                continue;
            }

            let (dx, dy) = gradients[i];
            let (ax, ay) = (dx.abs(), dy.abs());
            let is_max = if ay < ax * TAN_22_5 {
                m > at(x, y, (-1, 0)) && m >= at(x, y, (1, 0))
            } else if ay > ax * TAN_67_5 {
                m > at(x, y, (0, -1)) && m >= at(x, y, (0, 1))
            } else {
                let s = if (dx < 0.0) != (dy < 0.0) { -1 } else { 1 };
                m > at(x, y, (-s, -1)) && m > at(x, y, (s, 1))
            };
            if !is_max {
                continue;
            }

            if m > high {
                state[i] = STRONG;
                stack.push(i);
            } else {
                state[i] = WEAK;
            }
        }
    }

    while let Some(i) = stack.pop() {
        let (x, y) = ((i % width) as isize, (i / width) as isize);
        for oy in -1..=1 {
            for ox in -1..=1 {
                let (xn, yn) = (x + ox, y + oy);
                if xn < 0 || yn < 0 || xn >= width as isize || yn >= height as isize {
                    continue;
                }
                let n = yn as usize * width + xn as usize;
                if state[n] == WEAK {
                    state[n] = STRONG;
                    stack.push(n);
                }
            }
        }
    }

    GrayImage::from_fn(w, h, |x, y| {
        if state[y as usize * width + x as usize] == STRONG {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Normalised 1D Gaussian kernel with `size` taps.
///
/// Sigma follows the usual rule for an unspecified sigma:
/// `0.3 * ((size - 1) / 2 - 1) + 0.8`, i.e. 1.4 for seven taps.
pub(crate) fn gaussian_kernel(size: u32) -> Vec<f32> {
    let size = size.max(1) as usize;
    if size == 1 {
        return vec![1.0];
    }
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (size / 2) as f32;
    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

/// Mask radius for a square element of side `kernel`.
fn closing_radius(kernel: u32) -> u8 {
    (kernel / 2).min(u8::MAX as u32) as u8
}
