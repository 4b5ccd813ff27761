// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Line segment detection: a region-growing detector in the spirit of LSD.
//
// Pixels with strong Sobel gradients are grouped into 8-connected regions of
// consistent level-line orientation; each region that is long and coherent
// enough becomes one segment along its principal axis.

use std::f32::consts::PI;

use cardscan_core::config::SegmentConfig;
use cardscan_core::types::{LineSegment, Point};
use image::GrayImage;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use tracing::{debug, instrument};

const NEIGH_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Regions smaller than this never become segments.
const MIN_REGION_PIXELS: usize = 12;

/// Detect straight segments in an edge map.
///
/// Segments come out in seed (raster) order, so the result is deterministic
/// for a given image.
#[instrument(skip_all, fields(width = edges.width(), height = edges.height()))]
pub fn detect_segments(edges: &GrayImage, config: &SegmentConfig) -> Vec<LineSegment> {
    let segments = SegmentDetector::new(edges, config).detect();
    debug!(segments = segments.len(), "Segment detection complete");
    segments
}

/// Running sums for the region currently being grown.
struct Region {
    indices: Vec<usize>,
    sum_x: f32,
    sum_y: f32,
    sum_xx: f32,
    sum_yy: f32,
    sum_xy: f32,
    aligned: usize,
}

impl Region {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            indices: Vec::with_capacity(capacity),
            sum_x: 0.0,
            sum_y: 0.0,
            sum_xx: 0.0,
            sum_yy: 0.0,
            sum_xy: 0.0,
            aligned: 0,
        }
    }

    fn reset(&mut self) {
        self.indices.clear();
        self.sum_x = 0.0;
        self.sum_y = 0.0;
        self.sum_xx = 0.0;
        self.sum_yy = 0.0;
        self.sum_xy = 0.0;
        self.aligned = 0;
    }

    fn push(&mut self, idx: usize, x: usize, y: usize, aligned: bool) {
        self.indices.push(idx);
        let (xf, yf) = (x as f32, y as f32);
        self.sum_x += xf;
        self.sum_y += yf;
        self.sum_xx += xf * xf;
        self.sum_yy += yf * yf;
        self.sum_xy += xf * yf;
        if aligned {
            self.aligned += 1;
        }
    }

    fn len(&self) -> usize {
        self.indices.len()
    }

    fn aligned_fraction(&self) -> f32 {
        if self.indices.is_empty() {
            0.0
        } else {
            self.aligned as f32 / self.indices.len() as f32
        }
    }
}

struct SegmentDetector {
    width: usize,
    height: usize,
    magnitude: Vec<f32>,
    /// Level-line orientation folded into [0, pi).
    angle: Vec<f32>,
    used: Vec<bool>,
    mag_thresh: f32,
    angle_tol: f32,
    min_len: f32,
    min_aligned: f32,
    stack: Vec<usize>,
    region: Region,
    segments: Vec<LineSegment>,
}

impl SegmentDetector {
    fn new(edges: &GrayImage, config: &SegmentConfig) -> Self {
        let gx = horizontal_sobel(edges);
        let gy = vertical_sobel(edges);
        let (w, h) = edges.dimensions();
        let n = pixel_count(w, h);

        let mut magnitude = Vec::with_capacity(n);
        let mut angle = Vec::with_capacity(n);
        for (px, py) in gx.pixels().zip(gy.pixels()) {
            let dx = px.0[0] as f32;
            let dy = py.0[0] as f32;
            magnitude.push(dx.hypot(dy));
            angle.push(dy.atan2(dx).rem_euclid(PI));
        }

        Self {
            width: w as usize,
            height: h as usize,
            magnitude,
            angle,
            used: vec![false; n],
            mag_thresh: config.magnitude_threshold,
            angle_tol: config.angle_tolerance_deg.to_radians(),
            min_len: config.min_length,
            min_aligned: config.min_aligned_fraction,
            stack: Vec::with_capacity(64),
            region: Region::with_capacity(256),
            segments: Vec::new(),
        }
    }

    fn detect(mut self) -> Vec<LineSegment> {
        for idx in 0..(self.width * self.height) {
            self.process_seed(idx);
        }
        self.segments
    }

    fn process_seed(&mut self, idx: usize) {
        if self.used[idx] || self.magnitude[idx] < self.mag_thresh {
            return;
        }

        self.region.reset();
        self.stack.clear();

        let seed_angle = self.angle[idx];
        self.used[idx] = true;
        self.stack.push(idx);
        self.grow_region(seed_angle);

        match self.build_segment() {
            Some(segment) => self.segments.push(segment),
            None => {
                for &i in &self.region.indices {
                    self.used[i] = false;
                }
                // The seed itself stays claimed so it is not retried forever.
                self.used[idx] = true;
            }
        }
    }

    fn grow_region(&mut self, seed_angle: f32) {
        let half_tol = self.angle_tol * 0.5;
        while let Some(idx) = self.stack.pop() {
            let x = idx % self.width;
            let y = idx / self.width;
            let aligned = angular_difference(self.angle[idx], seed_angle) <= half_tol;
            self.region.push(idx, x, y, aligned);

            for (dx, dy) in NEIGH_OFFSETS {
                let xn = x as isize + dx;
                let yn = y as isize + dy;
                if xn < 0 || yn < 0 || xn >= self.width as isize || yn >= self.height as isize {
                    continue;
                }
                let neighbor = yn as usize * self.width + xn as usize;
                if self.used[neighbor] || self.magnitude[neighbor] < self.mag_thresh {
                    continue;
                }
                if angular_difference(self.angle[neighbor], seed_angle) <= self.angle_tol {
                    self.used[neighbor] = true;
                    self.stack.push(neighbor);
                }
            }
        }
    }

    fn build_segment(&self) -> Option<LineSegment> {
        if self.region.len() < MIN_REGION_PIXELS {
            return None;
        }
        if self.region.aligned_fraction() < self.min_aligned {
            return None;
        }

        let count = self.region.len() as f32;
        let cx = self.region.sum_x / count;
        let cy = self.region.sum_y / count;
        let cxx = self.region.sum_xx / count - cx * cx;
        let cyy = self.region.sum_yy / count - cy * cy;
        let cxy = self.region.sum_xy / count - cx * cy;

        // Principal axis of the pixel scatter.
        let theta = 0.5 * (2.0 * cxy).atan2(cxx - cyy);
        let (tx, ty) = (theta.cos(), theta.sin());
        let (nx, ny) = (-ty, tx);

        let mut smin = f32::INFINITY;
        let mut smax = f32::NEG_INFINITY;
        let mut nmin = f32::INFINITY;
        let mut nmax = f32::NEG_INFINITY;
        for &idx in &self.region.indices {
            let dx = (idx % self.width) as f32 - cx;
            let dy = (idx / self.width) as f32 - cy;
            let s = dx * tx + dy * ty;
            let n = dx * nx + dy * ny;
            smin = smin.min(s);
            smax = smax.max(s);
            nmin = nmin.min(n);
            nmax = nmax.max(n);
        }

        let len = smax - smin;
        if !len.is_finite() || len < self.min_len {
            return None;
        }

        let start = Point::new((cx + smin * tx) as f64, (cy + smin * ty) as f64);
        let end = Point::new((cx + smax * tx) as f64, (cy + smax * ty) as f64);
        Some(LineSegment::new(start, end, (nmax - nmin + 1.0) as f64))
    }
}

fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

/// Difference between two orientations folded into [0, pi).
fn angular_difference(a: f32, b: f32) -> f32 {
    let diff = (a - b).abs();
    diff.min(PI - diff)
}
