// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Line extraction: classify detected segments as horizontal or vertical and
// rasterize them, slightly extended, onto one canvas per orientation.

use cardscan_core::config::LineConfig;
use cardscan_core::types::{LineSegment, Orientation};
use image::{GrayImage, Luma};
use imageproc::drawing::draw_line_segment_mut;
use tracing::{debug, instrument};

use crate::segments::detect_segments;

/// Foreground value on the line canvases.
const INK: Luma<u8> = Luma([255]);

/// The two orientation canvases produced from one edge map.
#[derive(Debug, Clone)]
pub struct LineCanvases {
    pub horizontal: GrayImage,
    pub vertical: GrayImage,
}

/// Detect segments in `edges` and draw them onto fresh canvases.
#[instrument(skip_all, fields(width = edges.width(), height = edges.height()))]
pub fn extract_lines(edges: &GrayImage, config: &LineConfig) -> LineCanvases {
    let segments = detect_segments(edges, &config.segments);
    let canvases = draw_segments(&segments, edges.width(), edges.height(), config);
    debug!(segments = segments.len(), "Line canvases drawn");
    canvases
}

/// Rasterize already-detected segments.
///
/// Endpoints are truncated to integer pixels. Horizontal segments run
/// left-to-right and are extended by `config.extension` along x; vertical
/// segments run top-to-bottom and are extended along y. Extended ends are
/// clamped to the image.
pub fn draw_segments(
    segments: &[LineSegment],
    width: u32,
    height: u32,
    config: &LineConfig,
) -> LineCanvases {
    let mut horizontal = GrayImage::new(width, height);
    let mut vertical = GrayImage::new(width, height);
    let max_x = width as i32 - 1;
    let max_y = height as i32 - 1;
    let ext = config.extension;

    let mut counts = (0usize, 0usize);
    for segment in segments {
        let a = (segment.start.x as i32, segment.start.y as i32);
        let b = (segment.end.x as i32, segment.end.y as i32);

        match segment.orientation() {
            Orientation::Horizontal => {
                let (left, right) = if a.0 <= b.0 { (a, b) } else { (b, a) };
                let from = ((left.0 - ext).max(0), left.1);
                let to = ((right.0 + ext).min(max_x), right.1);
                draw_thick(&mut horizontal, from, to, config.thickness, Orientation::Horizontal);
                counts.0 += 1;
            }
            Orientation::Vertical => {
                let (top, bottom) = if a.1 <= b.1 { (a, b) } else { (b, a) };
                let from = (top.0, (top.1 - ext).max(0));
                let to = (bottom.0, (bottom.1 + ext).min(max_y));
                draw_thick(&mut vertical, from, to, config.thickness, Orientation::Vertical);
                counts.1 += 1;
            }
        }
    }

    debug!(
        horizontal = counts.0,
        vertical = counts.1,
        "Segments classified"
    );
    LineCanvases {
        horizontal,
        vertical,
    }
}

/// Draw a stroke `thickness` pixels wide by stacking parallel one-pixel lines
/// across the stroke direction.
fn draw_thick(
    canvas: &mut GrayImage,
    from: (i32, i32),
    to: (i32, i32),
    thickness: u32,
    orientation: Orientation,
) {
    for offset in 0..thickness.max(1) as i32 {
        let (dx, dy) = match orientation {
            Orientation::Horizontal => (0, offset),
            Orientation::Vertical => (offset, 0),
        };
        draw_line_segment_mut(
            canvas,
            ((from.0 + dx) as f32, (from.1 + dy) as f32),
            ((to.0 + dx) as f32, (to.1 + dy) as f32),
            INK,
        );
    }
}
