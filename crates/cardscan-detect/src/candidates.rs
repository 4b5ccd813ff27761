// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Corner candidates: endpoints of the dominant lines on each orientation
// canvas plus the pixels where the cleaned horizontal and vertical lines
// cross, thinned so no two candidates sit closer than a minimum distance.

use cardscan_core::config::CandidateConfig;
use cardscan_core::types::{Orientation, Point};
use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::drawing::draw_line_segment_mut;
use imageproc::geometry::arc_length;
use imageproc::point::Point as PixelPoint;
use tracing::{debug, instrument, warn};

use crate::lines::LineCanvases;

/// Widening rounds before the candidate list is simply truncated.
const MAX_WIDENING_ROUNDS: usize = 64;

/// Candidate corners, pairwise farther apart than `min_distance`.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSet {
    points: Vec<Point>,
    min_distance: f64,
}

impl CandidateSet {
    /// Thin `raw` with the greedy distance filter, widening the distance
    /// until at most `max_candidates` remain.
    pub fn from_raw(raw: &[Point], config: &CandidateConfig) -> Self {
        let mut min_distance = config.min_distance;
        let mut points = filter_by_distance(raw, min_distance);

        let mut rounds = 0;
        while points.len() > config.max_candidates {
            if rounds == MAX_WIDENING_ROUNDS || config.distance_growth <= 1.0 {
                warn!(
                    kept = points.len(),
                    cap = config.max_candidates,
                    "Candidate cap still exceeded; truncating"
                );
                points.truncate(config.max_candidates);
                break;
            }
            min_distance *= config.distance_growth;
            points = filter_by_distance(raw, min_distance);
            rounds += 1;
        }

        if rounds > 0 {
            debug!(min_distance, kept = points.len(), "Widened candidate distance");
        }
        Self {
            points,
            min_distance,
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Distance actually enforced (after any widening).
    pub fn min_distance(&self) -> f64 {
        self.min_distance
    }
}

/// Keep a point only if it is farther than `min_distance` from every point
/// kept before it. Greedy and order-dependent.
pub fn filter_by_distance(raw: &[Point], min_distance: f64) -> Vec<Point> {
    let mut kept: Vec<Point> = Vec::new();
    for candidate in raw {
        if kept.iter().all(|k| k.distance(candidate) > min_distance) {
            kept.push(*candidate);
        }
    }
    kept
}

/// Build the candidate set from the two line canvases.
///
/// Enumeration order is fixed: horizontal line endpoints, vertical line
/// endpoints, then crossing pixels in row-major order.
#[instrument(skip_all)]
pub fn build_candidates(canvases: &LineCanvases, config: &CandidateConfig) -> CandidateSet {
    let (mut raw, clean_h) =
        dominant_line_endpoints(&canvases.horizontal, Orientation::Horizontal, config);
    let (vertical_points, clean_v) =
        dominant_line_endpoints(&canvases.vertical, Orientation::Vertical, config);
    raw.extend(vertical_points);

    let endpoints = raw.len();
    for (x, y, h) in clean_h.enumerate_pixels() {
        if h.0[0] + clean_v.get_pixel(x, y).0[0] == 2 {
            raw.push(Point::new(x as f64, y as f64));
        }
    }

    let set = CandidateSet::from_raw(&raw, config);
    debug!(
        endpoints,
        crossings = raw.len() - endpoints,
        kept = set.len(),
        "Corner candidates built"
    );
    set
}

/// Endpoints of the longest contours on one canvas, plus a fresh canvas with
/// a one-pixel line (value 1) redrawn for each of them.
fn dominant_line_endpoints(
    canvas: &GrayImage,
    orientation: Orientation,
    config: &CandidateConfig,
) -> (Vec<Point>, GrayImage) {
    let contours = find_contours::<i32>(canvas);
    let mut external: Vec<(f64, &Contour<i32>)> = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| (arc_length(&c.points, true), c))
        .collect();
    external.sort_by(|a, b| b.0.total_cmp(&a.0));
    external.truncate(config.lines_per_orientation);

    let mut clean = GrayImage::new(canvas.width(), canvas.height());
    let mut endpoints = Vec::with_capacity(external.len() * 2);
    for (_, contour) in external {
        let Some((a, b)) = contour_endpoints(contour, orientation, config.endpoint_inset) else {
            debug!(?orientation, "Contour too short for its endpoint inset; skipped");
            continue;
        };
        draw_line_segment_mut(
            &mut clean,
            (a.0 as f32, a.1 as f32),
            (b.0 as f32, b.1 as f32),
            Luma([1u8]),
        );
        endpoints.push(Point::from(a));
        endpoints.push(Point::from(b));
    }
    (endpoints, clean)
}

type Axis = fn(&PixelPoint<i32>) -> i32;

/// The two ends of a line-shaped contour.
///
/// Along the line axis the extremes are pulled in by `inset`; across it the
/// coordinate is the truncated mean over contour pixels in that column (or
/// row).
fn contour_endpoints(
    contour: &Contour<i32>,
    orientation: Orientation,
    inset: i32,
) -> Option<((i32, i32), (i32, i32))> {
    let (along, across): (Axis, Axis) = match orientation {
        Orientation::Horizontal => (|p| p.x, |p| p.y),
        Orientation::Vertical => (|p| p.y, |p| p.x),
    };

    let lo = contour.points.iter().map(along).min()? + inset;
    let hi = contour.points.iter().map(along).max()? - inset;
    if lo > hi {
        return None;
    }

    let mean_across = |at: i32| -> Option<i32> {
        let (sum, count) = contour
            .points
            .iter()
            .filter(|p| along(p) == at)
            .fold((0i64, 0i64), |(s, c), p| (s + across(p) as i64, c + 1));
        (count > 0).then(|| (sum as f64 / count as f64) as i32)
    };
    let lo_across = mean_across(lo)?;
    let hi_across = mean_across(hi)?;

    Some(match orientation {
        Orientation::Horizontal => ((lo, lo_across), (hi, hi_across)),
        Orientation::Vertical => ((lo_across, lo), (hi_across, hi)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(canvas: &mut GrayImage, x0: u32, x1: u32, y0: u32, y1: u32) {
        for y in y0..=y1 {
            for x in x0..=x1 {
                canvas.put_pixel(x, y, Luma([255]));
            }
        }
    }

    #[test]
    fn points_closer_than_threshold_collapse() {
        let raw = [Point::new(100.0, 100.0), Point::new(105.0, 100.0)];
        let kept = filter_by_distance(&raw, 20.0);
        assert_eq!(kept, vec![Point::new(100.0, 100.0)]);
    }

    #[test]
    fn points_beyond_threshold_survive() {
        let raw = [Point::new(100.0, 100.0), Point::new(125.0, 100.0)];
        assert_eq!(filter_by_distance(&raw, 20.0).len(), 2);
    }

    #[test]
    fn filter_keeps_first_encountered() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(15.0, 0.0);
        let c = Point::new(30.0, 0.0);
        // b blocks nothing once a has claimed it; c is 30 from a.
        assert_eq!(filter_by_distance(&[a, b, c], 20.0), vec![a, c]);
        // Starting from b, both neighbours fall within 20.
        assert_eq!(filter_by_distance(&[b, a, c], 20.0), vec![b]);
    }

    #[test]
    fn cap_widens_distance() {
        let raw: Vec<Point> = (0..5)
            .flat_map(|i| (0..5).map(move |j| Point::new(i as f64 * 30.0, j as f64 * 30.0)))
            .collect();
        let config = CandidateConfig::default();
        let set = CandidateSet::from_raw(&raw, &config);
        assert!(set.len() <= config.max_candidates);
        assert!(set.min_distance() > config.min_distance);
        for (i, a) in set.points().iter().enumerate() {
            for b in &set.points()[i + 1..] {
                assert!(a.distance(b) > set.min_distance());
            }
        }
    }

    #[test]
    fn square_frame_yields_four_corners() {
        let mut horizontal = GrayImage::new(130, 130);
        bar(&mut horizontal, 18, 102, 20, 21);
        bar(&mut horizontal, 18, 102, 99, 100);
        let mut vertical = GrayImage::new(130, 130);
        bar(&mut vertical, 20, 21, 18, 102);
        bar(&mut vertical, 99, 100, 18, 102);

        let set = build_candidates(
            &LineCanvases {
                horizontal,
                vertical,
            },
            &CandidateConfig::default(),
        );
        assert_eq!(set.len(), 4, "{:?}", set.points());

        let expected = [(20.0, 20.0), (100.0, 20.0), (20.0, 100.0), (100.0, 100.0)];
        for (ex, ey) in expected {
            let target = Point::new(ex, ey);
            assert!(
                set.points().iter().any(|p| p.distance(&target) <= 2.0),
                "no candidate near {target:?}: {:?}",
                set.points()
            );
        }
    }

    #[test]
    fn empty_canvases_give_no_candidates() {
        let canvases = LineCanvases {
            horizontal: GrayImage::new(50, 50),
            vertical: GrayImage::new(50, 50),
        };
        assert!(build_candidates(&canvases, &CandidateConfig::default()).is_empty());
    }
}
