// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quadrilateral search: score every 4-subset of the corner candidates,
// independently simplify the largest edge-map contours, and fall back to the
// full frame when neither yields a plausible card outline.

use cardscan_core::config::SearchConfig;
use cardscan_core::types::{Point, Quadrilateral};
use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point as PixelPoint;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::candidates::CandidateSet;
use crate::order::order_points;

/// Where a search result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuadSource {
    /// Best-scoring 4-subset of the corner candidates.
    Candidates,
    /// Simplified outline of an edge-map contour.
    EdgeContour,
    /// Nothing valid was found; the whole frame is returned.
    FullFrame,
}

/// Outcome of one quadrilateral search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadSearchResult {
    /// Winning quadrilateral in working-image coordinates.
    pub quad: Quadrilateral,
    /// `false` only for the full-frame fallback.
    pub accepted: bool,
    pub source: QuadSource,
}

/// Chooses one quadrilateral out of all ordered 4-subsets of the candidates.
///
/// Validity is checked afterwards by the search; a strategy only ranks.
pub trait QuadScoring {
    fn select(&self, quads: Vec<Quadrilateral>) -> Option<Quadrilateral>;
}

/// Keep the `shortlist` largest quads by area, then take the one with the
/// smallest angle range. Ties keep enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaThenAngle {
    pub shortlist: usize,
}

impl Default for AreaThenAngle {
    fn default() -> Self {
        Self { shortlist: 5 }
    }
}

impl QuadScoring for AreaThenAngle {
    fn select(&self, mut quads: Vec<Quadrilateral>) -> Option<Quadrilateral> {
        quads.sort_by(|a, b| b.area().total_cmp(&a.area()));
        quads.truncate(self.shortlist);
        quads
            .into_iter()
            .min_by(|a, b| a.angle_range().total_cmp(&b.angle_range()))
    }
}

/// The frame of a `width` x `height` image, clockwise from the top-right.
pub fn full_frame(width: u32, height: u32) -> Quadrilateral {
    let (w, h) = (width as f64, height as f64);
    Quadrilateral::new([
        Point::new(w, 0.0),
        Point::new(w, h),
        Point::new(0.0, h),
        Point::new(0.0, 0.0),
    ])
}

/// Area above `min_area_ratio` of the image and angle range below
/// `max_angle_range`. A `NaN` angle range is never valid.
pub fn is_valid_quad(quad: &Quadrilateral, width: u32, height: u32, config: &SearchConfig) -> bool {
    let min_area = config.min_area_ratio * width as f64 * height as f64;
    quad.area() > min_area && quad.angle_range() < config.max_angle_range
}

/// Search with the default area-then-angle scoring.
pub fn find_quadrilateral(
    candidates: &CandidateSet,
    edges: &GrayImage,
    config: &SearchConfig,
) -> QuadSearchResult {
    QuadSearch::new(config).run(candidates, edges)
}

/// Search engine parameterised by its scoring strategy.
pub struct QuadSearch<'a, S = AreaThenAngle> {
    config: &'a SearchConfig,
    scoring: S,
}

impl<'a> QuadSearch<'a> {
    pub fn new(config: &'a SearchConfig) -> Self {
        Self {
            config,
            scoring: AreaThenAngle {
                shortlist: config.area_shortlist,
            },
        }
    }
}

impl<'a, S: QuadScoring> QuadSearch<'a, S> {
    /// Swap the candidate scoring strategy.
    pub fn with_scoring<T: QuadScoring>(self, scoring: T) -> QuadSearch<'a, T> {
        QuadSearch {
            config: self.config,
            scoring,
        }
    }

    /// Run both detectors and pick the largest valid outline.
    #[instrument(skip_all, fields(candidates = candidates.len(), width = edges.width(), height = edges.height()))]
    pub fn run(&self, candidates: &CandidateSet, edges: &GrayImage) -> QuadSearchResult {
        let (width, height) = edges.dimensions();
        let mut pool: Vec<(Quadrilateral, QuadSource)> = Vec::with_capacity(2);

        if let Some(quad) = self.from_candidates(candidates.points(), width, height) {
            pool.push((quad, QuadSource::Candidates));
        }
        if let Some(quad) = self.from_edge_contours(edges) {
            pool.push((quad, QuadSource::EdgeContour));
        }

        let best = pool.into_iter().fold(None, |best: Option<(Quadrilateral, QuadSource)>, item| {
            match best {
                Some(current) if current.0.area() >= item.0.area() => Some(current),
                _ => Some(item),
            }
        });

        match best {
            Some((quad, source)) => {
                info!(?source, area = quad.area(), angle_range = quad.angle_range(), "Quadrilateral accepted");
                QuadSearchResult {
                    quad,
                    accepted: true,
                    source,
                }
            }
            None => {
                warn!("No valid quadrilateral; falling back to the full frame");
                QuadSearchResult {
                    quad: full_frame(width, height),
                    accepted: false,
                    source: QuadSource::FullFrame,
                }
            }
        }
    }

    /// Best 4-subset of `points` according to the scoring strategy, if it is
    /// valid. Each subset is put in canonical order before scoring.
    pub fn from_candidates(&self, points: &[Point], width: u32, height: u32) -> Option<Quadrilateral> {
        let n = points.len();
        if n < 4 {
            debug!(candidates = n, "Too few candidates for subset search");
            return None;
        }

        let mut quads = Vec::with_capacity(subset_count(n));
        for i in 0..n {
            for j in (i + 1)..n {
                for k in (j + 1)..n {
                    for l in (k + 1)..n {
                        let ordered = order_points([points[i], points[j], points[k], points[l]]);
                        quads.push(ordered.to_quadrilateral());
                    }
                }
            }
        }
        debug!(subsets = quads.len(), "Enumerated candidate subsets");

        let best = self.scoring.select(quads)?;
        if is_valid_quad(&best, width, height, self.config) {
            Some(best)
        } else {
            debug!(
                area = best.area(),
                angle_range = best.angle_range(),
                "Best candidate subset failed validity"
            );
            None
        }
    }

    /// First valid 4-vertex simplification among the largest external
    /// contours of the edge map.
    pub fn from_edge_contours(&self, edges: &GrayImage) -> Option<Quadrilateral> {
        let (width, height) = edges.dimensions();
        let contours = find_contours::<i32>(edges);
        let mut external: Vec<(f64, &[PixelPoint<i32>])> = contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| (polygon_area(&c.points), c.points.as_slice()))
            .collect();
        external.sort_by(|a, b| b.0.total_cmp(&a.0));
        external.truncate(self.config.contour_shortlist);

        for (area, points) in external {
            let outline = simplify_closed(points, self.config.contour_epsilon);
            if outline.len() != 4 {
                debug!(area, vertices = outline.len(), "Contour is not a quadrilateral");
                continue;
            }
            let quad = Quadrilateral::new([
                pixel_to_point(outline[0]),
                pixel_to_point(outline[1]),
                pixel_to_point(outline[2]),
                pixel_to_point(outline[3]),
            ]);
            if is_valid_quad(&quad, width, height, self.config) {
                return Some(quad);
            }
        }
        None
    }
}

fn subset_count(n: usize) -> usize {
    if n < 4 {
        0
    } else {
        n * (n - 1) * (n - 2) * (n - 3) / 24
    }
}

fn pixel_to_point(p: PixelPoint<i32>) -> Point {
    Point::new(p.x as f64, p.y as f64)
}

/// Unsigned shoelace area of a closed pixel polygon.
fn polygon_area(points: &[PixelPoint<i32>]) -> f64 {
    let n = points.len();
    let mut twice: i64 = 0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        twice += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    twice.abs() as f64 / 2.0
}

/// Douglas-Peucker simplification of a closed contour.
///
/// The loop is cut at two mutually distant points (farthest from the first
/// point, then farthest from that), each half is simplified as an open
/// curve, and the halves are joined without repeating the cut points.
fn simplify_closed(points: &[PixelPoint<i32>], epsilon: f64) -> Vec<PixelPoint<i32>> {
    if points.len() < 3 || !(epsilon > 0.0) {
        return points.to_vec();
    }

    let a = farthest_from(points, points[0]);
    let b = farthest_from(points, points[a]);
    let (start, end) = (a.min(b), a.max(b));
    if start == end {
        return vec![points[start]];
    }

    let forward = &points[start..=end];
    let backward: Vec<PixelPoint<i32>> = points[end..]
        .iter()
        .chain(points[..=start].iter())
        .copied()
        .collect();

    let mut outline = approximate_polygon_dp(forward, epsilon, false);
    outline.pop();
    outline.extend(approximate_polygon_dp(&backward, epsilon, false));
    outline.pop();
    outline.dedup();
    outline
}

fn farthest_from(points: &[PixelPoint<i32>], origin: PixelPoint<i32>) -> usize {
    let mut best = 0;
    let mut best_d = -1i64;
    for (i, p) in points.iter().enumerate() {
        let dx = (p.x - origin.x) as i64;
        let dy = (p.y - origin.y) as i64;
        let d = dx * dx + dy * dy;
        if d > best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn pt(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    /// Parallelogram with a horizontal base: interior angles `alpha` and
    /// `180 - alpha`, so the angle range is `|180 - 2 alpha|`.
    fn parallelogram(base: f64, side: f64, alpha_deg: f64) -> Quadrilateral {
        let (dx, dy) = (
            side * alpha_deg.to_radians().cos(),
            side * alpha_deg.to_radians().sin(),
        );
        let bottom_left = pt(20.0, 20.0 + dy);
        Quadrilateral::new([
            pt(bottom_left.x + dx, bottom_left.y - dy),
            pt(bottom_left.x + dx + base, bottom_left.y - dy),
            pt(bottom_left.x + base, bottom_left.y),
            bottom_left,
        ])
    }

    fn candidate_set(points: &[Point]) -> CandidateSet {
        CandidateSet::from_raw(points, &cardscan_core::config::CandidateConfig::default())
    }

    #[test]
    fn angle_range_38_passes_and_42_fails() {
        let config = SearchConfig::default();
        let passes = parallelogram(400.0, 300.0, 71.0);
        let fails = parallelogram(400.0, 300.0, 69.0);
        assert!((passes.angle_range() - 38.0).abs() < 1e-6);
        assert!((fails.angle_range() - 42.0).abs() < 1e-6);
        assert!(is_valid_quad(&passes, 500, 400, &config));
        assert!(!is_valid_quad(&fails, 500, 400, &config));
    }

    #[test]
    fn small_quad_fails_area_check() {
        let small = parallelogram(100.0, 100.0, 90.0);
        assert!(small.angle_range().abs() < 1e-9);
        assert!(!is_valid_quad(&small, 500, 400, &SearchConfig::default()));
    }

    #[test]
    fn scoring_prefers_regular_shape_within_shortlist() {
        let quads = vec![
            parallelogram(400.0, 300.0, 70.0),
            parallelogram(380.0, 300.0, 75.0),
            parallelogram(360.0, 300.0, 80.0),
            parallelogram(350.0, 300.0, 85.0),
            parallelogram(340.0, 300.0, 60.0),
            // Perfect but smallest: outside the shortlist of five.
            parallelogram(300.0, 200.0, 90.0),
        ];
        let best = AreaThenAngle::default().select(quads).unwrap();
        assert!((best.angle_range() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn custom_scoring_can_be_swapped_in() {
        struct RejectAll;
        impl QuadScoring for RejectAll {
            fn select(&self, _quads: Vec<Quadrilateral>) -> Option<Quadrilateral> {
                None
            }
        }
        let config = SearchConfig::default();
        let points = [
            pt(10.0, 10.0),
            pt(490.0, 10.0),
            pt(490.0, 390.0),
            pt(10.0, 390.0),
        ];
        let search = QuadSearch::new(&config);
        assert!(search.from_candidates(&points, 500, 400).is_some());
        let rejecting = search.with_scoring(RejectAll);
        assert!(rejecting.from_candidates(&points, 500, 400).is_none());
    }

    #[test]
    fn rectangle_candidates_are_accepted() {
        let config = SearchConfig::default();
        let points = [
            pt(450.0, 350.0),
            pt(50.0, 50.0),
            pt(450.0, 50.0),
            pt(50.0, 350.0),
        ];
        let quad = QuadSearch::new(&config)
            .from_candidates(&points, 500, 400)
            .unwrap();
        assert!((quad.area() - 120_000.0).abs() < 1e-6);
        assert_eq!(quad.corners[0], pt(50.0, 50.0));
    }

    #[test]
    fn sparse_candidates_fall_back_to_full_frame() {
        let candidates = candidate_set(&[pt(10.0, 10.0), pt(200.0, 30.0), pt(120.0, 300.0)]);
        let edges = GrayImage::new(500, 400);
        let result = find_quadrilateral(&candidates, &edges, &SearchConfig::default());
        assert!(!result.accepted);
        assert_eq!(result.source, QuadSource::FullFrame);
        assert_eq!(
            result.quad.corners,
            [
                pt(500.0, 0.0),
                pt(500.0, 400.0),
                pt(0.0, 400.0),
                pt(0.0, 0.0)
            ]
        );
    }

    #[test]
    fn edge_outline_is_found_by_contour_detector() {
        let mut edges = GrayImage::new(200, 150);
        for x in 20..=180 {
            edges.put_pixel(x, 20, Luma([255]));
            edges.put_pixel(x, 130, Luma([255]));
        }
        for y in 20..=130 {
            edges.put_pixel(20, y, Luma([255]));
            edges.put_pixel(180, y, Luma([255]));
        }

        let config = SearchConfig::default();
        let result = find_quadrilateral(&candidate_set(&[]), &edges, &config);
        assert!(result.accepted);
        assert_eq!(result.source, QuadSource::EdgeContour);
        for corner in [pt(20.0, 20.0), pt(180.0, 20.0), pt(180.0, 130.0), pt(20.0, 130.0)] {
            assert!(
                result.quad.corners.iter().any(|c| c.distance(&corner) <= 1.5),
                "missing corner {corner:?} in {:?}",
                result.quad.corners
            );
        }
    }

    #[test]
    fn larger_outline_wins_the_pool() {
        let mut edges = GrayImage::new(500, 400);
        for x in 100..=400 {
            edges.put_pixel(x, 100, Luma([255]));
            edges.put_pixel(x, 300, Luma([255]));
        }
        for y in 100..=300 {
            edges.put_pixel(100, y, Luma([255]));
            edges.put_pixel(400, y, Luma([255]));
        }
        let candidates = candidate_set(&[
            pt(40.0, 40.0),
            pt(460.0, 40.0),
            pt(460.0, 360.0),
            pt(40.0, 360.0),
        ]);
        let result = find_quadrilateral(&candidates, &edges, &SearchConfig::default());
        assert!(result.accepted);
        assert_eq!(result.source, QuadSource::Candidates);
        assert!((result.quad.area() - 420.0 * 320.0).abs() < 1e-6);
    }

    #[test]
    fn simplify_closed_rectangle_has_four_vertices() {
        let mut contour = Vec::new();
        for x in 0..50 {
            contour.push(PixelPoint::new(x, 0));
        }
        for y in 0..30 {
            contour.push(PixelPoint::new(50, y));
        }
        for x in (1..=50).rev() {
            contour.push(PixelPoint::new(x, 30));
        }
        for y in (1..=30).rev() {
            contour.push(PixelPoint::new(0, y));
        }
        let outline = simplify_closed(&contour, 5.0);
        assert_eq!(outline.len(), 4, "{outline:?}");
        assert!((polygon_area(&outline) - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn subset_count_is_choose_four() {
        assert_eq!(subset_count(3), 0);
        assert_eq!(subset_count(4), 1);
        assert_eq!(subset_count(16), 1820);
    }
}
