// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Canonical corner ordering: top-left, top-right, bottom-right, bottom-left.

use cardscan_core::error::{CardScanError, Result};
use cardscan_core::types::{OrderedQuad, Point};

/// Order four points as TL, TR, BR, BL.
///
/// The two smallest-x points form the left pair (smaller y is top-left); of
/// the right pair, the one farther from top-left is bottom-right. Total for
/// any input; for duplicate or collinear points the result is arbitrary but
/// deterministic. Use [`try_order_points`] when the input is untrusted.
pub fn order_points(points: [Point; 4]) -> OrderedQuad {
    let mut sorted = points;
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));

    let (top_left, bottom_left) = if sorted[1].y < sorted[0].y {
        (sorted[1], sorted[0])
    } else {
        (sorted[0], sorted[1])
    };

    let (near, far) = if top_left.distance(&sorted[3]) >= top_left.distance(&sorted[2]) {
        (sorted[2], sorted[3])
    } else {
        (sorted[3], sorted[2])
    };

    OrderedQuad {
        top_left,
        top_right: near,
        bottom_right: far,
        bottom_left,
    }
}

/// Like [`order_points`], but rejects inputs with repeated points or three
/// collinear points, for which no canonical order exists.
pub fn try_order_points(points: [Point; 4]) -> Result<OrderedQuad> {
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(CardScanError::DegenerateQuad(format!(
            "non-finite corner in {points:?}"
        )));
    }
    for i in 0..4 {
        for j in (i + 1)..4 {
            if points[i] == points[j] {
                return Err(CardScanError::DegenerateQuad(format!(
                    "corner {:?} appears twice",
                    points[i]
                )));
            }
        }
    }
    for skip in 0..4 {
        let tri: Vec<Point> = (0..4).filter(|&k| k != skip).map(|k| points[k]).collect();
        let cross = (tri[1].x - tri[0].x) * (tri[2].y - tri[0].y)
            - (tri[1].y - tri[0].y) * (tri[2].x - tri[0].x);
        if cross.abs() < 1e-9 {
            return Err(CardScanError::DegenerateQuad(format!(
                "collinear corners {tri:?}"
            )));
        }
    }
    Ok(order_points(points))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    /// All 24 orderings of four items.
    fn permutations(items: [Point; 4]) -> Vec<[Point; 4]> {
        let mut out = Vec::with_capacity(24);
        for a in 0..4 {
            for b in 0..4 {
                for c in 0..4 {
                    for d in 0..4 {
                        if a != b && a != c && a != d && b != c && b != d && c != d {
                            out.push([items[a], items[b], items[c], items[d]]);
                        }
                    }
                }
            }
        }
        out
    }

    #[test]
    fn orders_axis_aligned_rectangle() {
        let quad = order_points([
            pt(450.0, 350.0),
            pt(50.0, 50.0),
            pt(50.0, 350.0),
            pt(450.0, 50.0),
        ]);
        assert_eq!(quad.top_left, pt(50.0, 50.0));
        assert_eq!(quad.top_right, pt(450.0, 50.0));
        assert_eq!(quad.bottom_right, pt(450.0, 350.0));
        assert_eq!(quad.bottom_left, pt(50.0, 350.0));
    }

    #[test]
    fn permutation_invariant() {
        let corners = [
            pt(32.0, 41.0),
            pt(402.0, 18.0),
            pt(431.0, 297.0),
            pt(12.0, 330.0),
        ];
        let reference = order_points(corners);
        let perms = permutations(corners);
        assert_eq!(perms.len(), 24);
        for perm in perms {
            assert_eq!(order_points(perm), reference, "input {perm:?}");
        }
    }

    #[test]
    fn idempotent_on_own_output() {
        let quad = order_points([
            pt(300.0, 220.0),
            pt(40.0, 60.0),
            pt(310.0, 30.0),
            pt(20.0, 240.0),
        ]);
        assert_eq!(order_points(quad.corners()), quad);
    }

    #[test]
    fn ordered_output_is_clockwise() {
        let quad = order_points([
            pt(10.0, 200.0),
            pt(250.0, 20.0),
            pt(20.0, 10.0),
            pt(260.0, 190.0),
        ]);
        let c = quad.corners();
        // Positive signed area in image coordinates (y down) means clockwise
        // on screen.
        let signed: f64 = (0..4)
            .map(|i| {
                let (a, b) = (c[i], c[(i + 1) % 4]);
                a.x * b.y - b.x * a.y
            })
            .sum();
        assert!(signed > 0.0);
    }

    #[test]
    fn duplicate_corner_is_precondition_violation() {
        let err = try_order_points([
            pt(0.0, 0.0),
            pt(10.0, 0.0),
            pt(10.0, 0.0),
            pt(0.0, 10.0),
        ])
        .unwrap_err();
        assert!(matches!(err, CardScanError::DegenerateQuad(_)));
    }

    #[test]
    fn collinear_corners_are_precondition_violation() {
        let result = try_order_points([
            pt(0.0, 0.0),
            pt(5.0, 5.0),
            pt(10.0, 10.0),
            pt(0.0, 10.0),
        ]);
        assert!(matches!(result, Err(CardScanError::DegenerateQuad(_))));
    }

    #[test]
    fn try_order_accepts_regular_quad() {
        let quad = try_order_points([
            pt(0.0, 0.0),
            pt(10.0, 0.0),
            pt(10.0, 8.0),
            pt(0.0, 8.0),
        ])
        .unwrap();
        assert_eq!(quad.bottom_right, pt(10.0, 8.0));
    }
}
