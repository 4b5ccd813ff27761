// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core geometry types passed between the detection stages.

use serde::{Deserialize, Serialize};

/// A 2D image coordinate. Origin is the top-left pixel, y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x as f64, y as f64)
    }
}

/// Dominant direction of a line segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A detected straight segment: two endpoints plus the stroke width of the
/// supporting pixel region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: Point,
    pub end: Point,
    pub width: f64,
}

impl LineSegment {
    pub fn new(start: Point, end: Point, width: f64) -> Self {
        Self { start, end, width }
    }

    /// Horizontal when `|dx| > |dy|`, vertical otherwise (ties included).
    pub fn orientation(&self) -> Orientation {
        let dx = (self.end.x - self.start.x).abs();
        let dy = (self.end.y - self.start.y).abs();
        if dx > dy {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }
}

/// Four vertices in cyclic (polygon) order.
///
/// Area and angle range depend only on the cycle, so rotating the vertex list
/// leaves both unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    pub corners: [Point; 4],
}

impl Quadrilateral {
    pub fn new(corners: [Point; 4]) -> Self {
        Self { corners }
    }

    /// Unsigned polygon area (shoelace formula).
    pub fn area(&self) -> f64 {
        let mut twice = 0.0;
        for i in 0..4 {
            let a = self.corners[i];
            let b = self.corners[(i + 1) % 4];
            twice += a.x * b.y - b.x * a.y;
        }
        twice.abs() / 2.0
    }

    /// Interior angle in degrees at every vertex, from its two incident edges.
    ///
    /// A zero-length edge yields `NaN` at both of its vertices.
    pub fn interior_angles(&self) -> [f64; 4] {
        let mut angles = [0.0; 4];
        for (i, angle) in angles.iter_mut().enumerate() {
            let prev = self.corners[(i + 3) % 4];
            let here = self.corners[i];
            let next = self.corners[(i + 1) % 4];
            *angle = vertex_angle(prev, here, next);
        }
        angles
    }

    /// Spread (max − min) of the interior angles, in degrees. `NaN` when any
    /// angle is undefined.
    pub fn angle_range(&self) -> f64 {
        let angles = self.interior_angles();
        if angles.iter().any(|a| a.is_nan()) {
            return f64::NAN;
        }
        let max = angles.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = angles.iter().copied().fold(f64::INFINITY, f64::min);
        max - min
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.corners.map(|p| p.scaled(factor)))
    }
}

/// Angle at `b` between rays `b→a` and `b→c`, in degrees.
fn vertex_angle(a: Point, b: Point, c: Point) -> f64 {
    let (bax, bay) = (a.x - b.x, a.y - b.y);
    let (bcx, bcy) = (c.x - b.x, c.y - b.y);
    let norms = bax.hypot(bay) * bcx.hypot(bcy);
    if norms == 0.0 {
        return f64::NAN;
    }
    let cosine = ((bax * bcx + bay * bcy) / norms).clamp(-1.0, 1.0);
    cosine.acos().to_degrees()
}

/// A quadrilateral in canonical clockwise order starting at the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderedQuad {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl OrderedQuad {
    /// Corners as `[top_left, top_right, bottom_right, bottom_left]`.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    pub fn to_quadrilateral(&self) -> Quadrilateral {
        Quadrilateral::new(self.corners())
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            top_left: self.top_left.scaled(factor),
            top_right: self.top_right.scaled(factor),
            bottom_right: self.bottom_right.scaled(factor),
            bottom_left: self.bottom_left.scaled(factor),
        }
    }
}
