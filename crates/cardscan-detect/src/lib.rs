// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cardscan-detect: locate a card-shaped quadrilateral in a photo and warp it
// to an upright, cropped image.
//
// Stages, leaves first: preprocessing (blur, closing, Canny), segment
// detection and line canvases, corner candidates, quadrilateral search, point
// ordering, and perspective rectification. `CardDetector` runs them in order.

pub mod candidates;
pub mod detector;
pub mod lines;
pub mod order;
pub mod preprocess;
pub mod quad;
pub mod rectify;
pub mod segments;

// Re-export the primary entry points so callers can use `cardscan_detect::CardDetector` etc.
pub use candidates::{CandidateSet, build_candidates};
pub use detector::{CardDetector, Detection};
pub use lines::{LineCanvases, extract_lines};
pub use order::{order_points, try_order_points};
pub use preprocess::preprocess;
pub use quad::{
    AreaThenAngle, QuadScoring, QuadSearch, QuadSearchResult, QuadSource, find_quadrilateral,
    full_frame, is_valid_quad,
};
pub use rectify::{destination_size, rectify};
