// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective rectification: warp the region inside an ordered quadrilateral
// to an upright rectangle sized from the quad's own side lengths.

use cardscan_core::error::{CardScanError, Result};
use cardscan_core::types::{OrderedQuad, Point};
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{debug, info, instrument};

/// Fill for destination pixels that map outside the source image.
const BORDER: Rgb<u8> = Rgb([0, 0, 0]);

/// Output size for `quad`: the longer of each pair of opposite sides,
/// floored to whole pixels.
pub fn destination_size(quad: &OrderedQuad) -> (u32, u32) {
    let bottom = quad.bottom_left.distance(&quad.bottom_right).floor();
    let top = quad.top_left.distance(&quad.top_right).floor();
    let left = quad.top_left.distance(&quad.bottom_left).floor();
    let right = quad.top_right.distance(&quad.bottom_right).floor();
    (bottom.max(top) as u32, left.max(right) as u32)
}

/// Warp `image` so that `quad` maps onto a `width` x `height` rectangle.
///
/// Errors with [`CardScanError::Rectification`] when the destination would be
/// narrower or shorter than two pixels, or when the corners admit no
/// projective transform.
#[instrument(skip_all, fields(src_w = image.width(), src_h = image.height()))]
pub fn rectify(image: &RgbImage, quad: &OrderedQuad) -> Result<RgbImage> {
    let (width, height) = destination_size(quad);
    if width < 2 || height < 2 {
        return Err(CardScanError::Rectification(format!(
            "destination size {width}x{height} is degenerate"
        )));
    }

    let src = quad.corners().map(as_control_point);
    let (right, bottom) = ((width - 1) as f32, (height - 1) as f32);
    let dst = [(0.0, 0.0), (right, 0.0), (right, bottom), (0.0, bottom)];

    let projection = Projection::from_control_points(src, dst).ok_or_else(|| {
        CardScanError::Rectification(format!("no projective transform for corners {src:?}"))
    })?;
    debug!(width, height, "Projective transform computed");

    let mut output = RgbImage::new(width, height);
    warp_into(image, &projection, Interpolation::Bilinear, BORDER, &mut output);

    info!(width, height, "Perspective correction applied");
    Ok(output)
}

fn as_control_point(p: Point) -> (f32, f32) {
    (p.x as f32, p.y as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(tl: (f64, f64), tr: (f64, f64), br: (f64, f64), bl: (f64, f64)) -> OrderedQuad {
        OrderedQuad {
            top_left: tl.into(),
            top_right: tr.into(),
            bottom_right: br.into(),
            bottom_left: bl.into(),
        }
    }

    #[test]
    fn size_uses_longer_opposite_sides() {
        let q = quad((10.0, 10.0), (110.0, 10.0), (120.5, 70.0), (0.0, 60.0));
        let (w, h) = destination_size(&q);
        assert_eq!(w, 120);
        assert_eq!(h, 60);
    }

    #[test]
    fn axis_aligned_crop_matches_quad_size() {
        let mut img = RgbImage::from_pixel(200, 150, Rgb([0, 0, 0]));
        for y in 30..120 {
            for x in 40..160 {
                img.put_pixel(x, y, Rgb([200, 10, 10]));
            }
        }
        let q = quad((40.0, 30.0), (160.0, 30.0), (160.0, 120.0), (40.0, 120.0));
        let out = rectify(&img, &q).unwrap();
        assert_eq!(out.dimensions(), (120, 90));
        // Centre lies well inside the red region.
        assert_eq!(out.get_pixel(60, 45), &Rgb([200, 10, 10]));
    }

    #[test]
    fn skewed_quad_is_straightened() {
        let mut img = RgbImage::new(300, 300);
        // Fill a parallelogram leaning right.
        for y in 50..250u32 {
            let shift = (y - 50) / 4;
            for x in (60 + shift)..(200 + shift) {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let q = quad((60.0, 50.0), (200.0, 50.0), (250.0, 250.0), (110.0, 250.0));
        let out = rectify(&img, &q).unwrap();
        assert_eq!(out.width(), 140);
        let (w, h) = out.dimensions();
        assert!(out.get_pixel(w / 2, h / 2).0[0] > 200);
        assert!(out.get_pixel(5, h / 2).0[0] > 200);
        assert!(out.get_pixel(w - 6, h / 2).0[0] > 200);
    }

    #[test]
    fn coincident_corners_fail() {
        let img = RgbImage::new(50, 50);
        let q = quad((10.0, 10.0), (10.0, 10.0), (10.0, 10.0), (10.0, 10.0));
        assert!(matches!(
            rectify(&img, &q),
            Err(CardScanError::Rectification(_))
        ));
    }

    #[test]
    fn one_pixel_strip_fails() {
        let img = RgbImage::new(50, 50);
        let q = quad((10.0, 10.0), (40.0, 10.0), (40.0, 11.0), (10.0, 11.0));
        assert!(rectify(&img, &q).is_err());
    }
}
