//! Line rasterization into RGB buffers, clipped before it reaches `imageproc`.
//!
//! Projected geometry can land arbitrarily far outside the frame (a vertex
//! just in front of the eye projects to huge window coordinates), and
//! `imageproc` walks every step of a segment even off-image. Segments are
//! therefore clipped to the image rectangle first.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use nalgebra::Point2;

/// Clip the segment `p0 -> p1` to `[0, w-1] x [0, h-1]` (Liang-Barsky).
pub(crate) fn clip_segment(
    p0: Point2<f64>,
    p1: Point2<f64>,
    w: f64,
    h: f64,
) -> Option<(Point2<f64>, Point2<f64>)> {
    if !(p0.x.is_finite() && p0.y.is_finite() && p1.x.is_finite() && p1.y.is_finite()) {
        return None;
    }
    let d = p1 - p0;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    for (p, q) in [
        (-d.x, p0.x),
        (d.x, w - 1.0 - p0.x),
        (-d.y, p0.y),
        (d.y, h - 1.0 - p0.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((p0 + d * t0, p0 + d * t1))
}

/// Draw a 1-pixel line between two points in pixel coordinates (x right,
/// y down). Endpoints snap to the nearest pixel center.
pub(crate) fn draw_segment(img: &mut RgbImage, from: Point2<f64>, to: Point2<f64>, color: Rgb<u8>) {
    if img.width() == 0 || img.height() == 0 {
        return;
    }
    let Some((a, b)) = clip_segment(from, to, f64::from(img.width()), f64::from(img.height()))
    else {
        return;
    };
    draw_line_segment_mut(
        img,
        (a.x.round() as f32, a.y.round() as f32),
        (b.x.round() as f32, b.y.round() as f32),
        color,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    fn lit(img: &RgbImage) -> usize {
        img.pixels().filter(|p| p.0 != [0, 0, 0]).count()
    }

    #[test]
    fn horizontal_line_covers_its_span() {
        let mut img = RgbImage::new(10, 5);
        draw_segment(&mut img, Point2::new(1.0, 2.0), Point2::new(8.0, 2.0), WHITE);
        assert_eq!(lit(&img), 8);
        assert_eq!(*img.get_pixel(1, 2), WHITE);
        assert_eq!(*img.get_pixel(8, 2), WHITE);
    }

    #[test]
    fn far_off_segments_are_clipped_to_the_image() {
        let mut img = RgbImage::new(10, 10);
        draw_segment(
            &mut img,
            Point2::new(-1.0e9, 5.0),
            Point2::new(1.0e9, 5.0),
            WHITE,
        );
        assert_eq!(lit(&img), 10);

        let mut img = RgbImage::new(10, 10);
        draw_segment(&mut img, Point2::new(-5.0, -5.0), Point2::new(-1.0, -9.0), WHITE);
        assert_eq!(lit(&img), 0);
    }

    #[test]
    fn clipping_keeps_inner_segments_unchanged() {
        let (a, b) = clip_segment(Point2::new(2.0, 3.0), Point2::new(7.0, 1.0), 10.0, 10.0)
            .expect("inside");
        assert_eq!(a, Point2::new(2.0, 3.0));
        assert_eq!(b, Point2::new(7.0, 1.0));

        let (a, b) = clip_segment(Point2::new(-10.0, 4.0), Point2::new(20.0, 4.0), 10.0, 10.0)
            .expect("crossing");
        assert_eq!(a, Point2::new(0.0, 4.0));
        assert_eq!(b, Point2::new(9.0, 4.0));
    }

    #[test]
    fn non_finite_endpoints_draw_nothing() {
        let mut img = RgbImage::new(4, 4);
        draw_segment(&mut img, Point2::new(f64::NAN, 0.0), Point2::new(3.0, 3.0), WHITE);
        assert_eq!(lit(&img), 0);
        assert!(clip_segment(
            Point2::new(0.0, f64::INFINITY),
            Point2::new(1.0, 1.0),
            4.0,
            4.0
        )
        .is_none());
    }

    #[test]
    fn diagonal_is_connected() {
        let mut img = RgbImage::new(6, 6);
        draw_segment(&mut img, Point2::new(0.0, 0.0), Point2::new(5.0, 5.0), WHITE);
        for i in 0..6 {
            assert_eq!(*img.get_pixel(i, i), WHITE);
        }
    }
}
