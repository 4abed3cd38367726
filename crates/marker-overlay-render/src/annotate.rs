//! Image-space decorations drawn straight into the background buffer.
//!
//! These run on the CPU image before it is blitted, so whatever they draw
//! becomes part of the background.

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_cross_mut, draw_hollow_polygon_mut, draw_hollow_rect_mut, draw_text_mut,
};
use imageproc::point::Point;
use imageproc::rect::Rect;
use marker_overlay_core::{CameraModel, Marker};
use nalgebra::{Point2, Point3};

use crate::primitives::axis_gizmo;
use crate::raster;

/// Half-size, in pixels, of the box marking the first corner.
const CORNER_BOX_RADIUS: i32 = 3;
/// Height of the id label glyphs, in pixels.
pub const LABEL_SCALE: f32 = 16.0;
/// Offset of the label from the centroid, in pixels.
const LABEL_OFFSET: i32 = 6;

/// Outline the marker quad, box its first corner and cross its centroid.
pub fn draw_marker_outline(img: &mut RgbImage, marker: &Marker, color: Rgb<u8>) {
    let corners = marker.corners.map(|p| Point::new(p.x, p.y));
    let finite = marker.corners.iter().all(|p| p.x.is_finite() && p.y.is_finite());
    if !finite {
        return;
    }
    if corners[0] != corners[3] {
        draw_hollow_polygon_mut(img, &corners, color);
    } else {
        // Collapsed quad: the polygon helper refuses a closing duplicate.
        let pts = marker.corners.map(|p| p.cast::<f64>());
        for pair in pts.windows(2) {
            raster::draw_segment(img, pair[0], pair[1], color);
        }
    }

    let first = marker.corners[0];
    let side = (2 * CORNER_BOX_RADIUS + 1) as u32;
    draw_hollow_rect_mut(
        img,
        Rect::at(
            first.x.round() as i32 - CORNER_BOX_RADIUS,
            first.y.round() as i32 - CORNER_BOX_RADIUS,
        )
        .of_size(side, side),
        color,
    );

    let c = marker.centroid();
    draw_cross_mut(img, color, c.x.round() as i32, c.y.round() as i32);
}

/// Write the marker id next to its centroid.
pub fn draw_marker_label(img: &mut RgbImage, marker: &Marker, color: Rgb<u8>, font: &FontVec) {
    let c = marker.centroid();
    if !(c.x.is_finite() && c.y.is_finite()) {
        return;
    }
    let x = c.x.round() as i32 + LABEL_OFFSET;
    let y = c.y.round() as i32 - LABEL_OFFSET - LABEL_SCALE as i32;
    draw_text_mut(
        img,
        color,
        x,
        y,
        PxScale::from(LABEL_SCALE),
        font,
        &marker.id.to_string(),
    );
}

/// Outline every marker of the frame, and label it when a font is given.
pub fn draw_marker_outlines(
    img: &mut RgbImage,
    markers: &[Marker],
    color: Rgb<u8>,
    font: Option<&FontVec>,
) {
    for marker in markers {
        draw_marker_outline(img, marker, color);
        if let Some(font) = font {
            draw_marker_label(img, marker, color, font);
        }
    }
}

fn project(camera: &CameraModel, marker: &Marker, local: Point3<f64>) -> Option<Point2<f64>> {
    camera.project_point(&marker.pose().transform_point(&local))
}

/// Project the marker's axis gizmo with the camera model and draw it.
///
/// Axes whose endpoints cannot be projected are skipped.
pub fn draw_projected_axis(img: &mut RgbImage, marker: &Marker, camera: &CameraModel, size: f32) {
    let Some(origin) = project(camera, marker, Point3::origin()) else {
        return;
    };
    for axis in axis_gizmo(size) {
        if let Some(end) = project(camera, marker, axis.end.cast::<f64>()) {
            raster::draw_segment(img, origin, end, axis.color.to_rgb8());
        }
    }
}

/// Project a cube of edge `size` standing on the marker plane (base at
/// `z = 0`, top at `z = size`) and draw its 12 edges.
pub fn draw_projected_cube(
    img: &mut RgbImage,
    marker: &Marker,
    camera: &CameraModel,
    size: f32,
    color: Rgb<u8>,
) {
    let h = f64::from(size) / 2.0;
    let s = f64::from(size);
    let base = [(-h, -h), (h, -h), (h, h), (-h, h)];
    let bottom = base.map(|(x, y)| project(camera, marker, Point3::new(x, y, 0.0)));
    let top = base.map(|(x, y)| project(camera, marker, Point3::new(x, y, s)));

    for i in 0..4 {
        let j = (i + 1) % 4;
        for (a, b) in [(bottom[i], bottom[j]), (top[i], top[j]), (bottom[i], top[i])] {
            if let (Some(a), Some(b)) = (a, b) {
                raster::draw_segment(img, a, b, color);
            }
        }
    }
}
