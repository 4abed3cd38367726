//! Frame preparation: channel order, render target alignment and resizing.

use image::{imageops, imageops::FilterType, RgbImage};
use marker_overlay_core::ImageSize;

use crate::config::InputOrder;

/// Upper bound on widening steps in [`aligned_width`]. A single step always
/// suffices; the bound keeps the loop finite no matter what.
const MAX_ALIGN_STEPS: usize = 4;

/// Width of a render target whose packed RGB rows (3 bytes per pixel) are a
/// multiple of 4 bytes, i.e. need no row padding.
///
/// Widths that already satisfy `width * 3 % 4 == 0` are returned unchanged;
/// otherwise the width grows by `width * 3 % 4` until it does (101 -> 104).
pub fn aligned_width(width: u32) -> u32 {
    let mut w = u64::from(width);
    for _ in 0..MAX_ALIGN_STEPS {
        let pad = w * 3 % 4;
        if pad == 0 {
            break;
        }
        w += pad;
    }
    let aligned = u32::try_from(w).unwrap_or(width);
    if aligned != width {
        log::debug!("render width {} widened to {}", width, aligned);
    }
    aligned
}

/// Swap the first and last channel of every pixel (BGR <-> RGB).
pub fn bgr_to_rgb(image: &RgbImage) -> RgbImage {
    let mut out = image.clone();
    for px in out.pixels_mut() {
        px.0.swap(0, 2);
    }
    out
}

/// Copy a captured frame and bring it to RGB channel order.
pub fn to_rgb(image: &RgbImage, order: InputOrder) -> RgbImage {
    match order {
        InputOrder::Bgr => bgr_to_rgb(image),
        InputOrder::Rgb => image.clone(),
    }
}

/// Resize `image` to `target`, bilinear.
///
/// Returns a copy when the sizes already match and an empty image when
/// either side is empty.
pub fn resize_to(image: &RgbImage, target: ImageSize) -> RgbImage {
    if target.is_empty() || image.width() == 0 || image.height() == 0 {
        return RgbImage::new(0, 0);
    }
    if image.dimensions() == (target.width, target.height) {
        return image.clone();
    }
    imageops::resize(image, target.width, target.height, FilterType::Triangle)
}

/// Copy, convert to RGB and resize a captured frame.
pub fn prepare_frame(image: &RgbImage, order: InputOrder, target: ImageSize) -> RgbImage {
    resize_to(&to_rgb(image, order), target)
}
