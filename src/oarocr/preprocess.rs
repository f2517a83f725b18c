//! # Stage Definition: Image Preprocessing
//!
//! This service is considered "Done" when it fulfills the following contract:
//!
//! - **Inputs**: The decoded `RgbImage` of one call.
//! - **Outputs**: The working image handed to detection, and an [`OpRecord`]
//!   of every geometric operation applied to produce it.
//! - **Logging**: Traces each resize and padding step.
//! - **Invariants**:
//!     - Replaying the record in reverse maps working-image points back into
//!       the original image, clamped to its extent.
//!     - Sides produced by a bounds resize are multiples of 32.

use crate::core::{OCRError, SimpleError};
use crate::processors::{Point, Quad};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use tracing::debug;

/// One geometric operation applied to the working image.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ImageOp {
    /// Resized; ratios are original size over new size.
    Resize { ratio_w: f32, ratio_h: f32 },
    /// Padded by `top` rows and `left` columns.
    Pad { top: u32, left: u32 },
}

/// Ordered log of the operations applied to the working image.
#[derive(Debug, Clone, PartialEq)]
pub struct OpRecord {
    ops: Vec<ImageOp>,
    original_width: u32,
    original_height: u32,
}

impl OpRecord {
    /// Starts a record for an original image of the given size.
    pub fn new(original_width: u32, original_height: u32) -> Self {
        Self {
            ops: Vec::new(),
            original_width,
            original_height,
        }
    }

    /// Records a resize from `from` to `to` (both `(width, height)`).
    pub fn push_resize(&mut self, from: (u32, u32), to: (u32, u32)) {
        if from == to {
            return;
        }
        self.ops.push(ImageOp::Resize {
            ratio_w: from.0 as f32 / to.0 as f32,
            ratio_h: from.1 as f32 / to.1 as f32,
        });
    }

    /// Records padding added above and to the left of the image.
    pub fn push_padding(&mut self, top: u32, left: u32) {
        if top == 0 && left == 0 {
            return;
        }
        self.ops.push(ImageOp::Pad { top, left });
    }

    /// Whether no operation was recorded.
    pub fn is_identity(&self) -> bool {
        self.ops.is_empty()
    }

    /// Maps a working-image point back into the original image.
    pub fn restore_point(&self, point: Point) -> Point {
        let (mut x, mut y) = (point.x, point.y);
        for op in self.ops.iter().rev() {
            match *op {
                ImageOp::Pad { top, left } => {
                    x -= left as f32;
                    y -= top as f32;
                }
                ImageOp::Resize { ratio_w, ratio_h } => {
                    x *= ratio_w;
                    y *= ratio_h;
                }
            }
        }
        Point::new(
            x.clamp(0.0, self.original_width as f32),
            y.clamp(0.0, self.original_height as f32),
        )
    }

    /// Maps every corner of a quad back into the original image.
    pub fn restore_quad(&self, quad: &Quad) -> Quad {
        Quad::new(quad.points.map(|p| self.restore_point(p)))
    }

    /// Maps a list of quads back into the original image.
    pub fn restore_points(&self, quads: &[Quad]) -> Vec<Quad> {
        quads.iter().map(|q| self.restore_quad(q)).collect()
    }
}

fn round_to_32(value: f32) -> u32 {
    ((value / 32.0).round() * 32.0) as u32
}

fn scaled_size(width: u32, height: u32, ratio: f32) -> Result<(u32, u32), OCRError> {
    let new_w = round_to_32((width as f32 * ratio).trunc());
    let new_h = round_to_32((height as f32 * ratio).trunc());
    if new_w == 0 || new_h == 0 {
        return Err(OCRError::resize_error(
            "image collapses when fitted to the side bounds",
            SimpleError::new(format!(
                "{width}x{height} scaled by {ratio} gives {new_w}x{new_h}"
            )),
        ));
    }
    Ok((new_w, new_h))
}

/// Fits an image between `min_side_len` and `max_side_len`.
///
/// An image whose longer side exceeds `max_side_len` is shrunk; one whose
/// shorter side is below `min_side_len` is then enlarged. Both steps round the
/// new sides to multiples of 32 and are logged in `record`. Images already
/// within bounds are returned unchanged.
///
/// # Errors
///
/// Fails when a side would round down to zero.
pub fn resize_within_bounds(
    image: RgbImage,
    min_side_len: u32,
    max_side_len: u32,
    record: &mut OpRecord,
) -> Result<RgbImage, OCRError> {
    let mut image = image;

    let (w, h) = image.dimensions();
    if w.max(h) > max_side_len {
        let ratio = max_side_len as f32 / w.max(h) as f32;
        let (new_w, new_h) = scaled_size(w, h, ratio)?;
        debug!("Shrinking {}x{} to {}x{}", w, h, new_w, new_h);
        image = imageops::resize(&image, new_w, new_h, FilterType::Triangle);
        record.push_resize((w, h), (new_w, new_h));
    }

    let (w, h) = image.dimensions();
    if w.min(h) < min_side_len {
        let ratio = min_side_len as f32 / w.min(h) as f32;
        let (new_w, new_h) = scaled_size(w, h, ratio)?;
        debug!("Enlarging {}x{} to {}x{}", w, h, new_w, new_h);
        image = imageops::resize(&image, new_w, new_h, FilterType::Triangle);
        record.push_resize((w, h), (new_w, new_h));
    }

    Ok(image)
}

/// Rows of padding added above and below a letterboxed image.
fn padding_height(width: u32, height: u32, width_height_ratio: Option<f32>, min_height: u32) -> u32 {
    let from_ratio = width_height_ratio.map_or(0, |ratio| (width as f32 / ratio) as u32);
    let new_h = from_ratio.max(min_height) * 2;
    new_h.abs_diff(height) / 2
}

/// Pads short or very wide images with black rows above and below.
///
/// Applies when `height <= min_height`, or when `width / height` exceeds
/// `width_height_ratio` (`None` disables that rule). Returns the image
/// unchanged otherwise. The padding is logged in `record`.
pub fn maybe_add_letterbox(
    image: RgbImage,
    width_height_ratio: Option<f32>,
    min_height: u32,
    record: &mut OpRecord,
) -> RgbImage {
    let (w, h) = image.dimensions();
    let too_wide = width_height_ratio.is_some_and(|ratio| w as f32 / h as f32 > ratio);
    if h > min_height && !too_wide {
        return image;
    }

    let pad = padding_height(w, h, width_height_ratio, min_height);
    if pad == 0 {
        return image;
    }

    let mut padded = RgbImage::from_pixel(w, h + 2 * pad, Rgb([0, 0, 0]));
    imageops::replace(&mut padded, &image, 0, pad as i64);
    debug!("Letterboxed {}x{} with {} rows top and bottom", w, h, pad);
    record.push_padding(pad, 0);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_bounds_is_untouched() {
        let mut record = OpRecord::new(100, 60);
        let out = resize_within_bounds(RgbImage::new(100, 60), 30, 2000, &mut record).unwrap();
        assert_eq!(out.dimensions(), (100, 60));
        assert!(record.is_identity());
    }

    #[test]
    fn test_large_image_is_shrunk_to_multiples_of_32() {
        let mut record = OpRecord::new(4000, 1000);
        let out = resize_within_bounds(RgbImage::new(4000, 1000), 30, 2000, &mut record).unwrap();
        assert_eq!(out.dimensions(), (2016, 512));

        let p = record.restore_point(Point::new(2016.0, 512.0));
        assert!((p.x - 4000.0).abs() < 1e-2 && (p.y - 1000.0).abs() < 1e-2);
    }

    #[test]
    fn test_small_image_is_enlarged() {
        let mut record = OpRecord::new(40, 10);
        let out = resize_within_bounds(RgbImage::new(40, 10), 30, 2000, &mut record).unwrap();
        assert_eq!(out.dimensions(), (128, 32));
    }

    #[test]
    fn test_collapsing_resize_is_error() {
        let mut record = OpRecord::new(4000, 4);
        assert!(resize_within_bounds(RgbImage::new(4000, 4), 30, 2000, &mut record).is_err());
    }

    #[test]
    fn test_wide_strip_is_letterboxed() {
        let mut record = OpRecord::new(900, 40);
        let out = maybe_add_letterbox(RgbImage::new(900, 40), Some(8.0), 30, &mut record);
        // new_h = max(900 / 8, 30) * 2 = 224, pad = (224 - 40) / 2 = 92
        assert_eq!(out.dimensions(), (900, 224));

        let p = record.restore_point(Point::new(10.0, 92.0));
        assert_eq!(p, Point::new(10.0, 0.0));
        let below = record.restore_point(Point::new(10.0, 223.0));
        assert_eq!(below.y, 40.0);
    }

    #[test]
    fn test_short_image_is_letterboxed_without_ratio_rule() {
        let mut record = OpRecord::new(100, 20);
        let out = maybe_add_letterbox(RgbImage::new(100, 20), None, 30, &mut record);
        assert_eq!(out.dimensions(), (100, 60));
    }

    #[test]
    fn test_regular_page_is_not_letterboxed() {
        let mut record = OpRecord::new(300, 200);
        let out = maybe_add_letterbox(RgbImage::new(300, 200), Some(8.0), 30, &mut record);
        assert_eq!(out.dimensions(), (300, 200));
        assert!(record.is_identity());
    }

    #[test]
    fn test_restore_replays_in_reverse() {
        let mut record = OpRecord::new(400, 100);
        record.push_resize((400, 100), (800, 200));
        record.push_padding(50, 0);
        let quad = Quad::from_rect(100.0, 50.0, 300.0, 150.0);
        let restored = record.restore_points(&[quad]);
        assert_eq!(restored[0], Quad::from_rect(50.0, 0.0, 150.0, 50.0));
    }
}
