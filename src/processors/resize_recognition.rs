//! Fixed-height resizing for the classification and recognition models.
//!
//! Both models take crops of a fixed height. A crop keeps its aspect ratio and
//! is only squeezed horizontally when it would not fit the batch width; the
//! rest of the batch slot is zero padding added during normalization.

use crate::core::OCRError;
use crate::core::batch::wh_ratio;
use image::RgbImage;
use image::imageops::{self, FilterType};

/// Fixed-height resizer for text line crops.
#[derive(Debug, Clone)]
pub struct OCRResize {
    /// Model input shape as (channels, height, width).
    pub image_shape: [usize; 3],
    /// Upper bound on the batch width.
    pub max_img_w: usize,
}

impl OCRResize {
    /// Creates a new resizer.
    pub fn new(image_shape: [usize; 3], max_img_w: usize) -> Self {
        Self {
            image_shape,
            max_img_w: max_img_w.max(image_shape[2]),
        }
    }

    /// Target height of every resized crop.
    pub fn height(&self) -> usize {
        self.image_shape[1]
    }

    /// The width/height ratio of the configured input shape.
    pub fn base_ratio(&self) -> f32 {
        self.image_shape[2] as f32 / self.image_shape[1] as f32
    }

    /// The widest width/height ratio of a batch, never below the base ratio.
    pub fn max_wh_ratio(&self, imgs: &[&RgbImage]) -> f32 {
        imgs.iter()
            .map(|img| wh_ratio(img))
            .fold(self.base_ratio(), f32::max)
    }

    /// Tensor width for a batch whose widest ratio is `max_wh_ratio`.
    pub fn batch_width(&self, max_wh_ratio: f32) -> usize {
        ((self.height() as f32 * max_wh_ratio) as usize).clamp(1, self.max_img_w)
    }

    /// Resizes a crop to the model height, at most `target_w` wide.
    ///
    /// # Errors
    ///
    /// Returns a resize error for crops with a zero dimension.
    pub fn resize_img(&self, img: &RgbImage, target_w: usize) -> Result<RgbImage, OCRError> {
        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return Err(OCRError::resize_error(
                "cannot resize an empty crop",
                crate::core::SimpleError::new(format!("crop size {w}x{h}")),
            ));
        }

        let img_h = self.height();
        let ratio = w as f32 / h as f32;
        let resized_w = ((img_h as f32 * ratio).ceil() as usize).clamp(1, target_w.max(1));

        // Triangle matches bilinear interpolation.
        Ok(imageops::resize(
            img,
            resized_w as u32,
            img_h as u32,
            FilterType::Triangle,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_width_uses_base_ratio_for_narrow_crops() {
        let resizer = OCRResize::new([3, 48, 320], 3200);
        let narrow = RgbImage::new(40, 40);
        let ratio = resizer.max_wh_ratio(&[&narrow]);
        assert!((ratio - 320.0 / 48.0).abs() < 1e-6);
        assert_eq!(resizer.batch_width(ratio), 320);
    }

    #[test]
    fn test_batch_width_grows_with_wide_crops_and_caps() {
        let resizer = OCRResize::new([3, 48, 320], 3200);
        let wide = RgbImage::new(500, 50);
        let ratio = resizer.max_wh_ratio(&[&wide]);
        assert_eq!(resizer.batch_width(ratio), 480);
        assert_eq!(resizer.batch_width(1000.0), 3200);
    }

    #[test]
    fn test_resize_keeps_ratio_within_width() {
        let resizer = OCRResize::new([3, 48, 192], 192);
        let img = RgbImage::new(100, 50);
        assert_eq!(resizer.resize_img(&img, 192).unwrap().dimensions(), (96, 48));

        let long = RgbImage::new(1000, 50);
        assert_eq!(resizer.resize_img(&long, 192).unwrap().dimensions(), (192, 48));
    }

    #[test]
    fn test_resize_rejects_empty_crop() {
        let resizer = OCRResize::new([3, 48, 320], 3200);
        assert!(resizer.resize_img(&RgbImage::new(0, 10), 320).is_err());
    }
}
