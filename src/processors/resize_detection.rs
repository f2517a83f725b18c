//! Image resizing for the text detection model.
//!
//! The detector accepts any input size that is a multiple of 32. [`DetResizeForTest`]
//! scales the image around `limit_side_len`, caps it at `max_side_limit` and
//! snaps both sides to multiples of 32.
//!
//! # Limit Types
//! - Max: Resize if the longest side exceeds the limit
//! - Min: Resize if the shortest side is below the limit

use crate::core::config::{DetConfig, LimitType};
use image::RgbImage;
use image::imageops::{self, FilterType};
use tracing::warn;

/// Resizes images for the detection model.
#[derive(Debug, Clone)]
pub struct DetResizeForTest {
    /// The length to limit the side of the image to
    pub limit_side_len: u32,
    /// Which side the limit applies to
    pub limit_type: LimitType,
    /// The maximum allowed side length
    pub max_side_limit: u32,
}

impl DetResizeForTest {
    /// Creates a resizer from the detection configuration.
    pub fn from_config(config: &DetConfig) -> Self {
        Self {
            limit_side_len: config.limit_side_len,
            limit_type: config.limit_type,
            max_side_limit: config.max_side_limit,
        }
    }

    /// Computes the target `(width, height)` for an image of the given size.
    pub fn target_size(&self, w: u32, h: u32) -> (u32, u32) {
        let limit = self.limit_side_len as f32;
        let ratio = match self.limit_type {
            LimitType::Max if h.max(w) as f32 > limit => limit / h.max(w) as f32,
            LimitType::Min if (h.min(w) as f32) < limit => limit / h.min(w).max(1) as f32,
            _ => 1.0,
        };

        let mut resize_h = (h as f32 * ratio) as u32;
        let mut resize_w = (w as f32 * ratio) as u32;

        if resize_h.max(resize_w) > self.max_side_limit {
            warn!(
                "Resized image size ({}x{}) exceeds max_side_limit of {}. Resizing to fit within limit.",
                resize_h, resize_w, self.max_side_limit
            );
            let limit_ratio = self.max_side_limit as f32 / resize_h.max(resize_w) as f32;
            resize_h = (resize_h as f32 * limit_ratio) as u32;
            resize_w = (resize_w as f32 * limit_ratio) as u32;
        }

        // Nearest multiple of 32, never below 32.
        resize_h = ((resize_h + 16) / 32 * 32).max(32);
        resize_w = ((resize_w + 16) / 32 * 32).max(32);
        (resize_w, resize_h)
    }

    /// Resizes an image, returning it with the `[ratio_h, ratio_w]` applied.
    pub fn apply(&self, img: &RgbImage) -> (RgbImage, [f32; 2]) {
        let (w, h) = img.dimensions();
        let (resize_w, resize_h) = self.target_size(w, h);

        if resize_w == w && resize_h == h {
            return (img.clone(), [1.0, 1.0]);
        }

        let resized = imageops::resize(img, resize_w, resize_h, FilterType::Triangle);
        (
            resized,
            [resize_h as f32 / h as f32, resize_w as f32 / w as f32],
        )
    }
}

impl Default for DetResizeForTest {
    fn default() -> Self {
        Self::from_config(&DetConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_limit_enlarges_short_side() {
        let resizer = DetResizeForTest::default();
        // 736 / 200 = 3.68 -> 1472 x 736
        assert_eq!(resizer.target_size(400, 200), (1472, 736));
    }

    #[test]
    fn test_min_limit_keeps_large_image_and_rounds() {
        let resizer = DetResizeForTest::default();
        assert_eq!(resizer.target_size(1000, 800), (992, 800));
    }

    #[test]
    fn test_max_limit_shrinks_long_side() {
        let resizer = DetResizeForTest {
            limit_side_len: 960,
            limit_type: LimitType::Max,
            max_side_limit: 4000,
        };
        assert_eq!(resizer.target_size(1920, 1080), (960, 544));
        assert_eq!(resizer.target_size(100, 40), (96, 32));
    }

    #[test]
    fn test_max_side_limit_caps_result() {
        let resizer = DetResizeForTest::default();
        // Short side 30 would need a 24.5x enlargement.
        let (w, h) = resizer.target_size(2000, 30);
        assert!(w <= 4000 + 16);
        assert!(h >= 32);
        assert_eq!(w % 32, 0);
        assert_eq!(h % 32, 0);
    }

    #[test]
    fn test_apply_reports_ratios() {
        let img = RgbImage::new(64, 32);
        let resizer = DetResizeForTest {
            limit_side_len: 64,
            limit_type: LimitType::Min,
            max_side_limit: 4000,
        };
        let (resized, [ratio_h, ratio_w]) = resizer.apply(&img);
        assert_eq!(resized.dimensions(), (128, 64));
        assert_eq!(ratio_h, 2.0);
        assert_eq!(ratio_w, 2.0);
    }
}
