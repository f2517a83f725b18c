//! Post-processing for DB (Differentiable Binarization) text detection models.
//!
//! The [`DBPostProcess`] struct converts a raw detection probability map into
//! quadrilateral text regions by thresholding, contour extraction, scoring and
//! unclipping. Bitmap handling, scoring and mask morphology live in helper
//! modules next to this file.

#[path = "db_bitmap.rs"]
mod db_bitmap;
#[path = "db_mask.rs"]
mod db_mask;
#[path = "db_score.rs"]
mod db_score;

use crate::core::config::{DetConfig, ScoreMode};
use crate::core::constants::{DEFAULT_DB_MIN_SIZE, DEFAULT_MIN_BOX_SIDE};
use crate::processors::geometry::{Quad, order_points_clockwise};
use image::{GrayImage, Luma};
use ndarray::ArrayView2;
use tracing::trace;

/// Post-processor for DB text detection models.
#[derive(Debug, Clone)]
pub struct DBPostProcess {
    /// Threshold for binarizing the prediction map (default: 0.3).
    pub thresh: f32,
    /// Maximum number of contours considered per image (default: 1000).
    pub max_candidates: usize,
    /// Minimum side length of a candidate before unclipping.
    pub min_size: f32,
    /// Method for calculating the score of a candidate.
    pub score_mode: ScoreMode,
    /// Whether to dilate the bitmap with a 2x2 kernel before contour extraction.
    pub use_dilation: bool,
}

impl Default for DBPostProcess {
    fn default() -> Self {
        Self::from_config(&DetConfig::default())
    }
}

impl DBPostProcess {
    /// Creates a post-processor from the detection configuration.
    pub fn from_config(config: &DetConfig) -> Self {
        Self {
            thresh: config.thresh,
            max_candidates: config.max_candidates,
            min_size: DEFAULT_DB_MIN_SIZE,
            score_mode: config.score_mode,
            use_dilation: config.use_dilation,
        }
    }

    /// Turns one probability map into scored quads in source-image pixels.
    ///
    /// `pred` is the `h x w` map produced for the resized image; boxes are
    /// rescaled to `src_width x src_height`.
    pub fn apply(
        &self,
        pred: &ArrayView2<f32>,
        src_width: u32,
        src_height: u32,
        box_thresh: f32,
        unclip_ratio: f32,
    ) -> (Vec<Quad>, Vec<f32>) {
        let (height, width) = pred.dim();
        if height == 0 || width == 0 {
            return (Vec::new(), Vec::new());
        }

        let mut bitmap = GrayImage::new(width as u32, height as u32);
        for ((y, x), &value) in pred.indexed_iter() {
            if value > self.thresh {
                bitmap.put_pixel(x as u32, y as u32, Luma([255]));
            }
        }

        let mask = if self.use_dilation {
            self.dilate_mask(&bitmap)
        } else {
            bitmap
        };

        self.boxes_from_bitmap(pred, &mask, src_width, src_height, box_thresh, unclip_ratio)
    }
}

/// Orders, clips and filters detected quads against the image extent.
///
/// Corners are put in clockwise order, clipped to `[0, width - 1] x [0, height - 1]`,
/// and boxes whose top or left edge is `DEFAULT_MIN_BOX_SIDE` pixels or shorter
/// are dropped together with their score.
pub fn filter_det_boxes(
    boxes: Vec<Quad>,
    scores: Vec<f32>,
    width: u32,
    height: u32,
) -> (Vec<Quad>, Vec<f32>) {
    let max_x = width.saturating_sub(1) as f32;
    let max_y = height.saturating_sub(1) as f32;

    let mut kept_boxes = Vec::with_capacity(boxes.len());
    let mut kept_scores = Vec::with_capacity(scores.len());
    for (quad, score) in boxes.into_iter().zip(scores) {
        let quad = order_points_clockwise(quad.points).clip(max_x, max_y);
        let [tl, tr, _, bl] = quad.points;
        let rect_width = tl.distance(&tr).trunc();
        let rect_height = tl.distance(&bl).trunc();
        if rect_width <= DEFAULT_MIN_BOX_SIDE || rect_height <= DEFAULT_MIN_BOX_SIDE {
            trace!(
                "dropping degenerate box {:?} ({}x{})",
                quad.to_coords(),
                rect_width,
                rect_height
            );
            continue;
        }
        kept_boxes.push(quad);
        kept_scores.push(score);
    }
    (kept_boxes, kept_scores)
}
