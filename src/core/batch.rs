//! Batch helpers for the OCR pipeline.
//!
//! Crops are grouped into batches before they are handed to the classification
//! and recognition engines. Grouping follows width/height ratio so crops of
//! similar shape share one padded input, and every batch remembers the original
//! positions of its members so results can be written back in input order.

use image::RgbImage;
use itertools::Itertools;

/// A 4-dimensional tensor represented as a 4D array of f32 values.
pub type Tensor4D = ndarray::Array4<f32>;

/// A dynamic-dimensional tensor, as returned by inference engines.
pub type TensorD = ndarray::ArrayD<f32>;

/// Splits a set of crops into batches ordered by ascending width/height ratio.
#[derive(Debug, Clone, Copy)]
pub struct BatchSampler {
    batch_size: usize,
}

impl BatchSampler {
    /// Creates a new sampler. A batch size of zero is treated as one.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Returns the batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns batches of original indices, sorted by width/height ratio.
    ///
    /// Ties keep their input order, so the grouping is deterministic.
    pub fn ratio_sorted_batches(&self, images: &[RgbImage]) -> Vec<Vec<usize>> {
        let order: Vec<usize> = (0..images.len())
            .sorted_by(|&a, &b| {
                wh_ratio(&images[a])
                    .partial_cmp(&wh_ratio(&images[b]))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .collect();

        order
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect()
    }
}

/// Width over height of an image; zero-height images report 0.
pub fn wh_ratio(image: &RgbImage) -> f32 {
    if image.height() == 0 {
        return 0.0;
    }
    image.width() as f32 / image.height() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_sorted_batches() {
        let images = vec![
            RgbImage::new(100, 10),
            RgbImage::new(20, 10),
            RgbImage::new(50, 10),
            RgbImage::new(20, 10),
        ];
        let sampler = BatchSampler::new(3);
        let batches = sampler.ratio_sorted_batches(&images);
        assert_eq!(batches, vec![vec![1, 3, 2], vec![0]]);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let sampler = BatchSampler::new(0);
        assert_eq!(sampler.batch_size(), 1);
        let batches = sampler.ratio_sorted_batches(&[RgbImage::new(4, 4), RgbImage::new(8, 4)]);
        assert_eq!(batches.len(), 2);
    }

    #[test]
    fn test_wh_ratio() {
        assert_eq!(wh_ratio(&RgbImage::new(30, 10)), 3.0);
        assert_eq!(wh_ratio(&RgbImage::new(30, 0)), 0.0);
    }
}
