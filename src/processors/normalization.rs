//! Image normalization into model input tensors.
//!
//! Every stage feeds its model an NCHW `f32` tensor computed as
//! `value * alpha + beta` per channel, with `alpha = scale / std` and
//! `beta = -mean / std`. Images narrower than the tensor are left-aligned and
//! the remaining columns stay zero, which is the padding the recognition and
//! classification models were trained with.

use crate::core::{OCRError, Tensor4D};
use image::RgbImage;
use rayon::prelude::*;

/// Normalizes images into model input tensors.
#[derive(Debug, Clone)]
pub struct NormalizeImage {
    /// Scaling factors for each channel (alpha = scale / std)
    pub alpha: [f32; 3],
    /// Offset values for each channel (beta = -mean / std)
    pub beta: [f32; 3],
}

impl NormalizeImage {
    /// Creates a new NormalizeImage instance with the specified parameters.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `scale` or any `std` value is not positive.
    pub fn new(scale: f32, mean: [f32; 3], std: [f32; 3]) -> Result<Self, OCRError> {
        if scale <= 0.0 {
            return Err(OCRError::ConfigError {
                message: "Scale must be greater than 0".to_string(),
            });
        }

        for (i, &s) in std.iter().enumerate() {
            if s <= 0.0 {
                return Err(OCRError::ConfigError {
                    message: format!(
                        "Standard deviation at index {i} must be greater than 0, got {s}"
                    ),
                });
            }
        }

        let alpha = std.map(|s| scale / s);
        let beta = [0, 1, 2].map(|c| -mean[c] / std[c]);
        Ok(Self { alpha, beta })
    }

    /// Maps `[0, 255]` to `[-1, 1]`, the normalization used by all three models.
    pub fn symmetric() -> Self {
        Self {
            alpha: [2.0 / 255.0; 3],
            beta: [-1.0; 3],
        }
    }

    /// Normalizes a single image into a `1 x 3 x h x w` tensor.
    pub fn normalize_to(&self, img: &RgbImage) -> Result<Tensor4D, OCRError> {
        let (width, height) = img.dimensions();
        self.normalize_batch_to(std::slice::from_ref(img), width as usize, height as usize)
    }

    /// Normalizes a batch into a `n x 3 x height x width` tensor.
    ///
    /// Each image is written at the top-left corner of its slot; columns to the
    /// right of a narrower image stay zero.
    ///
    /// # Errors
    ///
    /// Returns an error if an image is taller or wider than the target tensor.
    pub fn normalize_batch_to(
        &self,
        imgs: &[RgbImage],
        width: usize,
        height: usize,
    ) -> Result<Tensor4D, OCRError> {
        let batch_size = imgs.len();
        let channels = 3;

        for (i, img) in imgs.iter().enumerate() {
            let (w, h) = img.dimensions();
            if w as usize > width || h as usize > height {
                return Err(OCRError::InvalidInput {
                    message: format!(
                        "Image {i} ({w}x{h}) does not fit a {width}x{height} batch tensor"
                    ),
                });
            }
        }

        let img_size = channels * height * width;
        let mut result = vec![0.0f32; batch_size * img_size];

        let fill = |(batch_idx, batch_slice): (usize, &mut [f32])| {
            let rgb_img = &imgs[batch_idx];
            for (x, y, pixel) in rgb_img.enumerate_pixels() {
                for c in 0..channels {
                    let dst_idx = c * height * width + y as usize * width + x as usize;
                    batch_slice[dst_idx] = pixel[c] as f32 * self.alpha[c] + self.beta[c];
                }
            }
        };

        if img_size > 0 {
            if batch_size <= 1 {
                // Avoid rayon overhead for single-image batches
                result.chunks_mut(img_size).enumerate().for_each(fill);
            } else {
                result.par_chunks_mut(img_size).enumerate().for_each(fill);
            }
        }

        ndarray::Array4::from_shape_vec((batch_size, channels, height, width), result).map_err(
            |e| {
                OCRError::tensor_operation(
                    "Failed to create batch normalization tensor in CHW format",
                    e,
                )
            },
        )
    }
}
