//! Text line orientation classifier.
//!
//! Decides for each crop whether the text is upright (`"0"`) or upside down
//! (`"180"`), and flips confidently inverted crops in place.

use crate::core::config::ClsConfig;
use crate::core::{BatchSampler, InferenceEngine, OCRError, TensorD};
use crate::processors::{NormalizeImage, OCRResize};
use image::RgbImage;
use image::imageops;
use ndarray::Ix2;
use std::sync::Arc;
use tracing::debug;

/// Text line orientation classifier.
#[derive(Debug, Clone)]
pub struct TextClassifier {
    engine: Arc<dyn InferenceEngine>,
    resize: OCRResize,
    normalize: NormalizeImage,
    sampler: BatchSampler,
    labels: Vec<String>,
    thresh: f32,
}

impl TextClassifier {
    /// Creates a classifier around an inference engine.
    pub fn new(engine: Arc<dyn InferenceEngine>, config: &ClsConfig) -> Self {
        Self {
            engine,
            resize: OCRResize::new(config.image_shape, config.image_shape[2]),
            normalize: NormalizeImage::symmetric(),
            sampler: BatchSampler::new(config.batch_num),
            labels: config.labels.clone(),
            thresh: config.thresh,
        }
    }

    /// Name of the underlying model.
    pub fn model_name(&self) -> &str {
        self.engine.name()
    }

    /// Whether a `(label, score)` prediction turns the crop upside down.
    pub fn rotates(&self, label: &str, score: f32) -> bool {
        label.contains("180") && score > self.thresh
    }

    /// Classifies every crop and rotates inverted ones by 180 degrees.
    ///
    /// Returns one `(label, score)` per crop, in input order. A crop is rotated
    /// when its label is `"180"` and the score exceeds the threshold; the label
    /// is reported either way.
    ///
    /// # Errors
    ///
    /// Fails if the engine fails or its output is not `n x labels`.
    pub fn classify(&self, crops: &mut [RgbImage]) -> Result<Vec<(String, f32)>, OCRError> {
        let mut results = vec![(String::new(), 0.0f32); crops.len()];
        let width = self.resize.image_shape[2];
        let height = self.resize.height();

        for batch in self.sampler.ratio_sorted_batches(crops) {
            let resized = batch
                .iter()
                .map(|&i| self.resize.resize_img(&crops[i], width))
                .collect::<Result<Vec<_>, _>>()?;
            let input = self.normalize.normalize_batch_to(&resized, width, height)?;
            let output = self.engine.run(&input)?;
            let probs = self.probabilities(output, batch.len())?;

            for (row, &idx) in probs.outer_iter().zip(&batch) {
                let (label_idx, score) = row
                    .iter()
                    .copied()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |best, (i, p)| {
                        if p > best.1 { (i, p) } else { best }
                    });
                let label = self.labels[label_idx].clone();
                if self.rotates(&label, score) {
                    imageops::rotate180_in_place(&mut crops[idx]);
                }
                results[idx] = (label, score);
            }
        }

        debug!(
            "Classified {} crops, {} flipped",
            results.len(),
            results
                .iter()
                .filter(|(l, s)| self.rotates(l, *s))
                .count()
        );
        Ok(results)
    }

    fn probabilities(&self, output: TensorD, rows: usize) -> Result<ndarray::Array2<f32>, OCRError> {
        let shape = output.shape().to_vec();
        let expected = format!("[{}, {}]", rows, self.labels.len());
        let probs = output
            .into_dimensionality::<Ix2>()
            .map_err(|_| OCRError::output_shape_error(self.engine.name(), &expected, &shape))?;
        if probs.nrows() != rows || probs.ncols() != self.labels.len() {
            return Err(OCRError::output_shape_error(
                self.engine.name(),
                &expected,
                &shape,
            ));
        }
        Ok(probs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Tensor4D;
    use image::Rgb;

    /// Reports "180" for crops whose top-left pixel is bright.
    #[derive(Debug)]
    struct TopLeftEngine;

    impl InferenceEngine for TopLeftEngine {
        fn run(&self, input: &Tensor4D) -> Result<TensorD, OCRError> {
            let n = input.shape()[0];
            let mut out = ndarray::Array2::<f32>::zeros((n, 2));
            for i in 0..n {
                if input[[i, 0, 0, 0]] > 0.0 {
                    out[[i, 1]] = 0.95;
                    out[[i, 0]] = 0.05;
                } else {
                    out[[i, 0]] = 0.99;
                    out[[i, 1]] = 0.01;
                }
            }
            Ok(out.into_dyn())
        }

        fn name(&self) -> &str {
            "top_left"
        }
    }

    fn crop(w: u32, h: u32, bright_top_left: bool) -> RgbImage {
        let mut img = RgbImage::new(w, h);
        if bright_top_left {
            img.put_pixel(0, 0, Rgb([255, 255, 255]));
        }
        img
    }

    #[test]
    fn test_inverted_crops_are_rotated_in_order() {
        let classifier = TextClassifier::new(Arc::new(TopLeftEngine), &ClsConfig::default());
        let mut crops = vec![
            crop(200, 20, false),
            crop(40, 20, true),
            crop(100, 20, false),
        ];
        let results = classifier.classify(&mut crops).unwrap();

        assert_eq!(results[0].0, "0");
        assert_eq!(results[1].0, "180");
        assert_eq!(results[2].0, "0");
        assert!((results[1].1 - 0.95).abs() < 1e-6);

        // Rotated: the bright pixel moved to the bottom-right corner.
        assert_eq!(crops[1].get_pixel(39, 19), &Rgb([255, 255, 255]));
        assert_eq!(crops[1].get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_low_confidence_inversion_is_not_rotated() {
        let config = ClsConfig {
            thresh: 0.97,
            ..ClsConfig::default()
        };
        let classifier = TextClassifier::new(Arc::new(TopLeftEngine), &config);
        let mut crops = vec![crop(40, 20, true)];
        let results = classifier.classify(&mut crops).unwrap();
        assert_eq!(results[0].0, "180");
        assert_eq!(crops[0].get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_empty_input() {
        let classifier = TextClassifier::new(Arc::new(TopLeftEngine), &ClsConfig::default());
        assert!(classifier.classify(&mut []).unwrap().is_empty());
    }
}
