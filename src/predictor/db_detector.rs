//! DB (Differentiable Binarization) Text Detector
//!
//! This module turns a whole image into an ordered list of text-line quads:
//! resize to a multiple of 32, normalize, run the detection engine, binarize
//! its probability map into contours, then filter and sort the resulting boxes
//! into reading order.

use crate::core::config::DetConfig;
use crate::core::constants::DEFAULT_SAME_ROW_TOLERANCE;
use crate::core::{InferenceEngine, OCRError, Tensor4D, TensorD};
use crate::processors::{
    DBPostProcess, DetResizeForTest, NormalizeImage, Quad, filter_det_boxes, reading_order,
};
use image::RgbImage;
use ndarray::{Axis, Ix4};
use std::sync::Arc;
use tracing::debug;

/// Detected text regions of one image, in reading order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionOutput {
    /// Region quads in source-image pixels.
    pub boxes: Vec<Quad>,
    /// Mean probability of each region.
    pub scores: Vec<f32>,
}

impl DetectionOutput {
    /// Number of detected regions.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Whether nothing was detected.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

/// Text detection predictor built on a DB model.
#[derive(Debug, Clone)]
pub struct TextDetector {
    engine: Arc<dyn InferenceEngine>,
    resize: DetResizeForTest,
    normalize: NormalizeImage,
    postprocess: DBPostProcess,
}

impl TextDetector {
    /// Creates a detector around an inference engine.
    pub fn new(engine: Arc<dyn InferenceEngine>, config: &DetConfig) -> Self {
        Self {
            engine,
            resize: DetResizeForTest::from_config(config),
            normalize: NormalizeImage::symmetric(),
            postprocess: DBPostProcess::from_config(config),
        }
    }

    /// Name of the underlying model.
    pub fn model_name(&self) -> &str {
        self.engine.name()
    }

    /// Detects text regions in `image`.
    ///
    /// `box_thresh` and `unclip_ratio` are the per-call DB settings.
    ///
    /// # Errors
    ///
    /// Fails if the engine fails or returns something other than a
    /// `1 x 1 x h x w` probability map.
    pub fn detect(
        &self,
        image: &RgbImage,
        box_thresh: f32,
        unclip_ratio: f32,
    ) -> Result<DetectionOutput, OCRError> {
        let (src_w, src_h) = image.dimensions();
        let input = self.preprocess(image)?;
        let output = self.engine.run(&input)?;
        let pred = self.prob_map(output)?;

        let pred_view = pred.index_axis(Axis(0), 0);
        let pred_map = pred_view.index_axis(Axis(0), 0);
        let (boxes, scores) =
            self.postprocess
                .apply(&pred_map, src_w, src_h, box_thresh, unclip_ratio);
        let candidates = boxes.len();
        let (boxes, scores) = filter_det_boxes(boxes, scores, src_w, src_h);

        let order = reading_order(&boxes, DEFAULT_SAME_ROW_TOLERANCE);
        let output = DetectionOutput {
            boxes: order.iter().map(|&i| boxes[i]).collect(),
            scores: order.iter().map(|&i| scores[i]).collect(),
        };

        debug!(
            "Detection on {}x{} image: {} candidates, {} regions kept",
            src_w,
            src_h,
            candidates,
            output.len()
        );
        Ok(output)
    }

    fn preprocess(&self, image: &RgbImage) -> Result<Tensor4D, OCRError> {
        let (resized, _) = self.resize.apply(image);
        self.normalize.normalize_to(&resized)
    }

    fn prob_map(&self, output: TensorD) -> Result<ndarray::Array4<f32>, OCRError> {
        let shape = output.shape().to_vec();
        let pred = output.into_dimensionality::<Ix4>().map_err(|_| {
            OCRError::output_shape_error(self.engine.name(), "[1, 1, h, w]", &shape)
        })?;
        if pred.shape()[0] == 0 || pred.shape()[1] == 0 {
            return Err(OCRError::output_shape_error(
                self.engine.name(),
                "[1, 1, h, w]",
                &shape,
            ));
        }
        Ok(pred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns each pixel's normalized brightness as its text probability.
    #[derive(Debug)]
    struct BrightnessEngine;

    impl InferenceEngine for BrightnessEngine {
        fn run(&self, input: &Tensor4D) -> Result<TensorD, OCRError> {
            let red = input.index_axis(Axis(1), 0).insert_axis(Axis(1));
            Ok(red.mapv(|v| (v + 1.0) / 2.0).into_dyn())
        }

        fn name(&self) -> &str {
            "brightness"
        }
    }

    #[derive(Debug)]
    struct FlatEngine;

    impl InferenceEngine for FlatEngine {
        fn run(&self, _input: &Tensor4D) -> Result<TensorD, OCRError> {
            Ok(ndarray::ArrayD::zeros(ndarray::IxDyn(&[4, 4])))
        }

        fn name(&self) -> &str {
            "flat"
        }
    }

    fn page_with_lines(lines: &[(u32, u32, u32, u32)]) -> RgbImage {
        let mut img = RgbImage::new(320, 320);
        for &(x1, y1, x2, y2) in lines {
            for y in y1..y2 {
                for x in x1..x2 {
                    img.put_pixel(x, y, image::Rgb([255, 255, 255]));
                }
            }
        }
        img
    }

    fn detector(engine: Arc<dyn InferenceEngine>) -> TextDetector {
        let config = DetConfig {
            limit_side_len: 320,
            ..DetConfig::default()
        };
        TextDetector::new(engine, &config)
    }

    #[test]
    fn test_detects_lines_in_reading_order() {
        let img = page_with_lines(&[(200, 40, 300, 60), (20, 42, 150, 62), (20, 200, 280, 230)]);
        let output = detector(Arc::new(BrightnessEngine))
            .detect(&img, 0.5, 1.6)
            .unwrap();
        assert_eq!(output.len(), 3);
        assert!(output.boxes[0].x_min() < 20.0);
        assert!(output.boxes[1].x_min() > 150.0);
        assert!(output.boxes[2].y_min() > 150.0);
        assert!(output.scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_black_image_has_no_regions() {
        let output = detector(Arc::new(BrightnessEngine))
            .detect(&RgbImage::new(320, 320), 0.5, 1.6)
            .unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_wrong_output_rank_is_error() {
        let err = detector(Arc::new(FlatEngine))
            .detect(&RgbImage::new(64, 64), 0.5, 1.6)
            .unwrap_err();
        assert!(matches!(err, OCRError::InvalidInput { .. }));
    }
}
