//! CRNN text recognizer.
//!
//! Crops are resized to the model height, grouped by aspect ratio into padded
//! batches, run through the recognition engine and CTC-decoded. Besides the
//! text, every result keeps per-character confidences and output columns so
//! word boxes can be derived later.

use crate::core::config::RecConfig;
use crate::core::{BatchSampler, InferenceEngine, OCRError, TensorD};
use crate::processors::{CTCLabelDecode, DecodedText, NormalizeImage, OCRResize};
use image::RgbImage;
use ndarray::Ix3;
use std::sync::Arc;
use tracing::{debug, warn};

/// Recognition result for one crop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognitionOutput {
    /// Recognized text.
    pub text: String,
    /// Mean character confidence; 0 for empty text.
    pub score: f32,
    /// Confidence of each character of `text`.
    pub char_scores: Vec<f32>,
    /// Output column of each character of `text`.
    pub char_cols: Vec<usize>,
    /// Number of output columns covering the crop itself rather than padding.
    pub col_count: f32,
}

impl RecognitionOutput {
    fn from_decoded(decoded: DecodedText, content_fraction: f32) -> Self {
        Self {
            score: decoded.score(),
            col_count: decoded.seq_len as f32 * content_fraction,
            text: decoded.text,
            char_scores: decoded.char_scores,
            char_cols: decoded.char_cols,
        }
    }
}

/// Text recognition predictor built on a CTC model.
#[derive(Debug, Clone)]
pub struct TextRecognizer {
    engine: Arc<dyn InferenceEngine>,
    resize: OCRResize,
    normalize: NormalizeImage,
    sampler: BatchSampler,
    decoder: Arc<CTCLabelDecode>,
}

impl TextRecognizer {
    /// Creates a recognizer around an inference engine and a character dictionary.
    pub fn new(engine: Arc<dyn InferenceEngine>, config: &RecConfig, character_dict: &[String]) -> Self {
        Self {
            engine,
            resize: OCRResize::new(config.image_shape, config.max_img_width),
            normalize: NormalizeImage::symmetric(),
            sampler: BatchSampler::new(config.batch_num),
            decoder: Arc::new(CTCLabelDecode::from_string_list(
                character_dict,
                config.use_space_char,
            )),
        }
    }

    /// Name of the underlying model.
    pub fn model_name(&self) -> &str {
        self.engine.name()
    }

    /// Recognizes every crop, returning results in input order.
    ///
    /// # Errors
    ///
    /// Fails if the engine fails or its output is not `n x T x classes`.
    pub fn recognize(&self, crops: &[RgbImage]) -> Result<Vec<RecognitionOutput>, OCRError> {
        let mut results = vec![RecognitionOutput::default(); crops.len()];
        let height = self.resize.height();

        for batch in self.sampler.ratio_sorted_batches(crops) {
            let members: Vec<&RgbImage> = batch.iter().map(|&i| &crops[i]).collect();
            let width = self.resize.batch_width(self.resize.max_wh_ratio(&members));

            let resized = members
                .iter()
                .map(|img| self.resize.resize_img(img, width))
                .collect::<Result<Vec<_>, _>>()?;
            let input = self.normalize.normalize_batch_to(&resized, width, height)?;
            let output = self.engine.run(&input)?;
            let probs = self.probabilities(output, batch.len())?;

            let decoded = self.decoder.apply(&probs.view());
            for ((text, img), &idx) in decoded.into_iter().zip(&resized).zip(&batch) {
                let fraction = img.width() as f32 / width as f32;
                results[idx] = RecognitionOutput::from_decoded(text, fraction);
            }
        }

        debug!(
            "Recognized {} crops, {} non-empty",
            results.len(),
            results.iter().filter(|r| !r.text.is_empty()).count()
        );
        Ok(results)
    }

    fn probabilities(&self, output: TensorD, rows: usize) -> Result<ndarray::Array3<f32>, OCRError> {
        let shape = output.shape().to_vec();
        let expected = format!("[{}, T, {}]", rows, self.decoder.num_classes());
        let probs = output
            .into_dimensionality::<Ix3>()
            .map_err(|_| OCRError::output_shape_error(self.engine.name(), &expected, &shape))?;
        if probs.shape()[0] != rows {
            return Err(OCRError::output_shape_error(
                self.engine.name(),
                &expected,
                &shape,
            ));
        }
        if probs.shape()[2] != self.decoder.num_classes() {
            warn!(
                "Model '{}' emits {} classes but the dictionary has {}",
                self.engine.name(),
                probs.shape()[2],
                self.decoder.num_classes()
            );
        }
        Ok(probs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Tensor4D;

    /// Emits one column per 8 input pixels; bright columns read as class 1.
    #[derive(Debug)]
    struct ColumnEngine;

    impl InferenceEngine for ColumnEngine {
        fn run(&self, input: &Tensor4D) -> Result<TensorD, OCRError> {
            let (n, _, h, w) = input.dim();
            let cols = w / 8;
            let mut out = ndarray::Array3::<f32>::zeros((n, cols, 3));
            for i in 0..n {
                for t in 0..cols {
                    if input[[i, 0, h / 2, t * 8 + 4]] > 0.5 {
                        out[[i, t, 1]] = 0.9;
                    } else {
                        out[[i, t, 0]] = 0.8;
                    }
                }
            }
            Ok(out.into_dyn())
        }

        fn name(&self) -> &str {
            "columns"
        }
    }

    fn dict() -> Vec<String> {
        vec!["x".to_string(), "y".to_string()]
    }

    fn striped(w: u32, h: u32, bright: &[(u32, u32)]) -> RgbImage {
        RgbImage::from_fn(w, h, |x, _| {
            if bright.iter().any(|&(a, b)| x >= a && x < b) {
                image::Rgb([255, 255, 255])
            } else {
                image::Rgb([0, 0, 0])
            }
        })
    }

    #[test]
    fn test_recognize_keeps_input_order_and_columns() {
        let recognizer = TextRecognizer::new(Arc::new(ColumnEngine), &RecConfig::default(), &dict());
        let crops = vec![
            striped(480, 48, &[(0, 40), (200, 240)]),
            striped(96, 48, &[]),
        ];
        let results = recognizer.recognize(&crops).unwrap();
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].text, "xx");
        assert_eq!(results[0].char_cols, vec![0, 25]);
        assert!((results[0].score - 0.9).abs() < 1e-6);
        assert!((results[0].col_count - 60.0).abs() < 1e-3);

        assert!(results[1].text.is_empty());
        assert_eq!(results[1].score, 0.0);
    }

    #[test]
    fn test_wrong_batch_rows_is_error() {
        #[derive(Debug)]
        struct OneRowEngine;
        impl InferenceEngine for OneRowEngine {
            fn run(&self, _input: &Tensor4D) -> Result<TensorD, OCRError> {
                Ok(ndarray::Array3::<f32>::zeros((1, 4, 3)).into_dyn())
            }
            fn name(&self) -> &str {
                "one_row"
            }
        }

        let recognizer = TextRecognizer::new(Arc::new(OneRowEngine), &RecConfig::default(), &dict());
        let crops = vec![RgbImage::new(96, 48), RgbImage::new(96, 48)];
        assert!(recognizer.recognize(&crops).is_err());
    }
}
