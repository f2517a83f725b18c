//! Predictor implementations for the three OCR stages.
//!
//! - Text detection (finding text regions in images)
//! - Text line classification (upright or upside down)
//! - Text recognition (reading the characters of a cropped line)
//!
//! Each predictor wraps a shared [`InferenceEngine`](crate::core::InferenceEngine)
//! together with the pre- and post-processing its model expects.

/// Text recognition predictor using CRNN (Convolutional Recurrent Neural Network)
pub mod crnn_recognizer;

/// Text detection predictor using DB (Differentiable Binarization) algorithm
pub mod db_detector;

/// Text line classifier for 0/180 degree orientation
pub mod text_line_classifier;

pub use crnn_recognizer::{RecognitionOutput, TextRecognizer};
pub use db_detector::{DetectionOutput, TextDetector};
pub use text_line_classifier::TextClassifier;
