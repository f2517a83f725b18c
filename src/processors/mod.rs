//! Image processing utilities for the OCR pipeline.
//!
//! This module provides the pre- and post-processing steps that sit around the
//! three models: resizing, normalization, geometric operations, DB detection
//! post-processing and CTC decoding.
//!
//! # Modules
//!
//! * `decode` - CTC decoding of recognition output into text and character positions
//! * `geometry` - Points, quads, minimum-area rectangles and reading-order sorting
//! * `normalization` - Image normalization into NCHW tensors
//! * `db_postprocess` - DB detection post-processing
//! * `resize_detection` - Resizing for the detection model
//! * `resize_recognition` - Fixed-height resizing for classification and recognition

pub mod db_postprocess;
mod decode;
mod geometry;
mod normalization;
pub mod resize_detection;
pub mod resize_recognition;

pub use db_postprocess::*;
pub use decode::*;
pub use geometry::*;
pub use normalization::*;
pub use resize_detection::*;
pub use resize_recognition::*;
