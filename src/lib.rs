//! # Rapid OCR
//!
//! A Rust OCR library that extracts text from images by chaining three models:
//! text detection, text line orientation classification and text recognition.
//!
//! ## Features
//!
//! - Complete OCR pipeline from image to text, boxes and scores
//! - Per-call stage toggles and thresholds over one immutable pipeline
//! - Letterboxing of wide strips and bounds resizing, undone on the output
//! - Optional word and CJK character boxes derived from CTC columns
//! - Pluggable inference through the [`InferenceEngine`](core::InferenceEngine) trait
//! - ONNX Runtime integration behind the default `ort-backend` feature
//!
//! ## Modules
//!
//! * [`core`] - Configuration, errors, tensors and the inference capability
//! * [`processors`] - Geometry, resizing, normalization, DB post-processing and CTC decoding
//! * [`predictor`] - Detection, classification and recognition predictors
//! * [`oarocr`] - The pipeline orchestrator and its results
//! * [`utils`] - Image loading, perspective crops and dictionaries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rapid_ocr::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ocr = OCRPipelineBuilder::new()
//!     .det_model("models/det.onnx")
//!     .cls_model("models/cls.onnx")
//!     .rec_model("models/rec.onnx")
//!     .character_dict_path("models/dict.txt")
//!     .build()?;
//!
//! let output = ocr.run("document.jpg", &RunOptions::new().return_word_box(true))?;
//! for item in output.iter() {
//!     println!("{:?} {:?}", item.text, item.score);
//! }
//! println!("{}", output.to_json()?);
//! # Ok(())
//! # }
//! ```
//!
//! ### JSON Configuration
//!
//! ```rust,no_run
//! use rapid_ocr::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OCRConfig::from_json_str(r#"
//! {
//!   "global": { "text_score": 0.6, "width_height_ratio": null },
//!   "det": { "limit_side_len": 960, "limit_type": "max" }
//! }
//! "#)?;
//!
//! let ocr = OCRPipelineBuilder::new()
//!     .config(config)
//!     .det_model("models/det.onnx")
//!     .build()?;
//! let detected = ocr.run("document.jpg", &RunOptions::new().use_cls(false).use_rec(false))?;
//! println!("{} regions", detected.len());
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod core;
pub mod oarocr;
pub mod predictor;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// Bring the essentials into scope with a single use statement:
///
/// ```rust
/// use rapid_ocr::prelude::*;
/// ```
///
/// Included items focus on the most common tasks:
/// - The pipeline (`OCRPipelineBuilder`, `OCRPipeline`, `RunOptions`, `OCRConfig`)
/// - Results (`OCROutput`, `OCRItem`, `Quad`)
/// - Essential error type (`OCRError`)
/// - Input and image loading (`ImageInput`, `load_image`)
///
/// For custom engines or individual stages, import directly from the
/// respective modules (e.g., `rapid_ocr::core`, `rapid_ocr::predictor`).
pub mod prelude {
    pub use crate::core::{InferenceEngine, OCRConfig, OCRError, RunOptions};
    pub use crate::oarocr::{OCRItem, OCROutput, OCRPipeline, OCRPipelineBuilder, WordBox};
    pub use crate::processors::{Point, Quad};
    pub use crate::utils::{ImageInput, load_image};
}
