//! The OCR pipeline module.
//!
//! This module ties the stage predictors together: it prepares the working
//! image, runs detection, orientation classification and recognition in a
//! fixed order, derives optional word boxes, and maps everything back into
//! the coordinates of the input image.

mod ocr;
mod preprocess;
mod result;
mod word_boxes;

pub use ocr::{OCRPipeline, OCRPipelineBuilder};
pub use preprocess::{OpRecord, maybe_add_letterbox, resize_within_bounds};
pub use result::{Elapse, OCRItem, OCROutput};
pub use word_boxes::{WordBox, is_cjk, segment_words};
