//! Error types for the OCR pipeline.
//!
//! This module defines the error types that can occur while running the OCR pipeline:
//! image ingestion failures, processing errors, inference errors and configuration
//! errors. It also provides helper constructors that attach context to these errors.

use std::path::PathBuf;
use thiserror::Error;

/// Enum representing different stages of processing in the OCR pipeline.
///
/// This enum is used to identify which stage of the OCR pipeline an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Error occurred during tensor operations.
    TensorOperation,
    /// Error occurred during image resizing.
    Resize,
    /// Error occurred while cropping a text region.
    Cropping,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::TensorOperation => write!(f, "tensor operation"),
            ProcessingStage::Resize => write!(f, "resize"),
            ProcessingStage::Cropping => write!(f, "cropping"),
        }
    }
}

/// The single error kind raised when an input cannot be turned into an RGB pixel grid.
///
/// It is always raised before any model is invoked.
#[derive(Error, Debug)]
pub enum LoadImageError {
    /// The input carried no data at all (empty path, empty buffer, empty array).
    #[error("input image is empty")]
    Empty,

    /// A file path could not be opened or decoded.
    #[error("cannot load image from '{}'", path.display())]
    Unreadable {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying decoder or IO error.
        #[source]
        source: image::ImageError,
    },

    /// An encoded byte buffer could not be decoded.
    #[error("cannot decode image bytes ({len} bytes)")]
    Undecodable {
        /// Size of the rejected buffer.
        len: usize,
        /// Underlying decoder error.
        #[source]
        source: image::ImageError,
    },

    /// An in-memory array has a rank or channel count the loader cannot interpret.
    #[error("unsupported image array shape {shape:?}")]
    UnsupportedShape {
        /// Shape of the rejected array.
        shape: Vec<usize>,
    },
}

/// A plain message error used as the source of wrapped failures.
#[derive(Debug, Clone)]
pub struct SimpleError {
    message: String,
}

impl SimpleError {
    /// Creates a new simple error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SimpleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SimpleError {}

/// Enum representing various errors that can occur in the OCR pipeline.
#[derive(Error, Debug)]
pub enum OCRError {
    /// The input could not be normalized into an RGB image.
    #[error(transparent)]
    LoadImage(#[from] LoadImageError),

    /// Error occurred during processing.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A model invocation failed inside an inference engine.
    #[error("inference failed for model '{model_name}': {context}")]
    Inference {
        /// Name of the model that failed.
        model_name: String,
        /// Additional context about the failure.
        context: String,
        /// The backend error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error indicating invalid input, such as a malformed model output.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error from the ONNX Runtime session.
    #[cfg(feature = "ort-backend")]
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from tensor operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("json")]
    Json(#[from] serde_json::Error),
}

impl OCRError {
    /// Creates an OCRError for tensor operations.
    ///
    /// # Arguments
    ///
    /// * `context` - Additional context about the error.
    /// * `error` - The underlying error that caused this error.
    pub fn tensor_operation(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_error(ProcessingStage::TensorOperation, context, error)
    }

    /// Creates an OCRError for resize operations.
    pub fn resize_error(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_error(ProcessingStage::Resize, context, error)
    }

    /// Creates an OCRError for a region crop that cannot be taken.
    pub fn cropping(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_error(ProcessingStage::Cropping, context, error)
    }

    /// Creates an OCRError for processing operations.
    ///
    /// # Arguments
    ///
    /// * `kind` - The stage of processing where the error occurred.
    /// * `context` - Additional context about the error.
    /// * `error` - The underlying error that caused this error.
    ///
    /// # Returns
    ///
    /// An OCRError instance.
    pub fn processing_error(
        kind: ProcessingStage,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates an OCRError for a failed model invocation.
    ///
    /// # Arguments
    ///
    /// * `model_name` - Name of the model that failed.
    /// * `context` - Additional context about the failure.
    /// * `error` - The backend error.
    pub fn inference_error(
        model_name: &str,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Inference {
            model_name: model_name.to_string(),
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates an OCRError for invalid input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an OCRError for configuration errors.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Creates an OCRError for configuration errors with context.
    ///
    /// # Arguments
    ///
    /// * `field` - The field where the error occurred.
    /// * `value` - The value of the field.
    /// * `reason` - The reason for the error.
    pub fn config_error_with_context(field: &str, value: &str, reason: &str) -> Self {
        Self::ConfigError {
            message: format!(
                "Configuration error in field '{}' with value '{}': {}",
                field, value, reason
            ),
        }
    }

    /// Creates an OCRError for a stage that is enabled but has no engine attached.
    pub fn missing_engine(stage: &str) -> Self {
        Self::ConfigError {
            message: format!("{stage} is enabled but no {stage} engine was configured"),
        }
    }

    /// Creates an OCRError for an engine output whose shape does not match expectations.
    ///
    /// # Arguments
    ///
    /// * `model_name` - Name of the model that produced the output.
    /// * `expected` - Human-readable description of the expected layout.
    /// * `actual` - The shape that was actually returned.
    pub fn output_shape_error(model_name: &str, expected: &str, actual: &[usize]) -> Self {
        Self::InvalidInput {
            message: format!(
                "Model '{}' returned an output of shape {:?}, expected {}",
                model_name, actual, expected
            ),
        }
    }

    /// Returns true when this error is an ingestion failure.
    pub fn is_load_image_error(&self) -> bool {
        matches!(self, Self::LoadImage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_stage_display() {
        assert_eq!(ProcessingStage::Resize.to_string(), "resize");
        assert_eq!(ProcessingStage::TensorOperation.to_string(), "tensor operation");
        assert_eq!(ProcessingStage::Cropping.to_string(), "cropping");
    }

    #[test]
    fn test_load_image_error_converts() {
        let err: OCRError = LoadImageError::Empty.into();
        assert!(err.is_load_image_error());
        assert_eq!(err.to_string(), "input image is empty");
    }

    #[test]
    fn test_inference_error_keeps_source() {
        let err = OCRError::inference_error("det", "forward pass", SimpleError::new("boom"));
        assert!(!err.is_load_image_error());
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("boom"));
        assert!(err.to_string().contains("det"));
    }

    #[test]
    fn test_missing_engine_message() {
        let err = OCRError::missing_engine("recognition");
        assert!(matches!(err, OCRError::ConfigError { .. }));
        assert!(err.to_string().contains("recognition"));
    }
}
