//! Inference capability used by every model-backed stage.
//!
//! The pipeline only ever talks to [`InferenceEngine`]: one NCHW `f32` tensor in,
//! one dynamic-rank `f32` tensor out. Stage code validates the output layout it
//! expects, so any backend that can run a model on a tensor fits behind it.

#[cfg(feature = "ort-backend")]
pub mod ort_infer;

#[cfg(feature = "ort-backend")]
pub use ort_infer::OrtInfer;

use crate::core::batch::{Tensor4D, TensorD};
use crate::core::errors::OCRError;
use std::fmt::Debug;

/// Runs one model on a batch tensor.
///
/// Implementations must be safe to call from several threads at once; the
/// pipeline shares a single engine between concurrent runs.
pub trait InferenceEngine: Send + Sync + Debug {
    /// Runs the model on a `batch x channels x height x width` tensor.
    ///
    /// # Errors
    ///
    /// Backend failures are reported as [`OCRError::Inference`]. They are fatal
    /// for the current pipeline run and are never retried.
    fn run(&self, input: &Tensor4D) -> Result<TensorD, OCRError>;

    /// A short name for logs and error messages.
    fn name(&self) -> &str;
}

impl<T: InferenceEngine + ?Sized> InferenceEngine for std::sync::Arc<T> {
    fn run(&self, input: &Tensor4D) -> Result<TensorD, OCRError> {
        (**self).run(input)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: InferenceEngine + ?Sized> InferenceEngine for Box<T> {
    fn run(&self, input: &Tensor4D) -> Result<TensorD, OCRError> {
        (**self).run(input)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
