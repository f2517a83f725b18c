//! The core module of the OCR pipeline.
//!
//! This module contains the fundamental components of the OCR pipeline, including:
//! - Batch helpers and tensor aliases
//! - Configuration and per-call options
//! - Constants used throughout the pipeline
//! - Error handling
//! - The inference capability and the ONNX Runtime backend
//!
//! It also provides re-exports of commonly used types and functions for convenience.

pub mod batch;
pub mod config;
pub mod constants;
pub mod errors;
pub mod inference;

pub use batch::{BatchSampler, Tensor4D, TensorD};
pub use config::{
    ClsConfig, DetConfig, GlobalConfig, LimitType, LoaderConfig, OCRConfig, OrtSessionConfig,
    RecConfig, ResolvedOptions, RunOptions, ScoreMode, WordSegmentConfig,
};
pub use constants::*;
pub use errors::{LoadImageError, OCRError, ProcessingStage, SimpleError};
pub use inference::InferenceEngine;
#[cfg(feature = "ort-backend")]
pub use inference::OrtInfer;

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and formatting layer.
/// It's typically called at the start of an application to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
