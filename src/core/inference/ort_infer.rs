//! ONNX Runtime backend with a pool of sessions.

use crate::core::batch::{Tensor4D, TensorD};
use crate::core::config::OrtSessionConfig;
use crate::core::errors::{OCRError, SimpleError};
use crate::core::inference::InferenceEngine;
use ort::logging::LogLevel;
use ort::session::Session;
use ort::session::builder::SessionBuilder;
use ort::value::TensorRef;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// An [`InferenceEngine`] backed by ONNX Runtime.
///
/// Calls are spread round-robin over `session_pool_size` sessions so that
/// concurrent pipeline runs do not serialize on a single session lock.
pub struct OrtInfer {
    sessions: Vec<Mutex<Session>>,
    next_idx: AtomicUsize,
    input_name: String,
    output_name: String,
    model_path: PathBuf,
    model_name: String,
}

impl std::fmt::Debug for OrtInfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtInfer")
            .field("sessions", &self.sessions.len())
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("model_path", &self.model_path)
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl OrtInfer {
    /// Loads a model with default session settings.
    pub fn new(model_path: impl AsRef<Path>) -> Result<Self, OCRError> {
        Self::from_config(&OrtSessionConfig::default(), model_path)
    }

    /// Loads a model, applying `config` to every pooled session.
    ///
    /// Input and output names are read from the model itself.
    pub fn from_config(
        config: &OrtSessionConfig,
        model_path: impl AsRef<Path>,
    ) -> Result<Self, OCRError> {
        let path = model_path.as_ref();
        let pool_size = config.session_pool_size.unwrap_or(1).max(1);
        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let builder = Self::apply_ort_config(Session::builder()?, config)?;
            let session = builder.commit_from_file(path).map_err(|e| {
                OCRError::inference_error(
                    &path.display().to_string(),
                    "failed to create ONNX session; verify the model file exists and is readable",
                    e,
                )
            })?;
            sessions.push(Mutex::new(session));
        }

        let (input_name, output_name) = {
            let session = sessions[0]
                .lock()
                .map_err(|_| OCRError::invalid_input("Failed to acquire session lock"))?;
            let input = session.inputs.first().map(|i| i.name.clone());
            let output = session.outputs.first().map(|o| o.name.clone());
            match (input, output) {
                (Some(i), Some(o)) => (i, o),
                _ => {
                    return Err(OCRError::invalid_input(format!(
                        "Model '{}' declares no inputs or outputs",
                        path.display()
                    )));
                }
            }
        };

        let model_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown_model")
            .to_string();

        debug!(
            "Loaded ONNX model '{}' with {} session(s), input '{}', output '{}'",
            model_name, pool_size, input_name, output_name
        );

        Ok(Self {
            sessions,
            next_idx: AtomicUsize::new(0),
            input_name,
            output_name,
            model_path: path.to_path_buf(),
            model_name,
        })
    }

    fn apply_ort_config(
        builder: SessionBuilder,
        config: &OrtSessionConfig,
    ) -> Result<SessionBuilder, OCRError> {
        let mut builder = builder.with_log_level(LogLevel::Error)?;
        if let Some(threads) = config.intra_threads {
            builder = builder.with_intra_threads(threads)?;
        }
        if let Some(threads) = config.inter_threads {
            builder = builder.with_inter_threads(threads)?;
        }
        Ok(builder)
    }

    /// Returns the model path associated with this inference engine.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl InferenceEngine for OrtInfer {
    fn run(&self, x: &Tensor4D) -> Result<TensorD, OCRError> {
        let input_shape = x.shape().to_vec();
        let input_tensor = TensorRef::from_array_view(x.view()).map_err(|e| {
            OCRError::inference_error(
                &self.model_name,
                &format!("Failed to convert input tensor with shape {:?}", input_shape),
                e,
            )
        })?;
        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];

        let idx = self.next_idx.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session_guard = self.sessions[idx].lock().map_err(|_| {
            OCRError::inference_error(
                &self.model_name,
                &format!(
                    "Failed to acquire session lock for session {}/{}",
                    idx,
                    self.sessions.len()
                ),
                SimpleError::new("Session lock acquisition failed"),
            )
        })?;

        let outputs = session_guard.run(inputs).map_err(|e| {
            OCRError::inference_error(
                &self.model_name,
                &format!(
                    "ONNX Runtime inference failed with input '{}' of shape {:?}",
                    self.input_name, input_shape
                ),
                e,
            )
        })?;

        let (output_shape, output_data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                OCRError::inference_error(
                    &self.model_name,
                    &format!("Failed to extract output tensor '{}' as f32", self.output_name),
                    e,
                )
            })?;

        let dims: Vec<usize> = output_shape.iter().map(|&d| d.max(0) as usize).collect();
        let array = ndarray::ArrayViewD::from_shape(ndarray::IxDyn(&dims), output_data)?;
        Ok(array.to_owned())
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_error() {
        let result = OrtInfer::new("definitely_missing_model.onnx");
        assert!(result.is_err());
    }

    #[test]
    fn test_pool_size_config_missing_model() {
        let config = OrtSessionConfig::new().with_session_pool_size(3);
        assert!(OrtInfer::from_config(&config, "definitely_missing_model.onnx").is_err());
    }
}
