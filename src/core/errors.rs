//! Error types for the classification pipeline.
//!
//! Every failure the pipeline can produce is a variant of [`ClassifyError`].
//! Variants carry diagnostic detail (paths, shapes, chained engine errors) for
//! local logging, while [`ClassifyError::code`] maps each of them onto a small,
//! stable [`ErrorCode`] that is safe to hand to callers across the service
//! boundary.
//!
//! # Usage
//!
//! ```rust
//! use oar_classify::core::errors::{ClassifyError, ErrorCode};
//!
//! let error = ClassifyError::shape_mismatch(&[1, 224, 224, 3], &[1, 100, 100, 3]);
//! assert_eq!(error.code(), ErrorCode::ShapeMismatch);
//! assert!(error.to_string().contains("224"));
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Convenient result alias for classification operations.
pub type ClassifyResult<T> = Result<T, ClassifyError>;

/// Enum representing the errors that can occur while loading a model or
/// serving a prediction.
#[derive(Error, Debug)]
pub enum ClassifyError {
    /// The model artifact is missing, unreadable, or incompatible with the
    /// declared backend variant, or the label catalog does not fit the model.
    #[error("model load failed for '{}': {message}", path.display())]
    ModelLoad {
        /// Path of the artifact (or label file) that failed to load.
        path: PathBuf,
        /// Description of the failure.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A prediction was requested while no backend is loaded.
    #[error("no model backend is loaded")]
    BackendNotLoaded,

    /// The image reference is missing or unreadable.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// The image bytes could not be decoded as a supported format.
    #[error("image decode failed for '{}'", path.display())]
    ImageDecode {
        /// Path of the image that failed to decode.
        path: PathBuf,
        /// The underlying decoder error.
        #[source]
        source: image::ImageError,
    },

    /// The input tensor disagrees with the backend's declared input shape.
    #[error("input shape mismatch: backend expects {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Declared input shape (dynamic dimensions are reported as -1).
        expected: Vec<i64>,
        /// Shape of the tensor that was supplied.
        actual: Vec<usize>,
    },

    /// The forward pass itself failed.
    #[error("inference failed in model '{model_name}': {context}")]
    InferenceExecution {
        /// Name of the model that failed.
        model_name: String,
        /// Which step of execution failed.
        context: String,
        /// The underlying engine error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The service configuration is invalid.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

/// Stable, caller-visible error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ModelLoadError,
    BackendNotLoaded,
    InvalidInput,
    ImageDecodeError,
    ShapeMismatch,
    InferenceExecutionError,
}

impl ErrorCode {
    /// Wire name of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ModelLoadError => "model_load_error",
            ErrorCode::BackendNotLoaded => "backend_not_loaded",
            ErrorCode::InvalidInput => "invalid_input",
            ErrorCode::ImageDecodeError => "image_decode_error",
            ErrorCode::ShapeMismatch => "shape_mismatch",
            ErrorCode::InferenceExecutionError => "inference_execution_error",
        }
    }

    /// Summary that may be shown to callers. Never contains engine internals.
    pub fn public_message(&self) -> &'static str {
        match self {
            ErrorCode::ModelLoadError => "the model could not be loaded",
            ErrorCode::BackendNotLoaded => "model not loaded; predictions are unavailable",
            ErrorCode::InvalidInput => "the image reference is missing or unreadable",
            ErrorCode::ImageDecodeError => "the image could not be decoded",
            ErrorCode::ShapeMismatch => "the image tensor does not match the model input shape",
            ErrorCode::InferenceExecutionError => "model inference failed",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimal error carrying only a message, used as a `source` when a failure
/// has no underlying error of its own.
#[derive(Debug, Clone)]
pub struct SimpleError {
    message: String,
}

impl SimpleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SimpleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SimpleError {}

impl ClassifyError {
    /// Maps this error onto its stable caller-visible code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ClassifyError::ModelLoad { .. }
            | ClassifyError::ConfigError { .. }
            | ClassifyError::Io(_) => ErrorCode::ModelLoadError,
            ClassifyError::BackendNotLoaded => ErrorCode::BackendNotLoaded,
            ClassifyError::InvalidInput { .. } => ErrorCode::InvalidInput,
            ClassifyError::ImageDecode { .. } => ErrorCode::ImageDecodeError,
            ClassifyError::ShapeMismatch { .. } => ErrorCode::ShapeMismatch,
            ClassifyError::InferenceExecution { .. } => ErrorCode::InferenceExecutionError,
        }
    }

    /// Creates a model load error with an optional underlying cause.
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the artifact that failed to load.
    /// * `message` - Description of the failure.
    /// * `source` - The underlying error, if any.
    pub fn model_load_error(
        path: &Path,
        message: impl Into<String>,
        source: Option<impl std::error::Error + Send + Sync + 'static>,
    ) -> Self {
        Self::ModelLoad {
            path: path.to_path_buf(),
            message: message.into(),
            source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }
    }

    /// Creates a model load error that has no underlying cause.
    pub fn model_load_message(path: &Path, message: impl Into<String>) -> Self {
        Self::model_load_error(path, message, None::<SimpleError>)
    }

    /// Creates an inference execution error.
    ///
    /// # Arguments
    ///
    /// * `model_name` - Name of the model that failed.
    /// * `context` - Which step of execution failed.
    /// * `error` - The underlying engine error.
    pub fn inference_error(
        model_name: &str,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::InferenceExecution {
            model_name: model_name.to_string(),
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a shape mismatch error.
    pub fn shape_mismatch(expected: &[i64], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Creates an error for invalid input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an error for configuration problems.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_codes_have_stable_wire_names() {
        let json = serde_json::to_string(&ErrorCode::BackendNotLoaded).unwrap();
        assert_eq!(json, "\"backend_not_loaded\"");
        assert_eq!(
            ErrorCode::InferenceExecutionError.as_str(),
            "inference_execution_error"
        );
    }

    #[test]
    fn test_model_load_error_chains_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ClassifyError::model_load_error(Path::new("m.onnx"), "unreadable", Some(io));
        assert_eq!(err.code(), ErrorCode::ModelLoadError);
        assert!(err.to_string().contains("m.onnx"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_public_message_hides_engine_detail() {
        let err = ClassifyError::inference_error(
            "cattle",
            "forward_pass",
            SimpleError::new("CUDA stream 7 faulted at 0xdeadbeef"),
        );
        assert!(err.to_string().contains("forward_pass"));
        assert!(!err.code().public_message().contains("0xdeadbeef"));
    }

    #[test]
    fn test_config_and_io_map_to_model_load() {
        assert_eq!(
            ClassifyError::config_error("bad").code(),
            ErrorCode::ModelLoadError
        );
        let io: ClassifyError = std::io::Error::other("x").into();
        assert_eq!(io.code(), ErrorCode::ModelLoadError);
    }
}
