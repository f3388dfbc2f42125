//! Inference backends.
//!
//! A model artifact encodes one of two mutually incompatible representations,
//! so [`Backend`] is a tagged union with one implementation per variant:
//!
//! - [`DenseModel`]: a fully materialized layer graph evaluated with candle.
//!   Its forward pass is pure and may run concurrently.
//! - [`CompiledInterpreter`]: an ONNX Runtime session with fixed input/output
//!   slots. Sessions keep scratch state between runs, so every call takes a
//!   per-session lock.
//!
//! Both expose the same contract, `predict(tensor) -> raw scores`, and both
//! declare the [`NormalizationPolicy`] their inputs must be prepared with.

pub mod compiled;
pub mod dense;

pub use compiled::CompiledInterpreter;
pub use dense::{DenseGraph, DenseModel, LayerSpec};

use crate::core::config::ServiceConfig;
use crate::core::errors::{ClassifyError, ClassifyResult};
use crate::processors::NormalizationPolicy;
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Batch of NHWC images, `(batch, height, width, channels)`.
pub type Tensor4D = Array4<f32>;

/// Backend variant discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Layer graph plus safetensors weights, evaluated in-process.
    #[default]
    Dense,
    /// Compiled ONNX model executed by ONNX Runtime.
    Compiled,
}

impl BackendKind {
    /// Normalization the variant's models were exported against.
    ///
    /// Dense graphs rescale internally and take raw pixel values; compiled
    /// models expect inputs already mapped onto [-1, 1].
    pub fn normalization(self) -> NormalizationPolicy {
        match self {
            BackendKind::Dense => NormalizationPolicy::RawPixels,
            BackendKind::Compiled => NormalizationPolicy::SymmetricUnit,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Dense => "dense",
            BackendKind::Compiled => "compiled",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a model artifact on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    pub path: PathBuf,
    pub kind: BackendKind,
}

impl ModelArtifact {
    pub fn new(path: impl Into<PathBuf>, kind: BackendKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// Spatial input size declared by a backend. Channels are always RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub height: u32,
    pub width: u32,
}

impl InputShape {
    pub const CHANNELS: usize = 3;

    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }

    /// `[height, width, channels]`, as reported by the status query.
    pub fn hwc(&self) -> [usize; 3] {
        [self.height as usize, self.width as usize, Self::CHANNELS]
    }

    /// Full single-image tensor shape `[1, height, width, channels]`.
    pub fn nhwc(&self) -> [i64; 4] {
        [1, self.height as i64, self.width as i64, Self::CHANNELS as i64]
    }
}

/// Checks a tensor shape against a declared one. Negative declared
/// dimensions are dynamic and match anything.
pub fn check_input_shape(declared: &[i64], actual: &[usize]) -> ClassifyResult<()> {
    let matches = declared.len() == actual.len()
        && declared
            .iter()
            .zip(actual)
            .all(|(&d, &a)| d < 0 || d as usize == a);
    if matches {
        Ok(())
    } else {
        Err(ClassifyError::shape_mismatch(declared, actual))
    }
}

/// A loaded inference backend.
#[derive(Debug)]
pub enum Backend {
    Dense(DenseModel),
    Compiled(CompiledInterpreter),
}

impl Backend {
    /// Constructs the backend variant the configured artifact declares.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::ModelLoad`] if the artifact is missing,
    /// unreadable, or incompatible with its declared variant.
    pub fn load(config: &ServiceConfig) -> ClassifyResult<Self> {
        let artifact = config.artifact();
        if !artifact.exists() {
            return Err(ClassifyError::model_load_message(
                &artifact.path,
                "model artifact does not exist",
            ));
        }
        match artifact.kind {
            BackendKind::Dense => {
                DenseModel::load(&artifact.path, &config.resolved_graph_path()).map(Backend::Dense)
            }
            BackendKind::Compiled => CompiledInterpreter::load(
                &artifact.path,
                config.session_pool_size,
                config.input_size,
            )
            .map(Backend::Compiled),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Dense(_) => BackendKind::Dense,
            Backend::Compiled(_) => BackendKind::Compiled,
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            Backend::Dense(model) => model.model_name(),
            Backend::Compiled(interpreter) => interpreter.model_name(),
        }
    }

    pub fn input_shape(&self) -> InputShape {
        match self {
            Backend::Dense(model) => model.input_shape(),
            Backend::Compiled(interpreter) => interpreter.input_shape(),
        }
    }

    /// Number of output units, when the model declares it statically.
    pub fn output_units(&self) -> Option<usize> {
        match self {
            Backend::Dense(model) => Some(model.output_units()),
            Backend::Compiled(interpreter) => interpreter.output_units(),
        }
    }

    pub fn normalization(&self) -> NormalizationPolicy {
        self.kind().normalization()
    }

    /// Runs a forward pass and returns the raw class scores.
    pub fn predict(&self, tensor: &Tensor4D) -> ClassifyResult<Vec<f32>> {
        match self {
            Backend::Dense(model) => model.predict(tensor),
            Backend::Compiled(interpreter) => interpreter.predict(tensor),
        }
    }
}
