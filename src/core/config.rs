//! Service configuration.
//!
//! [`ServiceConfig`] describes where the model artifact and label file live,
//! which backend variant the artifact encodes, and a few knobs for
//! preprocessing and the compiled backend's session pool. It can be built in
//! code with chained setters or loaded from a JSON file:
//!
//! ```json
//! {
//!   "model_path": "models/cattle.onnx",
//!   "backend": "compiled",
//!   "labels_path": "models/class_names.txt",
//!   "session_pool_size": 2
//! }
//! ```

use crate::core::errors::{ClassifyError, ClassifyResult};
use crate::core::inference::{BackendKind, ModelArtifact};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Resampling filter used when resizing images to the model input size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    /// Nearest neighbor, the default of the loader the models were trained with.
    #[default]
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl ResizeFilter {
    pub fn to_filter_type(self) -> FilterType {
        match self {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Configuration consumed once by [`ModelRegistry::load`](crate::registry::ModelRegistry::load).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Path to the model artifact.
    pub model_path: PathBuf,
    /// Backend variant encoded by the artifact.
    pub backend: BackendKind,
    /// Graph descriptor for dense models (defaults to `model_path` with a `.json` extension).
    pub graph_path: Option<PathBuf>,
    /// Optional newline-delimited label file.
    pub labels_path: Option<PathBuf>,
    /// Whether the built-in label sequence may stand in for a missing label file.
    pub allow_default_labels: bool,
    /// Input size `(height, width)` for compiled models with dynamic spatial dimensions.
    pub input_size: Option<(u32, u32)>,
    /// Number of ONNX Runtime sessions in the compiled backend's pool.
    pub session_pool_size: usize,
    /// Resampling filter for preprocessing.
    pub resize_filter: ResizeFilter,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("cattle_model.safetensors"),
            backend: BackendKind::Dense,
            graph_path: None,
            labels_path: Some(PathBuf::from("class_names.txt")),
            allow_default_labels: true,
            input_size: None,
            session_pool_size: 1,
            resize_filter: ResizeFilter::default(),
        }
    }
}

impl ServiceConfig {
    /// Creates a configuration for the given artifact and backend variant.
    pub fn new(model_path: impl Into<PathBuf>, backend: BackendKind) -> Self {
        Self {
            model_path: model_path.into(),
            backend,
            labels_path: None,
            ..Self::default()
        }
    }

    /// Loads a configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> ClassifyResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            ClassifyError::config_error(format!(
                "failed to parse service config '{}': {e}",
                path.display()
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn labels_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.labels_path = Some(path.into());
        self
    }

    pub fn graph_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.graph_path = Some(path.into());
        self
    }

    pub fn allow_default_labels(mut self, allow: bool) -> Self {
        self.allow_default_labels = allow;
        self
    }

    pub fn input_size(mut self, height: u32, width: u32) -> Self {
        self.input_size = Some((height, width));
        self
    }

    pub fn session_pool_size(mut self, size: usize) -> Self {
        self.session_pool_size = size;
        self
    }

    pub fn resize_filter(mut self, filter: ResizeFilter) -> Self {
        self.resize_filter = filter;
        self
    }

    /// The model artifact reference described by this configuration.
    pub fn artifact(&self) -> ModelArtifact {
        ModelArtifact::new(self.model_path.clone(), self.backend)
    }

    /// Graph descriptor path for dense models.
    pub fn resolved_graph_path(&self) -> PathBuf {
        self.graph_path
            .clone()
            .unwrap_or_else(|| self.model_path.with_extension("json"))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::ConfigError`] if the model path is empty, the
    /// session pool size is zero, or an input size override has a zero side.
    pub fn validate(&self) -> ClassifyResult<()> {
        if self.model_path.as_os_str().is_empty() {
            return Err(ClassifyError::config_error("model_path must not be empty"));
        }
        if self.session_pool_size == 0 {
            return Err(ClassifyError::config_error(
                "session_pool_size must be greater than 0",
            ));
        }
        if let Some((h, w)) = self.input_size.filter(|&(h, w)| h == 0 || w == 0) {
            return Err(ClassifyError::config_error(format!(
                "input_size must be positive, got ({h}, {w})"
            )));
        }
        Ok(())
    }
}
