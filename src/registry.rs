//! Model registry: the process-wide, read-only holder of the backend and its
//! class catalog.
//!
//! The registry is built exactly once by [`ModelRegistry::load`] and then shared
//! (typically behind an [`Arc`](std::sync::Arc)) by every request. Nothing in it
//! changes after construction, so concurrent readers never coordinate.
//!
//! Loading never fails outright. When the artifact is missing or unusable the
//! registry is created in a degraded state: status queries still answer, and
//! predictions fail with [`ClassifyError::BackendNotLoaded`].

use crate::core::config::ServiceConfig;
use crate::core::errors::{ClassifyError, ClassifyResult};
use crate::core::inference::Backend;
use crate::domain::{ClassCatalog, ModelStatus};

/// A backend together with the catalog that names its outputs.
#[derive(Debug)]
pub struct LoadedModel {
    backend: Backend,
    catalog: ClassCatalog,
}

impl LoadedModel {
    /// Pairs a backend with its catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::ModelLoad`] if the backend declares a number of
    /// output units different from the number of labels.
    pub fn new(
        backend: Backend,
        catalog: ClassCatalog,
        config: &ServiceConfig,
    ) -> ClassifyResult<Self> {
        if let Some(units) = backend.output_units() {
            catalog.ensure_matches(units, &config.model_path)?;
        }
        Ok(Self { backend, catalog })
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn catalog(&self) -> &ClassCatalog {
        &self.catalog
    }
}

/// Read-only service state shared by all requests.
#[derive(Debug)]
pub struct ModelRegistry {
    config: ServiceConfig,
    model: Option<LoadedModel>,
    load_error: Option<ClassifyError>,
}

impl ModelRegistry {
    /// Loads the configured model and catalog.
    ///
    /// Any failure is logged and retained; the returned registry is then
    /// degraded rather than absent.
    pub fn load(config: ServiceConfig) -> Self {
        match Self::try_load(&config) {
            Ok(model) => {
                let shape = model.backend.input_shape();
                tracing::info!(
                    model = %model.backend.model_name(),
                    backend = %model.backend.kind(),
                    height = shape.height,
                    width = shape.width,
                    classes = model.catalog.len(),
                    default_labels = model.catalog.is_default(),
                    "model loaded"
                );
                Self {
                    config,
                    model: Some(model),
                    load_error: None,
                }
            }
            Err(err) => {
                tracing::error!(
                    model_path = %config.model_path.display(),
                    error = %err,
                    cause = ?std::error::Error::source(&err),
                    "failed to load model; serving in degraded mode"
                );
                Self {
                    config,
                    model: None,
                    load_error: Some(err),
                }
            }
        }
    }

    /// The loading steps, without the degraded-state fallback.
    pub fn try_load(config: &ServiceConfig) -> ClassifyResult<LoadedModel> {
        config.validate()?;
        let backend = Backend::load(config)?;
        let catalog =
            ClassCatalog::resolve(config.labels_path.as_deref(), config.allow_default_labels)?;
        LoadedModel::new(backend, catalog, config)
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Option<&LoadedModel> {
        self.model.as_ref()
    }

    pub fn backend(&self) -> Option<&Backend> {
        self.model.as_ref().map(LoadedModel::backend)
    }

    pub fn catalog(&self) -> Option<&ClassCatalog> {
        self.model.as_ref().map(LoadedModel::catalog)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The error that left the registry degraded, if any.
    pub fn load_error(&self) -> Option<&ClassifyError> {
        self.load_error.as_ref()
    }

    /// Reports what is loaded. Artifact existence is checked at call time.
    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            model_loaded: self.is_loaded(),
            class_names: self.catalog().map(|c| c.labels().to_vec()),
            input_shape: self.backend().map(|b| b.input_shape().hwc()),
            model_file_exists: self.config.artifact().exists(),
            using_default_labels: self.catalog().is_some_and(ClassCatalog::is_default),
            backend: self.backend().map(Backend::kind),
            load_error: self.load_error.as_ref().map(ToString::to_string),
        }
    }
}
