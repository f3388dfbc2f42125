//! Prediction service: the per-request path from an image reference to a
//! classification result.

use crate::core::errors::{ClassifyError, ClassifyResult, SimpleError};
use crate::domain::{FailureResult, ModelStatus, PredictionResponse, PredictionResult};
use crate::processors::{Distribution, ImagePreprocessor};
use crate::registry::ModelRegistry;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Classifies images against a shared [`ModelRegistry`].
///
/// Cloning is cheap; every clone reads the same registry.
#[derive(Debug, Clone)]
pub struct PredictionService {
    registry: Arc<ModelRegistry>,
    preprocessor: ImagePreprocessor,
}

impl PredictionService {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        let preprocessor = ImagePreprocessor::new(registry.config().resize_filter);
        Self {
            registry,
            preprocessor,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Classifies the image at `image_path`.
    ///
    /// # Errors
    ///
    /// * [`ClassifyError::BackendNotLoaded`] if the registry is degraded.
    /// * [`ClassifyError::InvalidInput`] if the path is not a readable file.
    /// * [`ClassifyError::ImageDecode`] if the file is not a supported image.
    /// * [`ClassifyError::ShapeMismatch`] if the tensor disagrees with the backend.
    /// * [`ClassifyError::InferenceExecution`] if the forward pass fails or
    ///   returns scores that cannot be turned into a distribution.
    pub fn predict(&self, image_path: impl AsRef<Path>) -> ClassifyResult<PredictionResult> {
        let path = image_path.as_ref();
        let model = self.registry.model().ok_or(ClassifyError::BackendNotLoaded)?;
        ensure_readable_file(path)?;

        let start = Instant::now();
        let backend = model.backend();
        let catalog = model.catalog();
        let tensor = self.preprocessor.preprocess(
            path,
            backend.input_shape(),
            backend.normalization(),
        )?;
        let scores = backend.predict(&tensor)?;

        if scores.len() != catalog.len() {
            return Err(ClassifyError::inference_error(
                backend.model_name(),
                "reading output scores",
                SimpleError::new(format!(
                    "model produced {} scores for {} classes",
                    scores.len(),
                    catalog.len()
                )),
            ));
        }
        if let Some(idx) = scores.iter().position(|s| !s.is_finite()) {
            return Err(ClassifyError::inference_error(
                backend.model_name(),
                "reading output scores",
                SimpleError::new(format!("score {idx} is not finite: {}", scores[idx])),
            ));
        }
        let distribution = Distribution::from_scores(&scores).ok_or_else(|| {
            ClassifyError::inference_error(
                backend.model_name(),
                "reading output scores",
                SimpleError::new("model produced no scores"),
            )
        })?;

        let result = PredictionResult::assemble(catalog, &distribution);
        tracing::debug!(
            image = %path.display(),
            predicted = %result.predicted_class,
            confidence = result.confidence,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "prediction complete"
        );
        Ok(result)
    }

    /// Boundary form of [`predict`](Self::predict): failures become a
    /// [`FailureResult`] carrying only the error code and a public summary.
    /// The full error is logged.
    pub fn respond(&self, image_path: impl AsRef<Path>) -> PredictionResponse {
        let path = image_path.as_ref();
        match self.predict(path) {
            Ok(result) => PredictionResponse::Success(result),
            Err(err) => {
                tracing::error!(
                    image = %path.display(),
                    code = %err.code(),
                    error = %err,
                    cause = ?std::error::Error::source(&err),
                    "prediction failed"
                );
                PredictionResponse::Failure(FailureResult::from(&err))
            }
        }
    }

    pub fn status(&self) -> ModelStatus {
        self.registry.status()
    }

    /// Labels of the loaded catalog, in output-index order.
    pub fn classes(&self) -> Option<&[String]> {
        self.registry.catalog().map(|c| c.labels())
    }
}

fn ensure_readable_file(path: &Path) -> ClassifyResult<()> {
    if !path.is_file() {
        return Err(ClassifyError::invalid_input(format!(
            "'{}' is not an existing file",
            path.display()
        )));
    }
    std::fs::File::open(path).map_err(|e| {
        ClassifyError::invalid_input(format!("'{}' is not readable: {e}", path.display()))
    })?;
    Ok(())
}
