//! Result types handed back across the service boundary.

use crate::core::errors::{ClassifyError, ErrorCode};
use crate::core::inference::BackendKind;
use crate::domain::ClassCatalog;
use crate::processors::Distribution;
use serde::ser::{Serialize, Serializer};

/// Per-class probabilities in catalog order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassProbabilities(Vec<(String, f32)>);

impl ClassProbabilities {
    pub fn get(&self, label: &str) -> Option<f32> {
        self.0.iter().find(|(l, _)| l == label).map(|(_, p)| *p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(l, p)| (l.as_str(), *p))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ClassProbabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(l, p)| (l, p)))
    }
}

/// Outcome of a successful prediction.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PredictionResult {
    pub predicted_class: String,
    pub confidence: f32,
    pub class_probabilities: ClassProbabilities,
    pub all_classes: Vec<String>,
}

impl PredictionResult {
    /// Zips the catalog with the distribution in index order.
    ///
    /// The caller guarantees the distribution has one entry per label.
    pub fn assemble(catalog: &ClassCatalog, distribution: &Distribution) -> Self {
        let labels = catalog.labels();
        let class_probabilities = ClassProbabilities(
            labels
                .iter()
                .cloned()
                .zip(distribution.probabilities.iter().copied())
                .collect(),
        );
        Self {
            predicted_class: labels[distribution.top_index].clone(),
            confidence: distribution.confidence(),
            class_probabilities,
            all_classes: labels.to_vec(),
        }
    }
}

/// Answer to the status query.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ModelStatus {
    pub model_loaded: bool,
    pub class_names: Option<Vec<String>>,
    /// `[height, width, channels]`.
    pub input_shape: Option<[usize; 3]>,
    pub model_file_exists: bool,
    pub using_default_labels: bool,
    pub backend: Option<BackendKind>,
    pub load_error: Option<String>,
}

/// Structured failure returned instead of a prediction.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FailureResult {
    pub error: ErrorCode,
    pub message: String,
}

impl From<&ClassifyError> for FailureResult {
    fn from(err: &ClassifyError) -> Self {
        let code = err.code();
        Self {
            error: code,
            message: code.public_message().to_string(),
        }
    }
}

/// Boundary form of a prediction call.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum PredictionResponse {
    Success(PredictionResult),
    Failure(FailureResult),
}

impl PredictionResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, PredictionResponse::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_reference_scenario() {
        let catalog = ClassCatalog::from_labels(["A", "B", "C"]).unwrap();
        let dist = Distribution::from_scores(&[2.0, 1.0, 0.1]).unwrap();
        let result = PredictionResult::assemble(&catalog, &dist);

        assert_eq!(result.predicted_class, "A");
        assert!((result.confidence - 0.659).abs() < 1e-3);
        assert!((result.class_probabilities.get("B").unwrap() - 0.242).abs() < 1e-3);
        assert!((result.class_probabilities.get("C").unwrap() - 0.099).abs() < 1e-3);
        assert_eq!(result.all_classes, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_probabilities_serialize_in_catalog_order() {
        let catalog = ClassCatalog::from_labels(["zebu", "angus", "jersey"]).unwrap();
        let dist = Distribution::from_scores(&[0.0, 1.0, 2.0]).unwrap();
        let json = serde_json::to_string(&PredictionResult::assemble(&catalog, &dist)).unwrap();

        let zebu = json.find("\"zebu\":").unwrap();
        let angus = json.find("\"angus\":").unwrap();
        let jersey = json.find("\"jersey\":").unwrap();
        assert!(zebu < angus && angus < jersey);
        assert!(json.contains("\"predicted_class\":\"jersey\""));
    }

    #[test]
    fn test_failure_response_shape() {
        let response = PredictionResponse::Failure((&ClassifyError::BackendNotLoaded).into());
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["error"], "backend_not_loaded");
        assert_eq!(
            value["message"],
            ErrorCode::BackendNotLoaded.public_message()
        );
        assert!(!response.is_success());
    }

    #[test]
    fn test_status_serializes_nulls_when_degraded() {
        let status = ModelStatus {
            model_loaded: false,
            class_names: None,
            input_shape: None,
            model_file_exists: false,
            using_default_labels: false,
            backend: None,
            load_error: Some("model artifact does not exist".to_string()),
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["model_loaded"], false);
        assert!(value["class_names"].is_null());
        assert!(value["input_shape"].is_null());
    }
}
