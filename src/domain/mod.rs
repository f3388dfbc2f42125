//! Domain types: the class catalog and the result shapes of the service.

pub mod catalog;
pub mod prediction;

pub use catalog::{ClassCatalog, DEFAULT_CLASS_LABELS, LabelSource};
pub use prediction::{
    ClassProbabilities, FailureResult, ModelStatus, PredictionResponse, PredictionResult,
};
