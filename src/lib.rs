//! # OAR Classify
//!
//! A Rust image classification core that serves a single trained CNN and maps
//! its outputs onto a fixed catalog of class labels.
//!
//! ## Features
//!
//! - Two backend variants behind one contract: dense layer graphs evaluated
//!   with candle, and compiled ONNX models executed by ONNX Runtime
//! - Per-variant input normalization declared by the backend
//! - Numerically stable softmax with deterministic tie-breaking
//! - Load-once, read-only registry shared across threads
//! - Degraded mode: status queries keep answering when the model is missing
//!
//! ## Modules
//!
//! * [`core`] - Configuration, error handling, and inference backends
//! * [`domain`] - Class catalog and result types
//! * [`processors`] - Preprocessing, normalization, and postprocessing
//! * [`registry`] - The loaded model and its catalog
//! * [`service`] - Per-request prediction path
//! * [`utils`] - Image loading helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oar_classify::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServiceConfig::new("models/cattle_model.safetensors", BackendKind::Dense)
//!     .labels_path("models/class_names.txt");
//! let service = PredictionService::new(Arc::new(ModelRegistry::load(config)));
//!
//! println!("{}", serde_json::to_string_pretty(&service.status())?);
//!
//! let result = service.predict("cow.jpg")?;
//! println!("{} ({:.1}%)", result.predicted_class, result.confidence * 100.0);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod domain;
pub mod processors;
pub mod registry;
pub mod service;
pub mod utils;

#[cfg(test)]
mod testing;

/// Prelude module for convenient imports.
///
/// Bring the essentials into scope with a single use statement:
///
/// ```rust
/// use oar_classify::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::config::{ResizeFilter, ServiceConfig};
    pub use crate::core::errors::{ClassifyError, ClassifyResult, ErrorCode};
    pub use crate::core::inference::BackendKind;
    pub use crate::core::init_tracing;
    pub use crate::domain::{
        ClassCatalog, FailureResult, ModelStatus, PredictionResponse, PredictionResult,
    };
    pub use crate::registry::ModelRegistry;
    pub use crate::service::PredictionService;
    pub use crate::utils::load_image;
}
