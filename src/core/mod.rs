//! The core module of the classifier.
//!
//! This module contains the fundamental components of the service:
//! - Configuration management
//! - Error handling
//! - Inference backends
//!
//! It also provides re-exports of commonly used types and functions for convenience.

pub mod config;
pub mod errors;
pub mod inference;

pub use config::{ResizeFilter, ServiceConfig};
pub use errors::{ClassifyError, ClassifyResult, ErrorCode, SimpleError};
pub use inference::{
    Backend, BackendKind, CompiledInterpreter, DenseModel, InputShape, ModelArtifact, Tensor4D,
};

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
