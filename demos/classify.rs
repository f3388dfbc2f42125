//! Image Classification Example
//!
//! Loads a model once, then classifies each input image and prints the result
//! (or the structured failure) as JSON.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example classify -- [OPTIONS] -m <MODEL_PATH> [IMAGES]...
//! ```
//!
//! # Arguments
//!
//! * `-m, --model-path` - Path to the model artifact
//! * `-b, --backend` - Backend variant of the artifact: `dense` or `compiled`
//! * `-l, --labels` - Newline-delimited label file
//! * `-c, --config` - JSON service configuration (overrides the other model options)
//! * `--status` - Print the model status before classifying
//! * `[IMAGES]...` - Images to classify
//!
//! # Example
//!
//! ```bash
//! cargo run --example classify -- \
//!     -m models/cattle_model.safetensors -l models/class_names.txt \
//!     --status cow1.jpg cow2.jpg
//! ```

use clap::{Parser, ValueEnum};
use oar_classify::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Backend variants selectable from the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    /// Safetensors weights with a JSON graph descriptor
    Dense,
    /// Compiled ONNX model run through ONNX Runtime
    Compiled,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Dense => BackendKind::Dense,
            BackendArg::Compiled => BackendKind::Compiled,
        }
    }
}

/// Command-line arguments for the classification example
#[derive(Parser)]
#[command(name = "classify")]
#[command(about = "Image Classification Example - maps an image onto a fixed set of classes")]
struct Args {
    /// Path to the model artifact
    #[arg(short, long, default_value = "cattle_model.safetensors")]
    model_path: PathBuf,

    /// Backend variant encoded by the artifact
    #[arg(short, long, value_enum, default_value = "dense")]
    backend: BackendArg,

    /// Newline-delimited label file
    #[arg(short, long)]
    labels: Option<PathBuf>,

    /// JSON service configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model input height for compiled models with dynamic dimensions
    #[arg(long, requires = "input_width")]
    input_height: Option<u32>,

    /// Model input width for compiled models with dynamic dimensions
    #[arg(long, requires = "input_height")]
    input_width: Option<u32>,

    /// Session pool size for concurrent inference (default: 1)
    #[arg(long, default_value = "1")]
    session_pool_size: usize,

    /// Print the model status before classifying
    #[arg(long)]
    status: bool,

    /// Images to classify
    images: Vec<PathBuf>,
}

impl Args {
    fn service_config(&self) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
        if let Some(path) = &self.config {
            return Ok(ServiceConfig::from_path(path)?);
        }
        let mut config = ServiceConfig::new(&self.model_path, self.backend.into())
            .session_pool_size(self.session_pool_size);
        if let Some(labels) = &self.labels {
            config = config.labels_path(labels);
        }
        if let (Some(h), Some(w)) = (self.input_height, self.input_width) {
            config = config.input_size(h, w);
        }
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args = Args::parse();
    let config = args.service_config()?;

    info!("Loading model from {}", config.model_path.display());
    let service = PredictionService::new(Arc::new(ModelRegistry::load(config)));

    if args.status || args.images.is_empty() {
        println!("{}", serde_json::to_string_pretty(&service.status())?);
    }

    for image in &args.images {
        let response = service.respond(image);
        info!(
            "{}: {}",
            image.display(),
            if response.is_success() { "ok" } else { "failed" }
        );
        println!("{}", serde_json::to_string_pretty(&response)?);
    }

    Ok(())
}
