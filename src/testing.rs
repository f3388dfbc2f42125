//! Fixtures shared by unit tests.

use crate::core::config::ServiceConfig;
use crate::core::inference::{BackendKind, DenseGraph, LayerSpec};
use crate::core::inference::dense::Activation;
use candle_core::{DType, Device, Tensor};
use std::collections::HashMap;
use std::path::Path;

/// Writes a dense model whose scores equal `bias` for every input: a
/// flatten followed by a zero-weight head. Returns a config pointing at it
/// with a label file holding `labels`.
pub(crate) fn write_bias_model(
    dir: &Path,
    input: (usize, usize),
    bias: &[f32],
    labels: &[&str],
) -> ServiceConfig {
    let (h, w) = input;
    let dev = Device::Cpu;
    let graph = DenseGraph {
        name: Some("bias_only".to_string()),
        input_shape: [h, w, 3],
        layers: vec![
            LayerSpec::Rescaling {
                scale: 1.0 / 255.0,
                offset: 0.0,
            },
            LayerSpec::Flatten,
            LayerSpec::Dense {
                name: "head".to_string(),
                units: bias.len(),
                activation: Activation::Linear,
            },
        ],
    };

    let mut tensors = HashMap::new();
    tensors.insert(
        "head.weight".to_string(),
        Tensor::zeros((bias.len(), h * w * 3), DType::F32, &dev).unwrap(),
    );
    tensors.insert("head.bias".to_string(), Tensor::new(bias, &dev).unwrap());

    let model_path = dir.join("cattle_model.safetensors");
    candle_core::safetensors::save(&tensors, &model_path).unwrap();
    std::fs::write(
        dir.join("cattle_model.json"),
        serde_json::to_string(&graph).unwrap(),
    )
    .unwrap();

    let labels_path = dir.join("class_names.txt");
    std::fs::write(&labels_path, labels.join("\n")).unwrap();

    ServiceConfig::new(model_path, BackendKind::Dense).labels_path(labels_path)
}
