//! Dense model backend on candle.
//!
//! A dense artifact is a safetensors weight file plus a JSON graph descriptor
//! listing a Keras-style sequential stack:
//!
//! ```json
//! {
//!   "name": "cattle_cnn",
//!   "input_shape": [100, 100, 3],
//!   "layers": [
//!     { "type": "rescaling", "scale": 0.00392156862745098 },
//!     { "type": "conv2d", "name": "conv1", "filters": 16, "kernel_size": 3,
//!       "padding": "same", "activation": "relu" },
//!     { "type": "max_pool2d", "pool_size": 2 },
//!     { "type": "flatten" },
//!     { "type": "dense", "name": "fc1", "units": 128, "activation": "relu" },
//!     { "type": "dropout", "rate": 0.2 },
//!     { "type": "dense", "name": "logits", "units": 5 }
//!   ]
//! }
//! ```
//!
//! Convolution weights are read as `{name}.weight` `(out, in, k, k)` and
//! `{name}.bias`; dense weights as `{name}.weight` `(out, in)` and
//! `{name}.bias`. `flatten` walks features in NHWC order so exported Keras
//! weights line up.

use super::{InputShape, Tensor4D, check_input_shape};
use crate::core::errors::{ClassifyError, ClassifyResult};
use candle_core::{DType, Device, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, Linear, Module, VarBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Padding {
    #[default]
    Valid,
    Same,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
}

fn default_stride() -> usize {
    1
}

/// One entry of the graph descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    /// `x * scale + offset`.
    Rescaling {
        scale: f64,
        #[serde(default)]
        offset: f64,
    },
    Conv2d {
        name: String,
        filters: usize,
        kernel_size: usize,
        #[serde(default = "default_stride")]
        stride: usize,
        #[serde(default)]
        padding: Padding,
        #[serde(default)]
        activation: Activation,
    },
    MaxPool2d {
        pool_size: usize,
        /// Defaults to `pool_size`.
        #[serde(default)]
        stride: Option<usize>,
    },
    Flatten,
    Dense {
        name: String,
        units: usize,
        #[serde(default)]
        activation: Activation,
    },
    /// Identity at inference time.
    Dropout {
        #[serde(default)]
        rate: f32,
    },
}

/// Graph descriptor of a dense model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseGraph {
    #[serde(default)]
    pub name: Option<String>,
    /// `[height, width, channels]`; channels must be 3.
    pub input_shape: [usize; 3],
    pub layers: Vec<LayerSpec>,
}

impl DenseGraph {
    pub fn from_path(path: &Path) -> ClassifyResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ClassifyError::model_load_error(path, "failed to read graph descriptor", Some(e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            ClassifyError::model_load_error(path, "failed to parse graph descriptor", Some(e))
        })
    }
}

/// Activation shape tracked while the graph is built.
#[derive(Debug, Clone, Copy)]
enum FeatureShape {
    Spatial { c: usize, h: usize, w: usize },
    Flat(usize),
}

#[derive(Debug)]
enum Layer {
    Rescale { scale: f64, offset: f64 },
    Conv { conv: Conv2d, activation: Activation },
    MaxPool { size: usize, stride: usize },
    Flatten,
    Linear { linear: Linear, activation: Activation },
}

impl Layer {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Layer::Rescale { scale, offset } => xs.affine(*scale, *offset),
            Layer::Conv { conv, activation } => activate(conv.forward(xs)?, *activation),
            Layer::MaxPool { size, stride } => xs.max_pool2d_with_stride(*size, *stride),
            // NCHW -> NHWC before flattening.
            Layer::Flatten => xs.permute((0, 2, 3, 1))?.contiguous()?.flatten_from(1),
            Layer::Linear { linear, activation } => activate(linear.forward(xs)?, *activation),
        }
    }
}

fn activate(xs: Tensor, activation: Activation) -> candle_core::Result<Tensor> {
    match activation {
        Activation::Linear => Ok(xs),
        Activation::Relu => xs.relu(),
    }
}

/// Fully materialized sequential CNN.
#[derive(Debug)]
pub struct DenseModel {
    layers: Vec<Layer>,
    input_shape: InputShape,
    output_units: usize,
    device: Device,
    model_name: String,
}

impl DenseModel {
    /// Loads the graph descriptor and its safetensors weights.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::ModelLoad`] if either file cannot be read, the
    /// descriptor is inconsistent, or a weight is missing or mis-shaped.
    pub fn load(weights_path: &Path, graph_path: &Path) -> ClassifyResult<Self> {
        let graph = DenseGraph::from_path(graph_path)?;
        let device = Device::Cpu;
        let tensors = candle_core::safetensors::load(weights_path, &device).map_err(|e| {
            ClassifyError::model_load_error(
                weights_path,
                "failed to read safetensors weights",
                Some(e),
            )
        })?;
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        Self::from_graph(graph, vb, weights_path)
    }

    /// Builds the model from a descriptor and a weight source. `origin` is only
    /// used to label load errors.
    pub fn from_graph(graph: DenseGraph, vb: VarBuilder, origin: &Path) -> ClassifyResult<Self> {
        let [height, width, channels] = graph.input_shape;
        if channels != InputShape::CHANNELS || height == 0 || width == 0 {
            return Err(ClassifyError::model_load_message(
                origin,
                format!("unsupported graph input shape {:?}", graph.input_shape),
            ));
        }

        let invalid = |message: String| ClassifyError::model_load_message(origin, message);
        let weights = |layer: &str, e: candle_core::Error| {
            ClassifyError::model_load_error(
                origin,
                format!("failed to load weights for '{layer}'"),
                Some(e),
            )
        };

        let mut shape = FeatureShape::Spatial {
            c: channels,
            h: height,
            w: width,
        };
        let mut layers = Vec::with_capacity(graph.layers.len());

        for (idx, spec) in graph.layers.iter().enumerate() {
            match (spec, shape) {
                (LayerSpec::Rescaling { scale, offset }, _) => layers.push(Layer::Rescale {
                    scale: *scale,
                    offset: *offset,
                }),
                (
                    LayerSpec::Conv2d {
                        name,
                        filters,
                        kernel_size,
                        stride,
                        padding,
                        activation,
                    },
                    FeatureShape::Spatial { c, h, w },
                ) => {
                    let (k, s) = (*kernel_size, *stride);
                    if k == 0 || s == 0 || *filters == 0 {
                        return Err(invalid(format!("layer {idx} ('{name}') has a zero dimension")));
                    }
                    let (pad, out_h, out_w) = match padding {
                        Padding::Same if s == 1 && k % 2 == 1 => (k / 2, h, w),
                        Padding::Same => {
                            return Err(invalid(format!(
                                "layer {idx} ('{name}'): same padding needs stride 1, odd kernel"
                            )));
                        }
                        Padding::Valid if h >= k && w >= k => (0, (h - k) / s + 1, (w - k) / s + 1),
                        Padding::Valid => {
                            return Err(invalid(format!(
                                "layer {idx} ('{name}'): kernel {k} exceeds feature map {h}x{w}"
                            )));
                        }
                    };
                    let cfg = Conv2dConfig {
                        padding: pad,
                        stride: s,
                        ..Default::default()
                    };
                    let conv = candle_nn::conv2d(c, *filters, k, cfg, vb.pp(name))
                        .map_err(|e| weights(name, e))?;
                    layers.push(Layer::Conv {
                        conv,
                        activation: *activation,
                    });
                    shape = FeatureShape::Spatial {
                        c: *filters,
                        h: out_h,
                        w: out_w,
                    };
                }
                (LayerSpec::MaxPool2d { pool_size, stride }, FeatureShape::Spatial { c, h, w }) => {
                    let size = *pool_size;
                    let stride = stride.unwrap_or(size);
                    if size == 0 || stride == 0 || h < size || w < size {
                        return Err(invalid(format!(
                            "layer {idx}: pool {size}/{stride} does not fit feature map {h}x{w}"
                        )));
                    }
                    layers.push(Layer::MaxPool { size, stride });
                    shape = FeatureShape::Spatial {
                        c,
                        h: (h - size) / stride + 1,
                        w: (w - size) / stride + 1,
                    };
                }
                (LayerSpec::Flatten, FeatureShape::Spatial { c, h, w }) => {
                    layers.push(Layer::Flatten);
                    shape = FeatureShape::Flat(c * h * w);
                }
                (LayerSpec::Flatten, FeatureShape::Flat(_)) | (LayerSpec::Dropout { .. }, _) => {}
                (
                    LayerSpec::Dense {
                        name,
                        units,
                        activation,
                    },
                    FeatureShape::Flat(features),
                ) => {
                    if *units == 0 {
                        return Err(invalid(format!("layer {idx} ('{name}') has zero units")));
                    }
                    let linear = candle_nn::linear(features, *units, vb.pp(name))
                        .map_err(|e| weights(name, e))?;
                    layers.push(Layer::Linear {
                        linear,
                        activation: *activation,
                    });
                    shape = FeatureShape::Flat(*units);
                }
                (LayerSpec::Dense { name, .. }, FeatureShape::Spatial { .. }) => {
                    return Err(invalid(format!(
                        "layer {idx} ('{name}'): dense layer needs a flatten before it"
                    )));
                }
                (LayerSpec::Conv2d { name, .. }, FeatureShape::Flat(_)) => {
                    return Err(invalid(format!(
                        "layer {idx} ('{name}'): conv2d after flatten"
                    )));
                }
                (LayerSpec::MaxPool2d { .. }, FeatureShape::Flat(_)) => {
                    return Err(invalid(format!("layer {idx}: max_pool2d after flatten")));
                }
            }
        }

        let output_units = match shape {
            FeatureShape::Flat(units) => units,
            FeatureShape::Spatial { .. } => {
                return Err(invalid(
                    "graph must end in a flat score vector".to_string(),
                ));
            }
        };

        let model_name = graph
            .name
            .clone()
            .or_else(|| {
                origin
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_string())
            })
            .unwrap_or_else(|| "unknown_model".to_string());

        tracing::debug!(
            model = %model_name,
            layers = layers.len(),
            output_units,
            "dense model built"
        );

        Ok(Self {
            layers,
            input_shape: InputShape::new(height as u32, width as u32),
            output_units,
            device: vb.device().clone(),
            model_name,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn input_shape(&self) -> InputShape {
        self.input_shape
    }

    pub fn output_units(&self) -> usize {
        self.output_units
    }

    /// Runs the forward pass over an NHWC tensor and returns raw scores.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::ShapeMismatch`] if the tensor does not match the
    /// graph input, and [`ClassifyError::InferenceExecution`] if candle fails.
    pub fn predict(&self, tensor: &Tensor4D) -> ClassifyResult<Vec<f32>> {
        check_input_shape(&self.input_shape.nhwc(), tensor.shape())?;

        let (n, h, w, c) = tensor.dim();
        let data: Vec<f32> = tensor.iter().copied().collect();
        let run = || -> candle_core::Result<Vec<f32>> {
            let mut xs = Tensor::from_vec(data, (n, h, w, c), &self.device)?
                .permute((0, 3, 1, 2))?
                .contiguous()?;
            for layer in &self.layers {
                xs = layer.forward(&xs)?;
            }
            xs.flatten_all()?.to_vec1::<f32>()
        };
        run().map_err(|e| ClassifyError::inference_error(&self.model_name, "forward_pass", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn head_only_graph(h: usize, w: usize, units: usize) -> DenseGraph {
        DenseGraph {
            name: Some("head_only".to_string()),
            input_shape: [h, w, 3],
            layers: vec![
                LayerSpec::Flatten,
                LayerSpec::Dense {
                    name: "head".to_string(),
                    units,
                    activation: Activation::Linear,
                },
            ],
        }
    }

    fn vb_from(tensors: Vec<(&str, Tensor)>) -> VarBuilder<'static> {
        let map: HashMap<String, Tensor> = tensors
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        VarBuilder::from_tensors(map, DType::F32, &Device::Cpu)
    }

    #[test]
    fn test_head_bias_passes_through_as_scores() {
        let dev = Device::Cpu;
        let vb = vb_from(vec![
            ("head.weight", Tensor::zeros((3, 12), DType::F32, &dev).unwrap()),
            (
                "head.bias",
                Tensor::new(&[2.0f32, 1.0, 0.1], &dev).unwrap(),
            ),
        ]);
        let model = DenseModel::from_graph(head_only_graph(2, 2, 3), vb, Path::new("mem")).unwrap();
        assert_eq!(model.output_units(), 3);
        assert_eq!(model.model_name(), "head_only");

        let scores = model.predict(&Tensor4D::from_elem((1, 2, 2, 3), 200.0)).unwrap();
        assert_eq!(scores.len(), 3);
        assert!((scores[0] - 2.0).abs() < 1e-6);
        assert!((scores[2] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_rescaling_runs_inside_graph() {
        let dev = Device::Cpu;
        let mut graph = head_only_graph(2, 2, 1);
        graph.layers.insert(
            0,
            LayerSpec::Rescaling {
                scale: 1.0 / 255.0,
                offset: 0.0,
            },
        );
        let vb = vb_from(vec![
            ("head.weight", Tensor::ones((1, 12), DType::F32, &dev).unwrap()),
            ("head.bias", Tensor::zeros(1, DType::F32, &dev).unwrap()),
        ]);
        let model = DenseModel::from_graph(graph, vb, Path::new("mem")).unwrap();

        let scores = model.predict(&Tensor4D::from_elem((1, 2, 2, 3), 255.0)).unwrap();
        assert!((scores[0] - 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_conv_pool_shapes_are_inferred() {
        let dev = Device::Cpu;
        let graph = DenseGraph {
            name: None,
            input_shape: [8, 8, 3],
            layers: vec![
                LayerSpec::Conv2d {
                    name: "conv1".to_string(),
                    filters: 4,
                    kernel_size: 3,
                    stride: 1,
                    padding: Padding::Same,
                    activation: Activation::Relu,
                },
                LayerSpec::MaxPool2d {
                    pool_size: 2,
                    stride: None,
                },
                LayerSpec::Conv2d {
                    name: "conv2".to_string(),
                    filters: 2,
                    kernel_size: 3,
                    stride: 1,
                    padding: Padding::Valid,
                    activation: Activation::Relu,
                },
                LayerSpec::Flatten,
                LayerSpec::Dropout { rate: 0.5 },
                LayerSpec::Dense {
                    name: "logits".to_string(),
                    units: 5,
                    activation: Activation::Linear,
                },
            ],
        };
        // 8x8 -same-> 8x8x4 -pool-> 4x4x4 -valid3-> 2x2x2 -> 8 features.
        let vb = vb_from(vec![
            ("conv1.weight", Tensor::ones((4, 3, 3, 3), DType::F32, &dev).unwrap()),
            ("conv1.bias", Tensor::zeros(4, DType::F32, &dev).unwrap()),
            ("conv2.weight", Tensor::ones((2, 4, 3, 3), DType::F32, &dev).unwrap()),
            ("conv2.bias", Tensor::zeros(2, DType::F32, &dev).unwrap()),
            ("logits.weight", Tensor::ones((5, 8), DType::F32, &dev).unwrap()),
            ("logits.bias", Tensor::zeros(5, DType::F32, &dev).unwrap()),
        ]);
        let model = DenseModel::from_graph(graph, vb, Path::new("cnn.safetensors")).unwrap();
        assert_eq!(model.model_name(), "cnn");
        assert_eq!(model.input_shape(), InputShape::new(8, 8));

        let scores = model.predict(&Tensor4D::from_elem((1, 8, 8, 3), 1.0)).unwrap();
        assert_eq!(scores.len(), 5);
        assert!(scores.iter().all(|s| s.is_finite() && *s > 0.0));
    }

    #[test]
    fn test_missing_weight_is_model_load_error() {
        let dev = Device::Cpu;
        let vb = vb_from(vec![(
            "head.weight",
            Tensor::zeros((3, 12), DType::F32, &dev).unwrap(),
        )]);
        let err =
            DenseModel::from_graph(head_only_graph(2, 2, 3), vb, Path::new("mem")).unwrap_err();
        assert!(matches!(err, ClassifyError::ModelLoad { .. }));
    }

    #[test]
    fn test_dense_without_flatten_is_rejected() {
        let graph = DenseGraph {
            name: None,
            input_shape: [2, 2, 3],
            layers: vec![LayerSpec::Dense {
                name: "head".to_string(),
                units: 3,
                activation: Activation::Linear,
            }],
        };
        let err = DenseModel::from_graph(graph, vb_from(vec![]), Path::new("mem")).unwrap_err();
        assert!(err.to_string().contains("flatten"));
    }

    #[test]
    fn test_predict_rejects_wrong_spatial_size() {
        let dev = Device::Cpu;
        let vb = vb_from(vec![
            ("head.weight", Tensor::zeros((3, 12), DType::F32, &dev).unwrap()),
            ("head.bias", Tensor::zeros(3, DType::F32, &dev).unwrap()),
        ]);
        let model = DenseModel::from_graph(head_only_graph(2, 2, 3), vb, Path::new("mem")).unwrap();
        let err = model.predict(&Tensor4D::zeros((1, 4, 4, 3))).unwrap_err();
        assert!(matches!(err, ClassifyError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_graph_descriptor_parses_keras_style_json() {
        let graph: DenseGraph = serde_json::from_str(
            r#"{
                "input_shape": [100, 100, 3],
                "layers": [
                    {"type": "rescaling", "scale": 0.00392156862745098},
                    {
                        "type": "conv2d", "name": "conv1", "filters": 16, "kernel_size": 3,
                        "padding": "same", "activation": "relu"
                    },
                    {"type": "max_pool2d", "pool_size": 2},
                    {"type": "flatten"},
                    {"type": "dense", "name": "logits", "units": 5}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(graph.layers.len(), 5);
        assert!(matches!(
            graph.layers[1],
            LayerSpec::Conv2d {
                stride: 1,
                padding: Padding::Same,
                activation: Activation::Relu,
                ..
            }
        ));
        assert!(matches!(
            graph.layers[4],
            LayerSpec::Dense {
                activation: Activation::Linear,
                ..
            }
        ));
    }
}
