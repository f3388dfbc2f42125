//! Compiled interpreter backend on ONNX Runtime.

use super::{InputShape, Tensor4D, check_input_shape};
use crate::core::errors::{ClassifyError, ClassifyResult, SimpleError};
use ort::logging::LogLevel;
use ort::session::{Session, SessionInputs};
use ort::tensor::TensorElementType;
use ort::value::{TensorRef, ValueType};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// ONNX Runtime sessions over one compiled model.
///
/// A session is not safe to run from several threads at once, so each one sits
/// behind its own mutex. Calls are spread round-robin over the pool; with the
/// default pool size of one, all calls are serialized.
pub struct CompiledInterpreter {
    sessions: Vec<Mutex<Session>>,
    next_idx: AtomicUsize,
    input_name: String,
    output_name: String,
    layout: SlotLayout,
    model_path: PathBuf,
    model_name: String,
}

impl std::fmt::Debug for CompiledInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledInterpreter")
            .field("sessions", &self.sessions.len())
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("layout", &self.layout)
            .field("model_path", &self.model_path)
            .finish()
    }
}

/// Declared element type and shape of one model slot.
#[derive(Debug, Clone, PartialEq)]
struct SlotSpec {
    ty: TensorElementType,
    shape: Vec<i64>,
}

impl SlotSpec {
    fn from_value_type(value_type: &ValueType) -> Option<Self> {
        match value_type {
            ValueType::Tensor { ty, shape, .. } => Some(Self {
                ty: *ty,
                shape: shape.iter().copied().collect(),
            }),
            _ => None,
        }
    }
}

/// Input/output layout a servable compiled model has: one f32 NHWC RGB image
/// in, one f32 score vector out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotLayout {
    input_shape: InputShape,
    /// Input shape a single-image tensor must match; `-1` marks a dynamic batch.
    expected_input: [i64; 4],
    /// `None` when the class dimension is dynamic.
    output_units: Option<usize>,
}

impl SlotLayout {
    /// Checks the declared slots and resolves dynamic spatial dimensions with
    /// `input_size`.
    fn resolve(
        input: &SlotSpec,
        output: &SlotSpec,
        input_size: Option<(u32, u32)>,
    ) -> Result<Self, String> {
        if input.ty != TensorElementType::Float32 {
            return Err(format!("expected f32 input, model declares {:?}", input.ty));
        }
        if output.ty != TensorElementType::Float32 {
            return Err(format!("expected f32 output, model declares {:?}", output.ty));
        }

        let input_shape = resolve_input_shape(&input.shape, input_size)?;
        let batch = input.shape[0];
        if batch != 1 && batch >= 0 {
            return Err(format!(
                "expected a batch dimension of 1, model declares {:?}",
                input.shape
            ));
        }

        let classes = match output.shape.as_slice() {
            [c] => *c,
            [n, c] if *n == 1 || *n < 0 => *c,
            _ => {
                return Err(format!(
                    "expected a [classes] or [1, classes] output, model declares {:?}",
                    output.shape
                ));
            }
        };
        let output_units = match classes {
            c if c < 0 => None,
            0 => return Err("model declares an output with zero classes".to_string()),
            c => Some(c as usize),
        };

        Ok(Self {
            input_shape,
            expected_input: [
                batch,
                input_shape.height as i64,
                input_shape.width as i64,
                InputShape::CHANNELS as i64,
            ],
            output_units,
        })
    }

    fn check(&self, tensor: &Tensor4D) -> ClassifyResult<()> {
        check_input_shape(&self.expected_input, tensor.shape())
    }
}

impl CompiledInterpreter {
    /// Creates the session pool and discovers the input/output slots.
    ///
    /// # Arguments
    ///
    /// * `model_path` - Path to the ONNX model file
    /// * `pool_size` - Number of sessions to create (at least one)
    /// * `input_size` - `(height, width)` to use when the model's spatial
    ///   dimensions are dynamic
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::ModelLoad`] if a session cannot be created, or
    /// the model's slots are not one f32 NHWC RGB image in and one f32 score
    /// vector out.
    pub fn load(
        model_path: &Path,
        pool_size: usize,
        input_size: Option<(u32, u32)>,
    ) -> ClassifyResult<Self> {
        let pool_size = pool_size.max(1);
        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let session = Session::builder()
                .and_then(|b| b.with_log_level(LogLevel::Error))
                .and_then(|b| b.commit_from_file(model_path))
                .map_err(|e| {
                    ClassifyError::model_load_error(
                        model_path,
                        "failed to create ONNX Runtime session",
                        Some(e),
                    )
                })?;
            sessions.push(session);
        }

        let first = &sessions[0];
        let input = first.inputs().first().ok_or_else(|| {
            ClassifyError::model_load_message(model_path, "model declares no inputs")
        })?;
        let input_spec = SlotSpec::from_value_type(input.dtype()).ok_or_else(|| {
            ClassifyError::model_load_message(
                model_path,
                format!("model input '{}' is not a tensor", input.name()),
            )
        })?;
        let input_name = input.name().to_string();

        let output = first.outputs().first().ok_or_else(|| {
            ClassifyError::model_load_message(model_path, "model declares no outputs")
        })?;
        let output_spec = SlotSpec::from_value_type(output.dtype()).ok_or_else(|| {
            ClassifyError::model_load_message(
                model_path,
                format!("model output '{}' is not a tensor", output.name()),
            )
        })?;
        let output_name = output.name().to_string();

        let layout = SlotLayout::resolve(&input_spec, &output_spec, input_size)
            .map_err(|message| ClassifyError::model_load_message(model_path, message))?;

        let model_name = model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown_model")
            .to_string();

        tracing::debug!(
            model = %model_name,
            input = %input_name,
            output = %output_name,
            declared_input = ?input_spec.shape,
            declared_output = ?output_spec.shape,
            pool = pool_size,
            "compiled interpreter ready"
        );

        Ok(Self {
            sessions: sessions.into_iter().map(Mutex::new).collect(),
            next_idx: AtomicUsize::new(0),
            input_name,
            output_name,
            layout,
            model_path: model_path.to_path_buf(),
            model_name,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn input_shape(&self) -> InputShape {
        self.layout.input_shape
    }

    pub fn output_units(&self) -> Option<usize> {
        self.layout.output_units
    }

    /// Binds `tensor` to the input slot, runs the session and reads the output
    /// slot back as raw scores.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::ShapeMismatch`] if the tensor does not match the
    /// declared input shape, and [`ClassifyError::InferenceExecution`] for any
    /// failure inside ONNX Runtime.
    pub fn predict(&self, tensor: &Tensor4D) -> ClassifyResult<Vec<f32>> {
        self.layout.check(tensor)?;

        let (dims, data) = contiguous_input(tensor, &self.model_name)?;
        let input_tensor = TensorRef::from_array_view((dims, data)).map_err(|e| {
            ClassifyError::inference_error(&self.model_name, "tensor_conversion", e)
        })?;
        let inputs: SessionInputs<'_, '_, 0> = SessionInputs::ValueMap(vec![(
            Cow::Borrowed(self.input_name.as_str()),
            input_tensor.into(),
        )]);

        let idx = self.next_idx.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[idx].lock().map_err(|_| {
            ClassifyError::inference_error(
                &self.model_name,
                format!("session {}/{} lock", idx, self.sessions.len()),
                SimpleError::new("session lock poisoned"),
            )
        })?;

        let outputs = session
            .run(inputs)
            .map_err(|e| ClassifyError::inference_error(&self.model_name, "forward_pass", e))?;
        let (_, scores) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                ClassifyError::inference_error(&self.model_name, "output_extraction", e)
            })?;
        Ok(scores.to_vec())
    }
}

/// Borrows `tensor` as the dims and flat data ONNX Runtime binds from.
fn contiguous_input<'a>(
    tensor: &'a Tensor4D,
    model_name: &str,
) -> ClassifyResult<(Vec<i64>, &'a [f32])> {
    let dims: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
    let data = tensor.as_slice().ok_or_else(|| {
        ClassifyError::inference_error(
            model_name,
            "tensor_conversion",
            SimpleError::new("input tensor is not contiguous in memory"),
        )
    })?;
    Ok((dims, data))
}

/// Works out the `(height, width)` a model takes from its declared NHWC input
/// shape and an optional override for dynamic dimensions.
fn resolve_input_shape(
    declared: &[i64],
    input_size: Option<(u32, u32)>,
) -> Result<InputShape, String> {
    if declared.len() != 4 {
        return Err(format!("expected a 4D NHWC input, model declares {declared:?}"));
    }
    if declared[3] != InputShape::CHANNELS as i64 {
        return Err(format!(
            "expected NHWC input with 3 channels, model declares {declared:?}"
        ));
    }

    let (height, width) = (declared[1], declared[2]);
    match input_size {
        Some((h, w)) => {
            let fits = |d: i64, v: u32| d < 0 || d == v as i64;
            if fits(height, h) && fits(width, w) {
                Ok(InputShape::new(h, w))
            } else {
                Err(format!(
                    "configured input size ({h}, {w}) conflicts with declared shape {declared:?}"
                ))
            }
        }
        None if height > 0 && width > 0 => Ok(InputShape::new(height as u32, width as u32)),
        None => Err(format!(
            "model declares dynamic spatial dimensions {declared:?}; set input_size"
        )),
    }
}
