//! ONNX model loading and inference via the `ort` crate.

use std::path::Path;
use std::sync::Mutex;

use ndarray::ArrayView2;
use ort::session::Session;
use ort::value::TensorRef;

use crate::error::PipelineError;

/// A two-input scorer: image features first, auxiliary features second.
///
/// Implementations must be safe to share across threads once loaded.
pub trait Classifier: Send + Sync {
    /// Feature length each input expects, if the model declares one.
    fn input_len(&self) -> Option<usize>;

    /// Score one sample. Returns the raw model output, nominally in [0, 1].
    fn classify(&self, image: &[f32], auxiliary: &[f32]) -> Result<f32, PipelineError>;
}

pub struct DfuModel {
    session: Mutex<Session>,
    image_input: String,
    auxiliary_input: String,
    input_len: Option<usize>,
}

impl DfuModel {
    /// Load an ONNX model with two inputs from the given path.
    pub fn load(model_path: &Path) -> Result<Self, PipelineError> {
        let load_err = |reason: String| PipelineError::ModelLoad {
            path: model_path.to_path_buf(),
            reason,
        };

        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(4))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| load_err(e.to_string()))?;

        if session.inputs.len() != 2 {
            return Err(load_err(format!(
                "expected 2 inputs, found {}",
                session.inputs.len()
            )));
        }
        if session.outputs.is_empty() {
            return Err(load_err("model has no outputs".into()));
        }

        let image_input = session.inputs[0].name.clone();
        let auxiliary_input = session.inputs[1].name.clone();

        // Trailing dimension of each input; dynamic (-1) dims are unknown.
        let dims: Vec<Option<usize>> = session
            .inputs
            .iter()
            .map(|input| {
                input
                    .input_type
                    .tensor_shape()
                    .and_then(|shape| shape.last().copied())
                    .and_then(|d| usize::try_from(d).ok())
            })
            .collect();
        let input_len = match (dims[0], dims[1]) {
            (Some(a), Some(b)) if a != b => {
                return Err(load_err(format!(
                    "inputs disagree on feature length: {a} vs {b}"
                )));
            }
            (a, b) => a.or(b),
        };

        tracing::debug!(
            path = %model_path.display(),
            image_input,
            auxiliary_input,
            ?input_len,
            "model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            image_input,
            auxiliary_input,
            input_len,
        })
    }
}

impl Classifier for DfuModel {
    fn input_len(&self) -> Option<usize> {
        self.input_len
    }

    /// Each input is fed as a `[1, n]` batch of one.
    fn classify(&self, image: &[f32], auxiliary: &[f32]) -> Result<f32, PipelineError> {
        let image = ArrayView2::from_shape((1, image.len()), image)
            .map_err(|e| PipelineError::Inference(e.to_string()))?;
        let auxiliary = ArrayView2::from_shape((1, auxiliary.len()), auxiliary)
            .map_err(|e| PipelineError::Inference(e.to_string()))?;

        let image_tensor = TensorRef::from_array_view(image)?;
        let auxiliary_tensor = TensorRef::from_array_view(auxiliary)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| PipelineError::Inference(format!("lock error: {e}")))?;
        let outputs = session.run(ort::inputs![
            &*self.image_input => image_tensor,
            &*self.auxiliary_input => auxiliary_tensor,
        ])?;

        let (_shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        data.first().copied().ok_or(PipelineError::EmptyOutput)
    }
}
