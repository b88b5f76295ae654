//! ONNX Runtime backed classifier.

use crate::error::RecognizeError;
use crate::model::{InferenceModel, ProbabilityVector};
use crate::preprocess::InputTensor;
use ort::session::{Session, SessionInputs};
use ort::value::TensorRef;
use std::borrow::Cow;
use std::path::Path;

// tensor names of the MobileNet v1 classifier
pub const DEFAULT_INPUT_NAME: &str = "input";
pub const DEFAULT_OUTPUT_NAME: &str = "MobilenetV1/Predictions/Reshape_1";

#[derive(Debug, thiserror::Error)]
pub enum OnnxError {
    #[error(transparent)]
    Ort(#[from] ort::Error),
    #[error("input tensor is not contiguous in memory")]
    NonContiguousInput,
    #[error("output '{name}' has shape {shape:?}, expected a single row of class scores")]
    UnexpectedOutputShape { name: String, shape: Vec<i64> },
}

/// A classification model loaded from an `.onnx` file.
pub struct OnnxClassifier {
    session: Session,
    input_name: String,
    output_name: String,
}

impl OnnxClassifier {
    /// Loads the model at `model_path`.
    pub fn from_file(
        model_path: impl AsRef<Path>,
        input_name: impl Into<String>,
        output_name: impl Into<String>,
    ) -> Result<Self, RecognizeError> {
        let path = model_path.as_ref();
        let session = Session::builder()
            .and_then(|builder| builder.commit_from_file(path))
            .map_err(|e| {
                RecognizeError::Startup(format!(
                    "failed to load model {}: {e}",
                    path.display()
                ))
            })?;
        log::info!("Loaded model from {}", path.display());

        Ok(Self {
            session,
            input_name: input_name.into(),
            output_name: output_name.into(),
        })
    }
}

impl InferenceModel for OnnxClassifier {
    type Error = OnnxError;

    fn run(&mut self, tensor: &InputTensor) -> Result<ProbabilityVector, OnnxError> {
        let dims: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
        let data = tensor.as_slice().ok_or(OnnxError::NonContiguousInput)?;
        let input = TensorRef::from_array_view((dims, data))?;

        let inputs: SessionInputs<'_, '_, 0> = SessionInputs::ValueMap(vec![(
            Cow::Borrowed(self.input_name.as_str()),
            input.into(),
        )]);
        let outputs = self.session.run(inputs)?;

        let (shape, scores) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
        // Accept [N] or [1, N]; anything with more than one row is not a
        // single-image prediction.
        let rows: i64 = shape.iter().rev().skip(1).product();
        if rows != 1 {
            return Err(OnnxError::UnexpectedOutputShape {
                name: self.output_name.clone(),
                shape: shape.iter().copied().collect(),
            });
        }
        Ok(scores.to_vec())
    }
}
