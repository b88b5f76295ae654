use crate::preprocess::InputTensor;

/// Class scores returned by a model, one entry per class index.
pub type ProbabilityVector = Vec<f32>;

/// Trait for classification models driven by the [`crate::InferenceEngine`].
///
/// Implementations own whatever session or weights they need. The engine moves
/// the model onto its worker thread, so `run` gets exclusive access and never
/// has to be reentrant.
pub trait InferenceModel {
    /// The error type that can be returned during inference.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Runs a forward pass on a `[1, H, W, 3]` tensor.
    fn run(&mut self, tensor: &InputTensor) -> Result<ProbabilityVector, Self::Error>;
}
