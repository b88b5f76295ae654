use crate::config::RecognizeConfig;
use crate::decode::decode;
use crate::engine::{InferenceEngine, InferenceEngineState};
use crate::error::{RecognizeError, Result};
use crate::labels::LabelVocabulary;
use crate::model::InferenceModel;
use crate::preprocess::{InputTensor, preprocess};
use crate::topk::{RecognitionResult, top_k};
use axum::body::Bytes;
use std::sync::Arc;

/// Process-wide recognition state: the engine, the labels and the settings.
///
/// Built once at startup and cloned into every request; clones share the
/// engine and vocabulary.
#[derive(Clone)]
pub struct Recognizer {
    engine: Arc<InferenceEngine>,
    vocabulary: Arc<LabelVocabulary>,
    config: RecognizeConfig,
}

impl Recognizer {
    pub fn new(
        engine: InferenceEngine,
        vocabulary: LabelVocabulary,
        config: RecognizeConfig,
    ) -> Result<Self> {
        config.validate()?;
        if vocabulary.is_empty() {
            return Err(RecognizeError::Startup(
                "label vocabulary is empty".to_string(),
            ));
        }
        Ok(Self {
            engine: Arc::new(engine),
            vocabulary: Arc::new(vocabulary),
            config,
        })
    }

    /// Starts an engine for `model` and wraps it.
    pub fn with_model<M>(
        model: M,
        vocabulary: LabelVocabulary,
        config: RecognizeConfig,
    ) -> Result<Self>
    where
        M: InferenceModel + Send + 'static,
    {
        Self::new(InferenceEngine::new(model), vocabulary, config)
    }

    pub fn config(&self) -> &RecognizeConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }

    pub fn engine_state(&self) -> InferenceEngineState {
        self.engine.state()
    }

    /// Decodes `bytes`, runs the model and returns the top-K predictions.
    ///
    /// The whole pipeline runs under the configured deadline; when it expires
    /// the request fails and no partial result is produced.
    pub async fn recognize(&self, bytes: Bytes) -> Result<Vec<RecognitionResult>> {
        let deadline = self.config.request_timeout;
        tokio::time::timeout(deadline, self.run_pipeline(bytes))
            .await
            .map_err(|_| RecognizeError::Timeout(deadline))?
    }

    async fn run_pipeline(&self, bytes: Bytes) -> Result<Vec<RecognitionResult>> {
        let (height, width) = (self.config.input_height, self.config.input_width);
        let tensor = tokio::task::spawn_blocking(move || -> Result<InputTensor> {
            let image = decode(&bytes)?;
            preprocess(&image, height, width)
        })
        .await
        .map_err(|e| RecognizeError::Preprocess(format!("preprocessing task failed: {e}")))??;

        let probabilities = self.engine.infer(tensor).await?;
        check_probabilities(&probabilities, &self.vocabulary)?;

        Ok(top_k(&probabilities, &self.vocabulary, self.config.top_k))
    }
}

/// Rejects model output that cannot cover the vocabulary or holds
/// non-finite scores.
fn check_probabilities(probabilities: &[f32], vocabulary: &LabelVocabulary) -> Result<()> {
    if probabilities.is_empty() {
        return Err(RecognizeError::Inference(
            "model returned no scores".to_string(),
        ));
    }
    if probabilities.len() < vocabulary.len() {
        return Err(RecognizeError::Inference(format!(
            "model returned {} scores for {} labels",
            probabilities.len(),
            vocabulary.len()
        )));
    }
    if let Some(index) = probabilities.iter().position(|score| !score.is_finite()) {
        return Err(RecognizeError::Inference(format!(
            "model returned non-finite score {} for class {index}",
            probabilities[index]
        )));
    }
    Ok(())
}
