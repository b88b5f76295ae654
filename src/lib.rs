//! Image recognition server.
//!
//! An uploaded JPEG or PNG is decoded, resized to the model's input size,
//! packed into a `[1, H, W, 3]` tensor, classified by an [`InferenceModel`]
//! running on an [`InferenceEngine`], and answered with the top-K labels.

pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod labels;
pub mod model;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod pipeline;
pub mod preprocess;
pub mod server;
pub mod topk;

pub use config::RecognizeConfig;
pub use decode::{DecodedImage, SUPPORTED_FORMATS, decode, decode_reader};
pub use engine::{InferenceEngine, InferenceEngineResponse, InferenceEngineState};
pub use error::RecognizeError;
pub use labels::{LabelVocabulary, UNKNOWN_LABEL};
pub use model::{InferenceModel, ProbabilityVector};
pub use pipeline::Recognizer;
pub use preprocess::{InputTensor, preprocess};
pub use server::router;
pub use topk::{RecognitionResult, top_k};
