use std::time::Duration;

/// Errors produced while serving a recognition request or starting the server.
#[derive(Debug, thiserror::Error)]
pub enum RecognizeError {
    /// None of the supported codecs could decode the input.
    #[error("unsupported image format (attempted: {})", .attempted.join(", "))]
    UnsupportedFormat { attempted: Vec<&'static str> },

    /// The image decoded but cannot be used, e.g. it has a zero dimension.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The upload itself was malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The upload exceeded the configured body limit.
    #[error("upload too large: {0}")]
    PayloadTooLarge(String),

    /// Resampling or tensor packing failed.
    #[error("preprocessing failed: {0}")]
    Preprocess(String),

    /// The inference engine failed or returned malformed output.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The request did not finish within the configured deadline.
    #[error("request exceeded the deadline of {0:?}")]
    Timeout(Duration),

    /// Model, labels or configuration could not be loaded.
    #[error("startup failed: {0}")]
    Startup(String),
}

impl RecognizeError {
    /// Returns true for errors caused by the client's input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RecognizeError::UnsupportedFormat { .. }
                | RecognizeError::InvalidImage(_)
                | RecognizeError::BadRequest(_)
                | RecognizeError::PayloadTooLarge(_)
        )
    }
}

pub type Result<T, E = RecognizeError> = std::result::Result<T, E>;
