use crate::error::{RecognizeError, Result};
use std::time::Duration;

// defaults for the recognition pipeline
pub const DEFAULT_INPUT_HEIGHT: u32 = 224;
pub const DEFAULT_INPUT_WIDTH: u32 = 224;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Per-server settings for the recognition pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizeConfig {
    /// Height of the tensor fed to the model.
    pub input_height: u32,
    /// Width of the tensor fed to the model.
    pub input_width: u32,
    /// Number of predictions returned per request.
    pub top_k: usize,
    /// Deadline for decoding, preprocessing and inference of one request.
    pub request_timeout: Duration,
    /// Largest accepted request body.
    pub max_upload_bytes: usize,
}

impl Default for RecognizeConfig {
    fn default() -> Self {
        Self {
            input_height: DEFAULT_INPUT_HEIGHT,
            input_width: DEFAULT_INPUT_WIDTH,
            top_k: DEFAULT_TOP_K,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl RecognizeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.input_height == 0 || self.input_width == 0 {
            return Err(RecognizeError::Startup(format!(
                "input size must be non-zero, got {}x{}",
                self.input_width, self.input_height
            )));
        }
        if self.top_k == 0 {
            return Err(RecognizeError::Startup("top-k must be at least 1".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(RecognizeError::Startup(
                "request timeout must be non-zero".to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(RecognizeError::Startup(
                "max upload size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RecognizeConfig::default();
        assert_eq!((config.input_height, config.input_width), (224, 224));
        assert_eq!(config.top_k, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_values_are_rejected() {
        let zero_k = RecognizeConfig {
            top_k: 0,
            ..Default::default()
        };
        assert!(matches!(zero_k.validate(), Err(RecognizeError::Startup(_))));

        let zero_width = RecognizeConfig {
            input_width: 0,
            ..Default::default()
        };
        assert!(zero_width.validate().is_err());

        let zero_timeout = RecognizeConfig {
            request_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero_timeout.validate().is_err());
    }
}
