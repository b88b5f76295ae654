use crate::error::{RecognizeError, Result};
use std::path::Path;

/// Label produced for class indices the vocabulary does not cover.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Class labels indexed by class id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelVocabulary {
    labels: Vec<String>,
}

impl LabelVocabulary {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses one label per line. Lines are trimmed and blank lines skipped.
    pub fn parse(contents: &str) -> Self {
        Self::new(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty()),
        )
    }

    /// Reads a label file, failing on I/O errors or when no label is found.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RecognizeError::Startup(format!(
                "failed to read labels from {}: {e}",
                path.display()
            ))
        })?;
        let vocabulary = Self::parse(&contents);
        if vocabulary.is_empty() {
            return Err(RecognizeError::Startup(format!(
                "label file {} contains no labels",
                path.display()
            )));
        }
        log::info!("Loaded {} labels from {}", vocabulary.len(), path.display());
        Ok(vocabulary)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Returns the label for `index`, or [`UNKNOWN_LABEL`] when out of range.
    pub fn label_or_unknown(&self, index: usize) -> &str {
        self.get(index).unwrap_or(UNKNOWN_LABEL)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
