use std::io;

use burn::record::RecorderError;

use crate::dataset_manager::DatasetError;

/// Represents the different types of errors that can occur in the fashion classifier.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// A weights file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// An image file could not be read or decoded
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    /// An image or weight tensor does not have the shape the model expects
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
    /// An operation was called before the state it depends on exists
    #[error("Precondition failed: {0}")]
    Precondition(String),
    /// A test image index past the end of the test split
    #[error("Index {index} is out of range for a test split of {len} images")]
    IndexOutOfRange { index: usize, len: usize },
    /// A weights file was readable but could not be decoded as a model record
    #[error("Weights error: {0}")]
    Weights(String),
    /// A configuration value the classifier cannot work with
    #[error("Configuration error: {0}")]
    Config(String),
    /// The tensor backend failed in a way that has no better category
    #[error("Backend error: {0}")]
    Backend(String),
    /// The dataset could not be fetched, verified or parsed
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
}

impl From<RecorderError> for ClassifierError {
    fn from(err: RecorderError) -> Self {
        ClassifierError::Weights(err.to_string())
    }
}

impl ClassifierError {
    pub(crate) fn shape_mismatch(expected: impl std::fmt::Debug, actual: impl std::fmt::Debug) -> Self {
        ClassifierError::ShapeMismatch {
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }
}
