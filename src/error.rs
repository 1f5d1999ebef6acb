//! Error types for the genre classifier.
//!
//! This module defines the errors that can occur while loading resources,
//! decoding audio, extracting features and running inference. Every stage of
//! the pipeline returns a `Result<_, GenreError>` so that a failed extraction
//! is reported explicitly instead of leaking NaN values into the classifier.
//!
//! The main error type is `GenreError`, which encompasses all possible error
//! conditions that can occur within the library.

use std::path::PathBuf;
use thiserror::Error;

/// Represents all possible errors that can occur in the genre classifier.
///
/// This enum implements the standard Error trait using thiserror and provides
/// detailed error messages for each error case. It covers both internal
/// validation failures and wrapped errors from external dependencies.
#[derive(Error, Debug)]
pub enum GenreError {
    /// Indicates a failure in file system operations.
    ///
    /// This wraps the standard IO error, for example when the CLI cannot read
    /// the filename from standard input.
    #[error("Failed to access file: {0}")]
    FileError(#[from] std::io::Error),

    /// Indicates that the provided path is not a usable audio file path.
    ///
    /// This error occurs when:
    /// - The file extension is not .wav
    /// - The path points to a directory instead of a file
    ///
    /// A missing `.wav` file is reported as an extraction failure.
    #[error("Invalid audio file path: {0}")]
    InvalidPath(PathBuf),

    /// Indicates that the WAV container or its samples could not be decoded.
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    /// Indicates that feature extraction failed for a file.
    ///
    /// This error occurs when:
    /// - The audio could not be decoded
    /// - The audio is empty
    /// - The sample rate is too low for the configured filter banks
    /// - A computed feature is not finite
    #[error("Feature extraction failed for {path}: {reason}")]
    Extraction {
        /// File the extraction was attempted on
        path: PathBuf,
        /// Human readable cause
        reason: String,
    },

    /// Indicates that a startup resource is missing, unreadable or malformed.
    ///
    /// Resource errors are fatal: the classifier is never constructed when
    /// one of its resources fails to load.
    #[error("Failed to load resource {path}: {reason}")]
    Resource {
        /// Resource file that failed to load
        path: PathBuf,
        /// Human readable cause
        reason: String,
    },

    /// Indicates that two pipeline stages disagree on a vector or matrix width.
    #[error("Shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Stage or tensor that was checked
        what: String,
        /// Width required by the stage
        expected: usize,
        /// Width that was supplied
        actual: usize,
    },

    /// Indicates a failure in JSON deserialization of a resource file.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Indicates that the provided input data is invalid.
    ///
    /// This error occurs when:
    /// - A probability vector is empty
    /// - A class index is outside the label map
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Indicates that the background classification worker is unavailable.
    #[error("Classification worker error: {0}")]
    WorkerError(String),
}

impl GenreError {
    pub(crate) fn extraction(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        GenreError::Extraction {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn resource(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        GenreError::Resource {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        GenreError::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }
}

impl From<hound::Error> for GenreError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => GenreError::FileError(e),
            other => GenreError::Decode(other.to_string()),
        }
    }
}
