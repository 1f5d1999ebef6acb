//! Message types for the background classification worker.
//!
//! The presentation layer talks to the worker with commands over a channel.
//! A classification request carries its own reply channel, so every request
//! receives exactly one typed result: a prediction or the reason it failed.

use crate::error::GenreError;
use crate::types::Prediction;
use crossbeam::channel::Sender;
use std::path::PathBuf;

/// Result delivered for one classification request.
pub type ClassificationResult = Result<Prediction, GenreError>;

/// Commands accepted by the classification worker.
pub enum WorkerCommand {
    /// Run the full pipeline on one WAV file
    ClassifyFile {
        /// File to classify
        path: PathBuf,
        /// Channel for the single reply to this request
        reply: Sender<ClassificationResult>,
    },

    /// Stop the worker loop
    Shutdown,
}

impl std::fmt::Debug for WorkerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerCommand::ClassifyFile { path, .. } => f
                .debug_struct("ClassifyFile")
                .field("path", path)
                .finish(),
            WorkerCommand::Shutdown => f.write_str("Shutdown"),
        }
    }
}
