//! Backend abstraction for genre inference
//!
//! This module provides a trait-based abstraction over the classifier that
//! turns a reduced feature vector into class probabilities:
//!
//! - **Dense Backend**: the fixed feed-forward network, with weights loaded
//!   from a JSON file
//!
//! Tests and embedders can supply their own implementation of
//! `InferenceBackend` (for example a canned distribution) and hand it to the
//! resource bundle directly.

use crate::error::GenreError;
use std::path::PathBuf;

pub mod dense;

/// Configuration for different backend types
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// Fixed-topology dense network
    Dense {
        /// Path to the weights file
        weights_path: PathBuf,
    },
}

/// Trait for inference backends
pub trait InferenceBackend: Send + Sync {
    /// Run the classifier on one reduced feature vector.
    ///
    /// Returns one probability per genre, in class index order.
    fn predict(&self, input: &[f32]) -> Result<Vec<f32>, GenreError>;

    /// Width of the input vector the backend accepts
    fn input_size(&self) -> usize;

    /// Number of classes the backend produces
    fn output_size(&self) -> usize;

    /// Human readable description of the layers, one line per layer
    fn summary(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Factory function to create the appropriate backend
pub fn create_backend(config: BackendConfig) -> Result<Box<dyn InferenceBackend>, GenreError> {
    match config {
        BackendConfig::Dense { weights_path } => {
            if weights_path.extension().and_then(|e| e.to_str()) != Some("json") {
                return Err(GenreError::resource(
                    &weights_path,
                    "weights file must have a .json extension",
                ));
            }
            Ok(Box::new(dense::DenseNetwork::load(&weights_path)?))
        }
    }
}
