//! # Genre Classifier
//!
//! Classifies the musical genre of a `.wav` file. Statistics over eleven
//! spectral, chroma and cepstral feature families are reduced through a
//! fitted PCA projection and fed to a small dense network over eight genres.
//!
//! ```no_run
//! use genre_classifier::GenreClassifier;
//!
//! let classifier = GenreClassifier::from_dir("backend")?;
//! let prediction = classifier.classify_file("song.wav")?;
//! println!("{prediction}");
//! # Ok::<(), genre_classifier::GenreError>(())
//! ```

pub mod audio;
pub mod backends;
mod error;
pub mod features;
pub mod inference;
pub mod reduction;
pub mod resources;
pub mod types;

pub use error::GenreError;
pub use features::{compute_features, FeatureVector};
pub use inference::messages::{ClassificationResult, WorkerCommand};
pub use inference::model::GenreClassifier;
pub use inference::worker::{ClassificationWorker, WorkerHandle};
pub use resources::{ResourceConfig, Resources};
pub use types::{ConfidencePhrase, Genre, Prediction};
