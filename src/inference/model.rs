use crate::error::GenreError;
use crate::features::{self, FeatureVector};
use crate::resources::{ResourceConfig, Resources};
use crate::types::Prediction;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Main genre classifier interface: feature extraction, reduction and
/// inference over one shared resource bundle.
#[derive(Clone)]
pub struct GenreClassifier {
    resources: Arc<Resources>,
}

impl GenreClassifier {
    /// Load resources from disk and build a classifier.
    pub fn new(config: &ResourceConfig) -> Result<Self, GenreError> {
        Ok(Self::from_resources(Resources::load(config)?))
    }

    /// Load resources from the standard layout under `dir`.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, GenreError> {
        Self::new(&ResourceConfig::from_dir(dir))
    }

    /// Wrap an already assembled bundle.
    pub fn from_resources(resources: Resources) -> Self {
        Self {
            resources: Arc::new(resources),
        }
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// Extract features from a WAV file without classifying it.
    pub fn extract<P: AsRef<Path>>(&self, path: P) -> Result<FeatureVector, GenreError> {
        features::compute_features(path)
    }

    /// Standardize and project a raw feature vector to the network input.
    pub fn reduce(&self, features: &FeatureVector) -> Result<Vec<f32>, GenreError> {
        self.resources.reducer().reduce(features)
    }

    /// Run the classifier on a raw feature vector.
    pub fn classify_features(&self, features: &FeatureVector) -> Result<Prediction, GenreError> {
        let reduced = self.reduce(features)?;
        let backend = self.resources.backend();
        if reduced.len() != backend.input_size() {
            return Err(GenreError::shape(
                "network input",
                backend.input_size(),
                reduced.len(),
            ));
        }
        let probabilities = backend.predict(&reduced)?;
        debug!("Class probabilities: {:?}", probabilities);
        Prediction::from_probabilities(probabilities, reduced.len())
    }

    /// Full pipeline: decode, extract, reduce and classify one file.
    pub fn classify_file<P: AsRef<Path>>(&self, path: P) -> Result<Prediction, GenreError> {
        let path = path.as_ref();
        Self::validate_path(path)?;
        let features = self.extract(path)?;
        let prediction = self.classify_features(&features)?;
        info!(
            "{}: {} ({:.1}%)",
            path.display(),
            prediction.genre,
            prediction.confidence * 100.0
        );
        Ok(prediction)
    }

    fn validate_path(path: &Path) -> Result<(), GenreError> {
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        if !is_wav || path.is_dir() {
            return Err(GenreError::InvalidPath(path.to_path_buf()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for GenreClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenreClassifier")
            .field("resources", &self.resources)
            .finish()
    }
}
