//! Startup resources.
//!
//! Everything the pipeline needs is loaded once into an immutable
//! [`Resources`] bundle that is passed explicitly to the classifier. Loading
//! fails fast: a missing or malformed file aborts construction before any
//! inference can be attempted.

use crate::backends::{create_backend, BackendConfig, InferenceBackend};
use crate::error::GenreError;
use crate::features::{self, FeatureVector};
use crate::reduction::{PcaFile, Reducer};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default resource directory, relative to the working directory.
pub const DEFAULT_RESOURCE_DIR: &str = "backend";

/// Locations of the resource files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceConfig {
    /// Fitted PCA transform (`pca.json`)
    pub pca_path: PathBuf,
    /// Network weights (`models/model.json`)
    pub weights_path: PathBuf,
    /// Reference recording used as the filler track (`songs/rock.wav`)
    pub reference_path: PathBuf,
}

impl ResourceConfig {
    /// Standard layout under a resource directory.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            pca_path: dir.join("pca.json"),
            weights_path: dir.join("models").join("model.json"),
            reference_path: dir.join("songs").join("rock.wav"),
        }
    }

    pub fn with_pca_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.pca_path = path.into();
        self
    }

    pub fn with_weights_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.weights_path = path.into();
        self
    }

    pub fn with_reference_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.reference_path = path.into();
        self
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self::from_dir(DEFAULT_RESOURCE_DIR)
    }
}

/// The loaded, read-only resources of one process.
pub struct Resources {
    reducer: Reducer,
    backend: Box<dyn InferenceBackend>,
}

impl Resources {
    /// Assemble a bundle from already constructed parts.
    ///
    /// The reducer's output must be exactly as wide as the backend's input.
    pub fn new(reducer: Reducer, backend: Box<dyn InferenceBackend>) -> Result<Self, GenreError> {
        if reducer.output_width() != backend.input_size() {
            return Err(GenreError::shape(
                "PCA output / network input",
                backend.input_size(),
                reducer.output_width(),
            ));
        }
        Ok(Self { reducer, backend })
    }

    /// Load every resource named by `config`.
    pub fn load(config: &ResourceConfig) -> Result<Self, GenreError> {
        info!("Loading resources");

        let pca_text = std::fs::read_to_string(&config.pca_path)
            .map_err(|e| GenreError::resource(&config.pca_path, e))?;
        let pca_file: PcaFile =
            serde_json::from_str(&pca_text).map_err(|e| GenreError::resource(&config.pca_path, e))?;

        let backend = create_backend(BackendConfig::Dense {
            weights_path: config.weights_path.clone(),
        })?;

        let filler = Self::load_filler(&config.reference_path, pca_file.scaler.is_some())?;

        let reducer = Reducer::from_file(pca_file, filler)
            .map_err(|e| GenreError::resource(&config.pca_path, e))?;

        let resources = Self::new(reducer, backend)?;
        info!(
            "Resources loaded: PCA {} -> {}, {} classes",
            features::feature_dim(),
            resources.reducer.output_width(),
            resources.backend.output_size()
        );
        Ok(resources)
    }

    /// Compute the filler vector. It is optional only when the transform
    /// carries its own scaler.
    fn load_filler(path: &Path, has_scaler: bool) -> Result<Option<FeatureVector>, GenreError> {
        if has_scaler && !path.exists() {
            warn!(
                "Reference recording {} not found; relying on the persisted scaler",
                path.display()
            );
            return Ok(None);
        }

        match features::compute_features(path) {
            Ok(filler) => Ok(Some(filler)),
            Err(e) => Err(GenreError::resource(path, e)),
        }
    }

    pub fn reducer(&self) -> &Reducer {
        &self.reducer
    }

    pub fn backend(&self) -> &dyn InferenceBackend {
        self.backend.as_ref()
    }
}

impl std::fmt::Debug for Resources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resources")
            .field("reducer", &self.reducer)
            .field("backend", &"<backend>")
            .finish()
    }
}
