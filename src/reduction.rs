//! Standardization and PCA projection of raw feature vectors.
//!
//! The projection is fitted offline and loaded from `pca.json`. Standardizing
//! the raw features before projecting works in one of two modes:
//!
//! - **Persisted scaler**: the file carries the mean and scale that were
//!   fitted on the training set; each query is standardized on its own.
//! - **Filler stacking**: without a persisted scaler, the query is stacked
//!   with the features of a reference recording and standardized over those
//!   two rows only. This is numerically fragile (the variance of two samples)
//!   and only kept for transform files that predate the persisted scaler.

use crate::error::GenreError;
use crate::features::FeatureVector;
use ndarray::{Array1, Array2, ArrayView1};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// On-disk layout of `pca.json`.
#[derive(Debug, Deserialize)]
pub struct PcaFile {
    /// Per-feature mean subtracted before projection
    pub mean: Vec<f32>,
    /// Principal axes, one row per output component
    pub components: Vec<Vec<f32>>,
    /// Variance explained by each component, needed when whitening
    #[serde(default)]
    pub explained_variance: Option<Vec<f32>>,
    /// Divide each projected component by its standard deviation
    #[serde(default)]
    pub whiten: bool,
    /// Fitted standardization, stored alongside the projection
    #[serde(default)]
    pub scaler: Option<ScalerFile>,
}

/// Fitted standardization parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ScalerFile {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

/// Per-feature standardization `(x - mean) / scale`.
#[derive(Debug, Clone)]
pub struct Standardizer {
    mean: Array1<f32>,
    scale: Array1<f32>,
}

impl Standardizer {
    pub fn new(mean: Vec<f32>, scale: Vec<f32>) -> Result<Self, GenreError> {
        if mean.len() != scale.len() {
            return Err(GenreError::shape("scaler scale", mean.len(), scale.len()));
        }
        ensure_finite("scaler mean", &mean)?;
        ensure_finite("scaler scale", &scale)?;
        // Zero-variance features are left unscaled.
        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect::<Vec<_>>();
        Ok(Self {
            mean: Array1::from(mean),
            scale: Array1::from(scale),
        })
    }

    /// Fit on the rows of a matrix, using the population standard deviation.
    pub fn fit(rows: &Array2<f32>) -> Self {
        let n = rows.nrows().max(1) as f32;
        let mean = rows.sum_axis(ndarray::Axis(0)) / n;
        let var = rows
            .rows()
            .into_iter()
            .fold(Array1::<f32>::zeros(rows.ncols()), |acc, row| {
                let d = &row - &mean;
                acc + &d * &d
            })
            / n;
        let scale = var.mapv(|v| if v > 0.0 { v.sqrt() } else { 1.0 });
        Self { mean, scale }
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: ArrayView1<'_, f32>) -> Result<Array1<f32>, GenreError> {
        if x.len() != self.width() {
            return Err(GenreError::shape("standardization input", self.width(), x.len()));
        }
        Ok((&x - &self.mean) / &self.scale)
    }
}

/// Fitted linear projection from raw features to the network input.
#[derive(Debug, Clone)]
pub struct PcaTransform {
    mean: Array1<f32>,
    /// `(n_components, n_features)`
    components: Array2<f32>,
    whiten_scale: Option<Array1<f32>>,
}

impl PcaTransform {
    pub fn new(
        mean: Vec<f32>,
        components: Vec<Vec<f32>>,
        explained_variance: Option<Vec<f32>>,
        whiten: bool,
    ) -> Result<Self, GenreError> {
        let n_features = mean.len();
        let n_components = components.len();
        if n_components == 0 || n_features == 0 {
            return Err(GenreError::InvalidInput(
                "PCA transform has no components".to_string(),
            ));
        }

        ensure_finite("PCA mean", &mean)?;
        let mut flat = Vec::with_capacity(n_components * n_features);
        for row in &components {
            if row.len() != n_features {
                return Err(GenreError::shape("PCA component", n_features, row.len()));
            }
            flat.extend_from_slice(row);
        }
        ensure_finite("PCA components", &flat)?;
        let components = Array2::from_shape_vec((n_components, n_features), flat)
            .map_err(|e| GenreError::InvalidInput(e.to_string()))?;

        let whiten_scale = if whiten {
            let variance = explained_variance.ok_or_else(|| {
                GenreError::InvalidInput("whitening requires explained_variance".to_string())
            })?;
            if variance.len() != n_components {
                return Err(GenreError::shape("explained variance", n_components, variance.len()));
            }
            ensure_finite("explained variance", &variance)?;
            Some(Array1::from(variance).mapv(|v| if v > 0.0 { v.sqrt() } else { 1.0 }))
        } else {
            None
        };

        Ok(Self {
            mean: Array1::from(mean),
            components,
            whiten_scale,
        })
    }

    pub fn input_width(&self) -> usize {
        self.components.ncols()
    }

    pub fn output_width(&self) -> usize {
        self.components.nrows()
    }

    /// Project one standardized row.
    pub fn transform(&self, x: ArrayView1<'_, f32>) -> Result<Array1<f32>, GenreError> {
        if x.len() != self.input_width() {
            return Err(GenreError::shape("PCA input", self.input_width(), x.len()));
        }
        let centered = &x - &self.mean;
        let projected = self.components.dot(&centered);
        Ok(match &self.whiten_scale {
            Some(scale) => projected / scale,
            None => projected,
        })
    }
}

fn ensure_finite(what: &str, values: &[f32]) -> Result<(), GenreError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(GenreError::InvalidInput(format!(
            "{what} has a non-finite entry at index {index}"
        ))),
        None => Ok(()),
    }
}

/// How queries are standardized before projection.
#[derive(Debug, Clone)]
pub enum Standardization {
    /// Fitted mean and scale stored with the transform.
    Persisted(Standardizer),
    /// Standardize over the query stacked with a reference vector.
    FillerStacked(FeatureVector),
}

/// Standardization followed by PCA projection.
#[derive(Debug, Clone)]
pub struct Reducer {
    pca: PcaTransform,
    standardization: Standardization,
}

impl Reducer {
    pub fn new(pca: PcaTransform, standardization: Standardization) -> Result<Self, GenreError> {
        let width = match &standardization {
            Standardization::Persisted(scaler) => scaler.width(),
            Standardization::FillerStacked(filler) => filler.len(),
        };
        if width != pca.input_width() {
            return Err(GenreError::shape("standardization width", pca.input_width(), width));
        }
        Ok(Self {
            pca,
            standardization,
        })
    }

    /// Read `pca.json`. The reference vector is used only when the file
    /// carries no persisted scaler.
    pub fn load<P: AsRef<Path>>(
        path: P,
        filler: Option<FeatureVector>,
    ) -> Result<Self, GenreError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| GenreError::resource(path, e))?;
        let file: PcaFile = serde_json::from_str(&text).map_err(|e| GenreError::resource(path, e))?;
        Self::from_file(file, filler).map_err(|e| GenreError::resource(path, e))
    }

    pub fn from_file(file: PcaFile, filler: Option<FeatureVector>) -> Result<Self, GenreError> {
        let pca = PcaTransform::new(
            file.mean,
            file.components,
            file.explained_variance,
            file.whiten,
        )?;

        let standardization = match (file.scaler, filler) {
            (Some(scaler), _) => {
                info!("Using persisted standardization");
                Standardization::Persisted(Standardizer::new(scaler.mean, scaler.scale)?)
            }
            (None, Some(filler)) => {
                info!("No persisted scaler, standardizing against the filler track");
                Standardization::FillerStacked(filler)
            }
            (None, None) => {
                return Err(GenreError::InvalidInput(
                    "transform has no persisted scaler and no filler track was provided"
                        .to_string(),
                ))
            }
        };

        Self::new(pca, standardization)
    }

    pub fn standardization(&self) -> &Standardization {
        &self.standardization
    }

    pub fn output_width(&self) -> usize {
        self.pca.output_width()
    }

    /// Standardize and project one feature vector.
    pub fn reduce(&self, features: &FeatureVector) -> Result<Vec<f32>, GenreError> {
        let x = ArrayView1::from(features.as_slice());
        if x.len() != self.pca.input_width() {
            return Err(GenreError::shape("reducer input", self.pca.input_width(), x.len()));
        }

        let standardized = match &self.standardization {
            Standardization::Persisted(scaler) => scaler.transform(x)?,
            Standardization::FillerStacked(filler) => {
                let mut rows = Array2::<f32>::zeros((2, x.len()));
                rows.row_mut(0).assign(&x);
                rows.row_mut(1).assign(&ArrayView1::from(filler.as_slice()));
                Standardizer::fit(&rows).transform(x)?
            }
        };

        let reduced = self.pca.transform(standardized.view())?;
        debug!("extracted features of form : (1, {})", reduced.len());
        Ok(reduced.to_vec())
    }
}
