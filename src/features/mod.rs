//! Hand-engineered audio features.
//!
//! A track is summarized by eleven feature families (chroma, tonnetz, MFCC and
//! spectral shape descriptors). Each family yields a per-frame matrix whose
//! rows are reduced to seven statistics over time. The resulting values are
//! laid out in a fixed column order: lexicographic over
//! `(family, statistic, sub-index)`. The dimensionality reducer was fitted on
//! exactly this order, so it must never change.
//!
//! Extraction either yields a complete, finite [`FeatureVector`] or a
//! [`GenreError::Extraction`]; a partially computed vector is never returned.

mod chroma;
mod cqt;
mod mel;
mod spectral;
mod spectrum;
pub mod stats;

use crate::audio::{self, MonoAudio};
use crate::error::GenreError;
use ndarray::Array2;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

pub use stats::Moments;

/// STFT frame size in samples.
pub const FRAME_LENGTH: usize = 2048;
/// Hop between consecutive frames in samples.
pub const HOP_LENGTH: usize = 512;
/// Constant-Q resolution.
pub const BINS_PER_OCTAVE: usize = 12;
/// Constant-Q range, starting at C1.
pub const N_OCTAVES: usize = 7;

const N_MFCC: usize = 20;
const CONTRAST_FMIN: f32 = 200.0;
const CONTRAST_BANDS: usize = 6;
const ROLLOFF_PERCENT: f64 = 0.85;

/// A named category of audio descriptor with a fixed per-frame dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FeatureFamily {
    ChromaStft,
    ChromaCqt,
    ChromaCens,
    Tonnetz,
    Mfcc,
    Rmse,
    Zcr,
    SpectralCentroid,
    SpectralBandwidth,
    SpectralContrast,
    SpectralRolloff,
}

impl FeatureFamily {
    pub const ALL: [FeatureFamily; 11] = [
        FeatureFamily::ChromaStft,
        FeatureFamily::ChromaCqt,
        FeatureFamily::ChromaCens,
        FeatureFamily::Tonnetz,
        FeatureFamily::Mfcc,
        FeatureFamily::Rmse,
        FeatureFamily::Zcr,
        FeatureFamily::SpectralCentroid,
        FeatureFamily::SpectralBandwidth,
        FeatureFamily::SpectralContrast,
        FeatureFamily::SpectralRolloff,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FeatureFamily::ChromaStft => "chroma_stft",
            FeatureFamily::ChromaCqt => "chroma_cqt",
            FeatureFamily::ChromaCens => "chroma_cens",
            FeatureFamily::Tonnetz => "tonnetz",
            FeatureFamily::Mfcc => "mfcc",
            FeatureFamily::Rmse => "rmse",
            FeatureFamily::Zcr => "zcr",
            FeatureFamily::SpectralCentroid => "spectral_centroid",
            FeatureFamily::SpectralBandwidth => "spectral_bandwidth",
            FeatureFamily::SpectralContrast => "spectral_contrast",
            FeatureFamily::SpectralRolloff => "spectral_rolloff",
        }
    }

    /// Number of rows this family produces per frame.
    pub fn size(self) -> usize {
        match self {
            FeatureFamily::ChromaStft | FeatureFamily::ChromaCqt | FeatureFamily::ChromaCens => 12,
            FeatureFamily::Tonnetz => 6,
            FeatureFamily::Mfcc => N_MFCC,
            FeatureFamily::SpectralContrast => CONTRAST_BANDS + 1,
            FeatureFamily::Rmse
            | FeatureFamily::Zcr
            | FeatureFamily::SpectralCentroid
            | FeatureFamily::SpectralBandwidth
            | FeatureFamily::SpectralRolloff => 1,
        }
    }
}

/// Summary statistic computed over the frames of a feature row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Statistic {
    Mean,
    Std,
    Skew,
    Kurtosis,
    Median,
    Min,
    Max,
}

impl Statistic {
    pub const ALL: [Statistic; 7] = [
        Statistic::Mean,
        Statistic::Std,
        Statistic::Skew,
        Statistic::Kurtosis,
        Statistic::Median,
        Statistic::Min,
        Statistic::Max,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Std => "std",
            Statistic::Skew => "skew",
            Statistic::Kurtosis => "kurtosis",
            Statistic::Median => "median",
            Statistic::Min => "min",
            Statistic::Max => "max",
        }
    }
}

/// One position of the feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Column {
    pub family: FeatureFamily,
    pub statistic: Statistic,
    /// 1-based row within the family
    pub number: usize,
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{:02}",
            self.family.name(),
            self.statistic.name(),
            self.number
        )
    }
}

/// Total width of a raw feature vector: the sum of family sizes times seven.
pub fn feature_dim() -> usize {
    FeatureFamily::ALL.iter().map(|f| f.size()).sum::<usize>() * Statistic::ALL.len()
}

/// The ordered column layout of every feature vector.
pub fn columns() -> Vec<Column> {
    let mut columns: Vec<Column> = FeatureFamily::ALL
        .iter()
        .flat_map(|&family| {
            Statistic::ALL.iter().flat_map(move |&statistic| {
                (1..=family.size()).map(move |number| Column {
                    family,
                    statistic,
                    number,
                })
            })
        })
        .collect();

    columns.sort_by(|a, b| {
        (a.family.name(), a.statistic.name(), a.number)
            .cmp(&(b.family.name(), b.statistic.name(), b.number))
    });
    columns
}

/// Raw features of one track in [`columns`] order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    values: Vec<f32>,
}

impl FeatureVector {
    /// Wrap raw values, checking that they have the canonical width.
    pub fn from_values(values: Vec<f32>) -> Result<Self, GenreError> {
        let expected = feature_dim();
        if values.len() != expected {
            return Err(GenreError::shape("feature vector", expected, values.len()));
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.values
    }

    /// Value of a single column, if the column exists.
    pub fn get(&self, family: FeatureFamily, statistic: Statistic, number: usize) -> Option<f32> {
        let target = Column {
            family,
            statistic,
            number,
        };
        columns()
            .iter()
            .position(|c| *c == target)
            .map(|i| self.values[i])
    }

    /// Pair every value with its column name.
    pub fn named(&self) -> impl Iterator<Item = (Column, f32)> + '_ {
        columns().into_iter().zip(self.values.iter().copied())
    }
}

/// Decode a WAV file and compute its feature vector.
pub fn compute_features<P: AsRef<Path>>(path: P) -> Result<FeatureVector, GenreError> {
    let path = path.as_ref();
    let start = Instant::now();

    let audio = audio::load_mono(path).map_err(|e| {
        warn!("{}: {}", path.display(), e);
        GenreError::extraction(path, e.to_string())
    })?;

    let features = compute_features_from_audio(&audio).map_err(|reason| {
        warn!("{}: {}", path.display(), reason);
        GenreError::extraction(path, reason)
    })?;

    debug!(
        "Extracted {} features from {} ({:.1}s of audio) in {:?}",
        features.len(),
        path.display(),
        audio.duration_secs(),
        start.elapsed()
    );
    Ok(features)
}

/// Compute the feature vector of already decoded audio.
///
/// Errors are plain descriptions; [`compute_features`] attaches the path.
pub fn compute_features_from_audio(audio: &MonoAudio) -> Result<FeatureVector, String> {
    let signal = &audio.samples;
    let sr = audio.sample_rate;
    if signal.is_empty() {
        return Err("audio contains no samples".to_string());
    }
    if signal.iter().any(|s| !s.is_finite()) {
        return Err("audio contains non-finite samples".to_string());
    }

    let mut table: HashMap<FeatureFamily, Vec<Moments>> = HashMap::new();
    let mut record = |family: FeatureFamily, matrix: &Array2<f32>| {
        debug!("{}: {} x {} frames", family.name(), matrix.nrows(), matrix.ncols());
        table.insert(family, Moments::of_rows(matrix));
    };

    record(
        FeatureFamily::Zcr,
        &spectral::zero_crossing_rate(signal, FRAME_LENGTH, HOP_LENGTH),
    );

    let constant_q = cqt::ConstantQ::new(
        sr,
        HOP_LENGTH,
        BINS_PER_OCTAVE,
        BINS_PER_OCTAVE * N_OCTAVES,
    )?;
    let cqt = constant_q.magnitude(signal);
    record(FeatureFamily::ChromaCqt, &chroma::fold_cqt(&cqt, chroma::Norm::Max));
    let cens = chroma::chroma_cens(&cqt);
    record(FeatureFamily::ChromaCens, &cens);
    record(FeatureFamily::Tonnetz, &chroma::tonnetz(&cens));
    drop(cqt);

    let magnitude = spectrum::stft_magnitude(signal, FRAME_LENGTH, HOP_LENGTH);
    let power = magnitude.mapv(|m| m * m);
    let freqs = spectrum::fft_frequencies(sr, FRAME_LENGTH);

    record(
        FeatureFamily::ChromaStft,
        &chroma::chroma_stft(&power, sr, FRAME_LENGTH),
    );
    record(FeatureFamily::Rmse, &spectral::rms(&magnitude, FRAME_LENGTH));

    let centroid = spectral::spectral_centroid(&magnitude, &freqs);
    record(
        FeatureFamily::SpectralBandwidth,
        &spectral::spectral_bandwidth(&magnitude, &freqs, &centroid),
    );
    record(FeatureFamily::SpectralCentroid, &centroid);
    record(
        FeatureFamily::SpectralContrast,
        &spectral::spectral_contrast(&magnitude, &freqs, sr, CONTRAST_FMIN, CONTRAST_BANDS)?,
    );
    record(
        FeatureFamily::SpectralRolloff,
        &spectral::spectral_rolloff(&magnitude, &freqs, ROLLOFF_PERCENT),
    );
    record(
        FeatureFamily::Mfcc,
        &mel::mfcc(&power, sr, FRAME_LENGTH, N_MFCC),
    );

    let mut values = Vec::with_capacity(feature_dim());
    for column in columns() {
        let moments = table
            .get(&column.family)
            .and_then(|rows| rows.get(column.number - 1))
            .ok_or_else(|| format!("missing feature row {column}"))?;
        values.push(moments.get(column.statistic));
    }

    if let Some((column, value)) = columns()
        .into_iter()
        .zip(&values)
        .find(|(_, v)| !v.is_finite())
    {
        return Err(format!("feature {column} is not finite ({value})"));
    }

    FeatureVector::from_values(values).map_err(|e| e.to_string())
}
