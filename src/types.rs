//! Common types used throughout the genre classifier.
//!
//! This module contains the genre label map, the confidence phrase buckets and
//! the prediction returned to the presentation layer.

use crate::error::GenreError;
use serde::Serialize;
use std::fmt;

/// Number of genre classes produced by the network.
pub const GENRE_COUNT: usize = 8;

/// Musical genres the network was trained on.
///
/// The discriminants are the class indices of the network's softmax output.
/// The mapping is fixed and not derived from the model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Genre {
    HipHop = 0,
    Pop = 1,
    Folk = 2,
    Rock = 3,
    Experimental = 4,
    International = 5,
    Electronic = 6,
    Instrumental = 7,
}

impl Genre {
    /// All genres in class index order.
    pub const ALL: [Genre; GENRE_COUNT] = [
        Genre::HipHop,
        Genre::Pop,
        Genre::Folk,
        Genre::Rock,
        Genre::Experimental,
        Genre::International,
        Genre::Electronic,
        Genre::Instrumental,
    ];

    /// Class index of this genre in the network output.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look up the genre for a class index.
    pub fn from_index(index: usize) -> Option<Genre> {
        Self::ALL.get(index).copied()
    }

    /// Display name, as used by the training labels.
    pub fn name(self) -> &'static str {
        match self {
            Genre::HipHop => "Hip-Hop",
            Genre::Pop => "Pop",
            Genre::Folk => "Folk",
            Genre::Rock => "Rock",
            Genre::Experimental => "Experimental",
            Genre::International => "International",
            Genre::Electronic => "Electronic",
            Genre::Instrumental => "Instrumental",
        }
    }

    /// Look up a genre by its display name.
    pub fn from_name(name: &str) -> Option<Genre> {
        Self::ALL.iter().copied().find(|g| g.name() == name)
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Qualitative description of the classifier's top probability.
///
/// Buckets are evenly spread over [0, 1]:
/// - below 0.25: Guess
/// - 0.25 to 0.35: SeemsToBe
/// - 0.35 to 0.45: Saying
/// - 0.45 to 0.60: Calculations
/// - 0.60 to 0.70: PrettySure
/// - 0.70 and above: Certain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfidencePhrase {
    Guess,
    SeemsToBe,
    Saying,
    Calculations,
    PrettySure,
    Certain,
}

impl ConfidencePhrase {
    /// Map a probability to its phrase bucket.
    ///
    /// Lower bounds are inclusive. NaN falls into the lowest bucket.
    pub fn from_confidence(confidence: f32) -> Self {
        const THRESHOLDS: [(f32, ConfidencePhrase); 5] = [
            (0.25, ConfidencePhrase::Guess),
            (0.35, ConfidencePhrase::SeemsToBe),
            (0.45, ConfidencePhrase::Saying),
            (0.60, ConfidencePhrase::Calculations),
            (0.70, ConfidencePhrase::PrettySure),
        ];

        if confidence.is_nan() {
            return ConfidencePhrase::Guess;
        }
        THRESHOLDS
            .iter()
            .find(|(upper, _)| confidence < *upper)
            .map(|(_, phrase)| *phrase)
            .unwrap_or(ConfidencePhrase::Certain)
    }

    pub fn text(self) -> &'static str {
        match self {
            ConfidencePhrase::Guess => "Just throwing a guess here",
            ConfidencePhrase::SeemsToBe => "Seems to be",
            ConfidencePhrase::Saying => "I'm saying this is",
            ConfidencePhrase::Calculations => "My calculations indicate",
            ConfidencePhrase::PrettySure => "Pretty sure this is",
            ConfidencePhrase::Certain => "Yup, that's some",
        }
    }
}

impl fmt::Display for ConfidencePhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Result of classifying one audio file.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    /// Most probable genre
    pub genre: Genre,
    /// Probability of the most probable genre (0.0 to 1.0)
    pub confidence: f32,
    /// Full probability distribution in class index order
    pub probabilities: Vec<f32>,
    /// Width of the reduced vector that was fed to the network
    pub reduced_width: usize,
}

impl Prediction {
    /// Build a prediction from a probability distribution by taking its argmax.
    pub fn from_probabilities(
        probabilities: Vec<f32>,
        reduced_width: usize,
    ) -> Result<Self, GenreError> {
        if probabilities.len() != GENRE_COUNT {
            return Err(GenreError::shape(
                "class probabilities",
                GENRE_COUNT,
                probabilities.len(),
            ));
        }

        if let Some(index) = probabilities.iter().position(|p| !p.is_finite()) {
            return Err(GenreError::InvalidInput(format!(
                "class probability {index} is not finite"
            )));
        }

        let (index, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, p)| {
                if p > best.1 {
                    (i, p)
                } else {
                    best
                }
            });

        let genre = Genre::from_index(index)
            .ok_or_else(|| GenreError::InvalidInput(format!("No genre for class index {index}")))?;

        Ok(Self {
            genre,
            confidence,
            probabilities,
            reduced_width,
        })
    }

    /// Confidence phrase for this prediction.
    pub fn phrase(&self) -> ConfidencePhrase {
        ConfidencePhrase::from_confidence(self.confidence)
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.phrase(), self.genre)
    }
}
