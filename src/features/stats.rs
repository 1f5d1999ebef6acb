//! Summary statistics over the frames of one feature row.

use super::Statistic;
use ndarray::{Array2, ArrayView1};

/// The seven summary statistics of one feature row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub mean: f32,
    pub std: f32,
    pub skew: f32,
    pub kurtosis: f32,
    pub median: f32,
    pub min: f32,
    pub max: f32,
}

impl Moments {
    /// Summarize a row of per-frame values.
    ///
    /// Standard deviation is the population value; skew and kurtosis are the
    /// biased sample estimates, kurtosis in its excess (Fisher) form. Rows
    /// with no variance have skew and kurtosis of zero.
    pub fn of(values: ArrayView1<'_, f32>) -> Self {
        let n = values.len();
        if n == 0 {
            return Moments {
                mean: f32::NAN,
                std: f32::NAN,
                skew: f32::NAN,
                kurtosis: f32::NAN,
                median: f32::NAN,
                min: f32::NAN,
                max: f32::NAN,
            };
        }

        let count = n as f64;
        let mean = values.iter().map(|&v| v as f64).sum::<f64>() / count;

        let (mut m2, mut m3, mut m4) = (0.0f64, 0.0f64, 0.0f64);
        for &v in values.iter() {
            let d = v as f64 - mean;
            let d2 = d * d;
            m2 += d2;
            m3 += d2 * d;
            m4 += d2 * d2;
        }
        m2 /= count;
        m3 /= count;
        m4 /= count;

        // Same degeneracy test scipy uses before dividing by the variance.
        let degenerate = m2 <= (f64::EPSILON * mean).powi(2);
        let (skew, kurtosis) = if degenerate {
            (0.0, 0.0)
        } else {
            (m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0)
        };

        let mut sorted: Vec<f32> = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            ((sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0) as f32
        };

        Moments {
            mean: mean as f32,
            std: m2.sqrt() as f32,
            skew: skew as f32,
            kurtosis: kurtosis as f32,
            median,
            min: sorted[0],
            max: sorted[n - 1],
        }
    }

    /// Summarize every row of a `(features, frames)` matrix.
    pub fn of_rows(matrix: &Array2<f32>) -> Vec<Moments> {
        matrix.rows().into_iter().map(Moments::of).collect()
    }

    pub fn get(&self, statistic: Statistic) -> f32 {
        match statistic {
            Statistic::Mean => self.mean,
            Statistic::Std => self.std,
            Statistic::Skew => self.skew,
            Statistic::Kurtosis => self.kurtosis,
            Statistic::Median => self.median,
            Statistic::Min => self.min,
            Statistic::Max => self.max,
        }
    }
}
