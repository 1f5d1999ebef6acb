//! Pitch-class features: chroma from STFT and CQT, CENS and tonnetz.

use ndarray::{Array2, Axis};

pub(crate) const N_CHROMA: usize = 12;

/// Columns whose norm is below this are left untouched by normalization.
const TINY: f32 = f32::MIN_POSITIVE;

#[derive(Debug, Clone, Copy)]
pub(crate) enum Norm {
    L1,
    L2,
    Max,
}

/// Normalize every column (frame) of a `(features, frames)` matrix in place.
pub(crate) fn normalize_columns(matrix: &mut Array2<f32>, norm: Norm) {
    for mut column in matrix.axis_iter_mut(Axis(1)) {
        let length = match norm {
            Norm::L1 => column.iter().map(|v| v.abs()).sum::<f32>(),
            Norm::L2 => column.iter().map(|v| v * v).sum::<f32>().sqrt(),
            Norm::Max => column.iter().map(|v| v.abs()).fold(0.0, f32::max),
        };
        if length >= TINY {
            column.mapv_inplace(|v| v / length);
        }
    }
}

/// Chroma filter bank with shape `(12, 1 + n_fft / 2)`.
///
/// Every FFT bin contributes a Gaussian bump around its fractional pitch
/// class, weighted by a Gaussian over octaves centered on octave 5. Row 0
/// is C.
pub(crate) fn chroma_filter_bank(sample_rate: u32, n_fft: usize) -> Array2<f32> {
    const CENTER_OCTAVE: f64 = 5.0;
    const OCTAVE_WIDTH: f64 = 2.0;
    // A0, the reference for octave numbering
    const A0_HZ: f64 = 440.0 / 16.0;

    let n_chroma = N_CHROMA as f64;
    let sr = sample_rate as f64;

    // Bin positions in chroma units; DC gets a position 1.5 octaves below bin 1.
    let mut positions: Vec<f64> = (1..n_fft)
        .map(|k| n_chroma * (k as f64 * sr / n_fft as f64 / A0_HZ).log2())
        .collect();
    positions.insert(0, positions[0] - 1.5 * n_chroma);

    let mut widths: Vec<f64> = positions
        .windows(2)
        .map(|w| (w[1] - w[0]).max(1.0))
        .collect();
    widths.push(1.0);

    let half = (n_chroma / 2.0).round();
    let mut weights = Array2::<f64>::zeros((N_CHROMA, n_fft));
    for (bin, (&pos, &width)) in positions.iter().zip(&widths).enumerate() {
        for c in 0..N_CHROMA {
            let d = (pos - c as f64 + half + 10.0 * n_chroma).rem_euclid(n_chroma) - half;
            weights[[c, bin]] = (-0.5 * (2.0 * d / width).powi(2)).exp();
        }
    }

    for (bin, mut column) in weights.axis_iter_mut(Axis(1)).enumerate() {
        let l2 = column.iter().map(|v| v * v).sum::<f64>().sqrt();
        let octave = positions[bin] / n_chroma;
        let octave_weight = (-0.5 * ((octave - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp();
        let scale = if l2 > 0.0 { octave_weight / l2 } else { 0.0 };
        column.mapv_inplace(|v| v * scale);
    }

    // Rotate so that row 0 is C rather than A.
    let n_bins = n_fft / 2 + 1;
    Array2::from_shape_fn((N_CHROMA, n_bins), |(c, bin)| {
        weights[[(c + 3) % N_CHROMA, bin]] as f32
    })
}

/// Chroma from a power spectrogram, max-normalized per frame.
pub(crate) fn chroma_stft(power: &Array2<f32>, sample_rate: u32, n_fft: usize) -> Array2<f32> {
    let bank = chroma_filter_bank(sample_rate, n_fft);
    let mut chroma = bank.dot(power);
    normalize_columns(&mut chroma, Norm::Max);
    chroma
}

/// Fold a constant-Q magnitude spectrogram (starting at C) into 12 pitch classes.
pub(crate) fn fold_cqt(cqt: &Array2<f32>, norm: Norm) -> Array2<f32> {
    let mut chroma = Array2::<f32>::zeros((N_CHROMA, cqt.ncols()));
    for (bin, row) in cqt.axis_iter(Axis(0)).enumerate() {
        let mut target = chroma.row_mut(bin % N_CHROMA);
        target += &row;
    }
    normalize_columns(&mut chroma, norm);
    chroma
}

/// Chroma energy normalized statistics.
pub(crate) fn chroma_cens(cqt: &Array2<f32>) -> Array2<f32> {
    const QUANT_STEPS: [f32; 4] = [0.4, 0.2, 0.1, 0.05];
    const QUANT_WEIGHT: f32 = 0.25;
    const SMOOTHING: usize = 41;

    let chroma = fold_cqt(cqt, Norm::L1);
    let quantized = chroma.mapv(|v| {
        QUANT_STEPS
            .iter()
            .filter(|&&step| v > step)
            .count() as f32
            * QUANT_WEIGHT
    });

    let full = super::spectrum::hann_symmetric(SMOOTHING + 2);
    let taps = &full[1..=SMOOTHING];
    let total: f32 = taps.iter().sum();
    let taps: Vec<f32> = taps.iter().map(|t| t / total).collect();

    let n_frames = quantized.ncols();
    let half = SMOOTHING / 2;
    let mut smoothed = Array2::<f32>::zeros(quantized.raw_dim());
    for c in 0..N_CHROMA {
        for t in 0..n_frames {
            let mut acc = 0.0f32;
            for (j, &tap) in taps.iter().enumerate() {
                let src = t as isize + j as isize - half as isize;
                if src >= 0 && (src as usize) < n_frames {
                    acc += tap * quantized[[c, src as usize]];
                }
            }
            smoothed[[c, t]] = acc;
        }
    }

    normalize_columns(&mut smoothed, Norm::L2);
    smoothed
}

/// Tonal centroid features: projections of chroma onto the circles of fifths,
/// minor thirds and major thirds.
pub(crate) fn tonnetz(chroma: &Array2<f32>) -> Array2<f32> {
    use std::f32::consts::PI;
    const INTERVALS: [(f32, f32); 3] = [(7.0 / 6.0, 1.0), (3.0 / 2.0, 1.0), (2.0 / 3.0, 0.5)];

    let mut phi = Array2::<f32>::zeros((6, N_CHROMA));
    for (i, &(interval, radius)) in INTERVALS.iter().enumerate() {
        for l in 0..N_CHROMA {
            let angle = PI * interval * l as f32;
            phi[[2 * i, l]] = radius * angle.sin();
            phi[[2 * i + 1, l]] = radius * angle.cos();
        }
    }

    let mut normalized = chroma.clone();
    normalize_columns(&mut normalized, Norm::L1);
    phi.dot(&normalized)
}
