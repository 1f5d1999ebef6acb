//! Mel filterbank and MFCCs.

use super::spectrum::{fft_frequencies, power_to_db};
use ndarray::Array2;

pub(crate) const N_MELS: usize = 128;

// Slaney mel scale: linear below 1 kHz, logarithmic above.
const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

pub(crate) fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub(crate) fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular mel filterbank with shape `(n_mels, 1 + n_fft / 2)`, spanning
/// 0 Hz to Nyquist, each filter area-normalized.
pub(crate) fn mel_filter_bank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Array2<f32> {
    let fft_freqs = fft_frequencies(sample_rate, n_fft);
    let max_mel = hz_to_mel(sample_rate as f64 / 2.0);
    let mel_hz: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(max_mel * i as f64 / (n_mels + 1) as f64))
        .collect();

    let mut weights = Array2::<f32>::zeros((n_mels, fft_freqs.len()));
    for m in 0..n_mels {
        let (left, center, right) = (mel_hz[m], mel_hz[m + 1], mel_hz[m + 2]);
        let enorm = 2.0 / (right - left);
        for (k, &f) in fft_freqs.iter().enumerate() {
            let f = f as f64;
            let lower = (f - left) / (center - left);
            let upper = (right - f) / (right - center);
            let w = lower.min(upper).max(0.0);
            weights[[m, k]] = (w * enorm) as f32;
        }
    }
    weights
}

/// Orthonormal DCT-II basis, shape `(n_out, n_in)`.
fn dct_basis(n_out: usize, n_in: usize) -> Array2<f32> {
    let n = n_in as f64;
    Array2::from_shape_fn((n_out, n_in), |(k, i)| {
        let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
        let angle = std::f64::consts::PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n);
        (scale * angle.cos()) as f32
    })
}

/// MFCCs from a power spectrogram: mel projection, decibels, DCT.
pub(crate) fn mfcc(
    power: &Array2<f32>,
    sample_rate: u32,
    n_fft: usize,
    n_mfcc: usize,
) -> Array2<f32> {
    let bank = mel_filter_bank(sample_rate, n_fft, N_MELS);
    let mel = bank.dot(power);
    let log_mel = power_to_db(&mel);
    dct_basis(n_mfcc, N_MELS).dot(&log_mel)
}
