//! Per-frame spectral shape descriptors and zero-crossing rate.
//!
//! All spectrogram inputs are magnitude spectrograms with shape
//! `(1 + n_fft / 2, frames)`; outputs are `(rows, frames)`.

use super::spectrum::{frame_count, power_to_db};
use ndarray::{Array1, Array2, Axis};

/// Root-mean-square energy per frame, from the magnitude spectrogram.
pub(crate) fn rms(magnitude: &Array2<f32>, frame_length: usize) -> Array2<f32> {
    let n_bins = magnitude.nrows();
    let even = frame_length % 2 == 0;
    let values: Vec<f32> = magnitude
        .axis_iter(Axis(1))
        .map(|column| {
            let mut power = 0.0f64;
            for (k, &m) in column.iter().enumerate() {
                let mut p = (m as f64) * (m as f64);
                // DC and Nyquist appear once in the full spectrum
                if k == 0 || (even && k == n_bins - 1) {
                    p *= 0.5;
                }
                power += p;
            }
            (2.0 * power / (frame_length as f64).powi(2)).sqrt() as f32
        })
        .collect();
    row(values)
}

/// Magnitude-weighted mean frequency per frame.
pub(crate) fn spectral_centroid(magnitude: &Array2<f32>, freqs: &[f32]) -> Array2<f32> {
    let values = magnitude
        .axis_iter(Axis(1))
        .map(|column| {
            let total: f64 = column.iter().map(|&m| m as f64).sum();
            if total <= 0.0 {
                return 0.0;
            }
            let weighted: f64 = column
                .iter()
                .zip(freqs)
                .map(|(&m, &f)| m as f64 * f as f64)
                .sum();
            (weighted / total) as f32
        })
        .collect();
    row(values)
}

/// Second-order spectral bandwidth around the centroid.
pub(crate) fn spectral_bandwidth(
    magnitude: &Array2<f32>,
    freqs: &[f32],
    centroid: &Array2<f32>,
) -> Array2<f32> {
    let values = magnitude
        .axis_iter(Axis(1))
        .zip(centroid.row(0))
        .map(|(column, &c)| {
            let total: f64 = column.iter().map(|&m| m as f64).sum();
            if total <= 0.0 {
                return 0.0;
            }
            let spread: f64 = column
                .iter()
                .zip(freqs)
                .map(|(&m, &f)| (m as f64 / total) * (f as f64 - c as f64).powi(2))
                .sum();
            spread.sqrt() as f32
        })
        .collect();
    row(values)
}

/// Lowest frequency below which `roll_percent` of the magnitude lies.
pub(crate) fn spectral_rolloff(
    magnitude: &Array2<f32>,
    freqs: &[f32],
    roll_percent: f64,
) -> Array2<f32> {
    let values = magnitude
        .axis_iter(Axis(1))
        .map(|column| {
            let total: f64 = column.iter().map(|&m| m as f64).sum();
            let threshold = roll_percent * total;
            let mut cumulative = 0.0f64;
            for (&m, &f) in column.iter().zip(freqs) {
                cumulative += m as f64;
                if cumulative >= threshold {
                    return f;
                }
            }
            freqs.last().copied().unwrap_or(0.0)
        })
        .collect();
    row(values)
}

/// Octave-band spectral contrast: peak minus valley energy, in dB.
///
/// Produces `n_bands + 1` rows: `n_bands` octaves starting at `fmin` plus a
/// final band holding everything above.
pub(crate) fn spectral_contrast(
    magnitude: &Array2<f32>,
    freqs: &[f32],
    sample_rate: u32,
    fmin: f32,
    n_bands: usize,
) -> Result<Array2<f32>, String> {
    const QUANTILE: f32 = 0.02;

    let mut edges = vec![0.0f32];
    edges.extend((0..=n_bands).map(|i| fmin * 2f32.powi(i as i32)));

    let nyquist = sample_rate as f32 / 2.0;
    if let Some(edge) = edges[..edges.len() - 1].iter().find(|&&e| e >= nyquist) {
        return Err(format!(
            "spectral contrast band edge {edge} Hz exceeds the Nyquist frequency of {nyquist} Hz"
        ));
    }

    let n_frames = magnitude.ncols();
    let mut peak = Array2::<f32>::zeros((n_bands + 1, n_frames));
    let mut valley = Array2::<f32>::zeros((n_bands + 1, n_frames));

    for k in 0..=n_bands {
        let (low, high) = (edges[k], edges[k + 1]);
        let in_band: Vec<usize> = freqs
            .iter()
            .enumerate()
            .filter(|&(_, &f)| f >= low && f <= high)
            .map(|(i, _)| i)
            .collect();
        let (Some(&first), Some(&last)) = (in_band.first(), in_band.last()) else {
            return Err(format!("spectral contrast band {low}-{high} Hz contains no FFT bins"));
        };

        // Each band borrows one bin below; the top band takes the rest of the spectrum.
        let start = if k > 0 { first.saturating_sub(1) } else { first };
        let end = if k == n_bands { freqs.len() - 1 } else { last };
        let selected = end + 1 - start;
        // A band that is a single bin keeps that bin.
        let used_end = if k < n_bands { end.max(start + 1) } else { end + 1 };

        let count = ((QUANTILE * selected as f32).round() as usize).max(1);

        for t in 0..n_frames {
            let mut band: Vec<f32> = (start..used_end).map(|i| magnitude[[i, t]]).collect();
            band.sort_by(|a, b| a.total_cmp(b));
            let take = count.min(band.len()).max(1);
            valley[[k, t]] = band[..take].iter().sum::<f32>() / take as f32;
            peak[[k, t]] = band[band.len() - take..].iter().sum::<f32>() / take as f32;
        }
    }

    Ok(power_to_db(&peak) - power_to_db(&valley))
}

/// Fraction of sign changes per frame of the raw signal.
pub(crate) fn zero_crossing_rate(signal: &[f32], frame_length: usize, hop: usize) -> Array2<f32> {
    const THRESHOLD: f32 = 1e-10;

    let n_frames = frame_count(signal.len(), hop);
    let half = frame_length / 2;
    let last = signal.len().saturating_sub(1);

    // Frames are centered with edge padding.
    let sample_at = |pos: isize| -> f32 {
        let idx = pos.clamp(0, last as isize) as usize;
        let v = signal.get(idx).copied().unwrap_or(0.0);
        if v.abs() <= THRESHOLD {
            0.0
        } else {
            v
        }
    };

    let values = (0..n_frames)
        .map(|t| {
            let start = (t * hop) as isize - half as isize;
            let mut crossings = 0usize;
            let mut previous = sample_at(start) < 0.0;
            for i in 1..frame_length {
                let negative = sample_at(start + i as isize) < 0.0;
                if negative != previous {
                    crossings += 1;
                }
                previous = negative;
            }
            crossings as f32 / frame_length as f32
        })
        .collect();
    row(values)
}

fn row(values: Vec<f32>) -> Array2<f32> {
    Array1::from(values).insert_axis(Axis(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::spectrum::{fft_frequencies, stft_magnitude};

    fn tone(freq: f32, sr: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f64::consts::PI * freq as f64 * i as f64 / sr as f64).sin() as f32)
            .collect()
    }

    #[test]
    fn test_centroid_and_rolloff_follow_a_tone() {
        let sr = 22050;
        let signal = tone(2000.0, sr, 22050);
        let mag = stft_magnitude(&signal, 2048, 512);
        let freqs = fft_frequencies(sr, 2048);

        let centroid = spectral_centroid(&mag, &freqs);
        let rolloff = spectral_rolloff(&mag, &freqs, 0.85);
        let bandwidth = spectral_bandwidth(&mag, &freqs, &centroid);
        let mid = mag.ncols() / 2;
        assert!((centroid[[0, mid]] - 2000.0).abs() < 50.0, "{}", centroid[[0, mid]]);
        assert!((rolloff[[0, mid]] - 2000.0).abs() < 50.0, "{}", rolloff[[0, mid]]);
        assert!(bandwidth[[0, mid]] < 200.0);
    }

    #[test]
    fn test_rms_of_sine_is_amplitude_over_root_two() {
        let sr = 22050;
        let signal: Vec<f32> = tone(1000.0, sr, 22050).iter().map(|s| s * 0.5).collect();
        let mag = stft_magnitude(&signal, 2048, 512);
        let energy = rms(&mag, 2048);
        let mid = mag.ncols() / 2;
        // The Hann window costs sqrt(3/8) of the signal's RMS
        let expected = 0.5 / 2f32.sqrt() * (3.0f32 / 8.0).sqrt();
        assert!((energy[[0, mid]] - expected).abs() < 0.01, "{}", energy[[0, mid]]);
    }

    #[test]
    fn test_zero_crossing_rate_of_sine() {
        let sr = 22050;
        let signal = tone(1000.0, sr, 22050);
        let zcr = zero_crossing_rate(&signal, 2048, 512);
        assert_eq!(zcr.ncols(), 44);
        // 2 crossings per period
        let expected = 2.0 * 1000.0 / sr as f32;
        assert!((zcr[[0, 20]] - expected).abs() < 0.005);
    }

    #[test]
    fn test_contrast_has_seven_rows() {
        let sr = 22050;
        let signal = tone(440.0, sr, 11025);
        let mag = stft_magnitude(&signal, 2048, 512);
        let freqs = fft_frequencies(sr, 2048);
        let contrast = spectral_contrast(&mag, &freqs, sr, 200.0, 6).unwrap();
        assert_eq!(contrast.shape(), &[7, mag.ncols()]);
        assert!(contrast.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn test_contrast_rejects_low_sample_rate() {
        let mag = Array2::<f32>::zeros((1025, 4));
        let freqs = fft_frequencies(4000, 2048);
        let err = spectral_contrast(&mag, &freqs, 4000, 200.0, 6).unwrap_err();
        // 3200 Hz is the lowest edge at or above 2000 Hz
        assert!(err.contains("edge 3200 Hz"), "{err}");
    }

    #[test]
    fn test_contrast_at_high_sample_rate() {
        // At 768 kHz the lowest band holds only the DC bin
        let sr = 768_000;
        let signal: Vec<f32> = (0..38_400)
            .map(|i| ((i * 7919 % 1000) as f32 / 500.0) - 1.0)
            .collect();
        let mag = stft_magnitude(&signal, 2048, 512);
        let freqs = fft_frequencies(sr, 2048);
        let contrast = spectral_contrast(&mag, &freqs, sr, 200.0, 6).unwrap();
        assert_eq!(contrast.shape(), &[7, mag.ncols()]);
        assert!(contrast.iter().all(|v| v.is_finite()));
    }
}
