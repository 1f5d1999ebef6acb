//! Framing, windows and the short-time Fourier transform.

use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};

/// Periodic Hann window, as used for spectral analysis frames.
pub(crate) fn hann_periodic(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / size as f64;
            (0.5 - 0.5 * phase.cos()) as f32
        })
        .collect()
}

/// Symmetric Hann window (both end points are zero).
pub(crate) fn hann_symmetric(size: usize) -> Vec<f32> {
    if size == 1 {
        return vec![1.0];
    }
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / (size - 1) as f64;
            (0.5 - 0.5 * phase.cos()) as f32
        })
        .collect()
}

/// Number of centered frames for a signal: one frame per hop plus the last.
pub(crate) fn frame_count(len: usize, hop: usize) -> usize {
    1 + len / hop
}

/// Copy `out.len()` samples centered on `center`, zero outside the signal.
pub(crate) fn centered_segment(signal: &[f32], center: usize, out: &mut [f32]) {
    let half = out.len() / 2;
    for (i, slot) in out.iter_mut().enumerate() {
        let pos = center as isize - half as isize + i as isize;
        *slot = if pos >= 0 && (pos as usize) < signal.len() {
            signal[pos as usize]
        } else {
            0.0
        };
    }
}

/// Center frequency in Hz of every non-negative FFT bin.
pub(crate) fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f32> {
    (0..=n_fft / 2)
        .map(|k| k as f32 * sample_rate as f32 / n_fft as f32)
        .collect()
}

/// Magnitude spectrogram with shape `(1 + n_fft / 2, frames)`.
///
/// Frames are centered on multiples of `hop` with zero padding and
/// weighted with a periodic Hann window.
pub(crate) fn stft_magnitude(signal: &[f32], n_fft: usize, hop: usize) -> Array2<f32> {
    let n_bins = n_fft / 2 + 1;
    let n_frames = frame_count(signal.len(), hop);
    let window = hann_periodic(n_fft);

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);

    let mut spectrogram = Array2::<f32>::zeros((n_bins, n_frames));
    let mut segment = vec![0.0f32; n_fft];
    let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];

    for t in 0..n_frames {
        centered_segment(signal, t * hop, &mut segment);
        for ((slot, &s), &w) in buffer.iter_mut().zip(&segment).zip(&window) {
            *slot = Complex::new(s * w, 0.0);
        }
        fft.process(&mut buffer);
        for (k, c) in buffer.iter().take(n_bins).enumerate() {
            spectrogram[[k, t]] = c.norm();
        }
    }

    spectrogram
}

/// Convert a power array to decibels: `10 * log10(max(amin, x))`, then clip
/// everything more than `top_db` below the array's peak.
pub(crate) fn power_to_db(power: &Array2<f32>) -> Array2<f32> {
    const AMIN: f32 = 1e-10;
    const TOP_DB: f32 = 80.0;

    let mut db = power.mapv(|x| 10.0 * x.max(AMIN).log10());
    let peak = db.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let floor = peak - TOP_DB;
    db.mapv_inplace(|x| x.max(floor));
    db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count_is_centered() {
        assert_eq!(frame_count(0, 512), 1);
        assert_eq!(frame_count(511, 512), 1);
        assert_eq!(frame_count(512, 512), 2);
        assert_eq!(frame_count(22050, 512), 44);
    }

    #[test]
    fn test_centered_segment_pads_with_zeros() {
        let signal = [1.0, 2.0, 3.0];
        let mut out = [9.0; 4];
        centered_segment(&signal, 0, &mut out);
        assert_eq!(out, [0.0, 0.0, 1.0, 2.0]);
        centered_segment(&signal, 2, &mut out);
        assert_eq!(out, [1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn test_stft_peaks_at_tone_frequency() {
        let sr = 22050;
        let freq = 1000.0f32;
        let signal: Vec<f32> = (0..sr)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect();
        let spec = stft_magnitude(&signal, 2048, 512);
        assert_eq!(spec.shape(), &[1025, 44]);

        let column = spec.column(20);
        let peak_bin = column
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        let freqs = fft_frequencies(sr as u32, 2048);
        assert!((freqs[peak_bin] - freq).abs() < 22050.0 / 2048.0);
    }

    #[test]
    fn test_power_to_db_clips_to_top_db() {
        let power = Array2::from_shape_vec((1, 3), vec![1.0, 1e-3, 0.0]).unwrap();
        let db = power_to_db(&power);
        assert!((db[[0, 0]] - 0.0).abs() < 1e-5);
        assert!((db[[0, 1]] + 30.0).abs() < 1e-4);
        assert!((db[[0, 2]] + 80.0).abs() < 1e-4);
    }
}
