//! Constant-Q magnitude spectrogram.
//!
//! Each bin is a Hann-windowed complex exponential whose length shrinks with
//! frequency so that every bin has the same quality factor. Kernels are
//! transformed once into a sparse spectral form and applied to one large FFT
//! per frame.
//!
//! Kernels are L1-normalized and each bin's response is then scaled by the
//! square root of its filter length, so a unit sinusoid reads
//! `sqrt(Q * sr / f) / 2` in its own bin. Tuning is fixed at A440.

use super::spectrum::{centered_segment, frame_count, hann_symmetric};
use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};

/// Frequency of C1, the lowest constant-Q bin.
pub(crate) const FMIN_C1: f64 = 32.703_195_662_574_83;

/// Equivalent noise bandwidth of the Hann window, in bins.
const HANN_BANDWIDTH: f64 = 1.500_186_8;

/// Spectral kernel entries below this fraction of a bin's peak are dropped.
const SPARSITY: f32 = 0.005;

struct SparseKernel {
    entries: Vec<(usize, Complex<f32>)>,
}

/// Precomputed constant-Q filter bank for one sample rate.
pub(crate) struct ConstantQ {
    n_fft: usize,
    hop: usize,
    kernels: Vec<SparseKernel>,
}

impl ConstantQ {
    /// Build the filter bank, or describe why the sample rate cannot support it.
    pub(crate) fn new(
        sample_rate: u32,
        hop: usize,
        bins_per_octave: usize,
        n_bins: usize,
    ) -> Result<Self, String> {
        let sr = sample_rate as f64;
        let q = 1.0 / (2f64.powf(1.0 / bins_per_octave as f64) - 1.0);
        let freqs: Vec<f64> = (0..n_bins)
            .map(|k| FMIN_C1 * 2f64.powf(k as f64 / bins_per_octave as f64))
            .collect();

        let top = freqs[n_bins - 1] * (1.0 + 0.5 * HANN_BANDWIDTH / q);
        if top > sr / 2.0 {
            return Err(format!(
                "constant-Q pass-band reaches {top:.1} Hz, \
                 beyond the Nyquist frequency of {:.1} Hz",
                sr / 2.0
            ));
        }

        let lengths: Vec<usize> = freqs.iter().map(|f| (q * sr / f).ceil() as usize).collect();
        let n_fft = lengths[0].next_power_of_two();

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);

        let mut kernels = Vec::with_capacity(n_bins);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
        for (&freq, &len) in freqs.iter().zip(&lengths) {
            let window = hann_symmetric(len);
            let norm: f32 = window.iter().sum();
            let scale = (q * sr / freq).sqrt() as f32;
            let offset = n_fft / 2 - len / 2;

            buffer.iter_mut().for_each(|c| *c = Complex::new(0.0, 0.0));
            for (n, &w) in window.iter().enumerate() {
                let phase = 2.0 * std::f64::consts::PI * freq * (n as f64 - (len / 2) as f64) / sr;
                buffer[offset + n] = Complex::from_polar(w / norm, phase as f32);
            }
            fft.process(&mut buffer);

            let peak = buffer.iter().map(|c| c.norm()).fold(0.0f32, f32::max);
            let entries = buffer
                .iter()
                .enumerate()
                .filter(|(_, c)| c.norm() >= peak * SPARSITY)
                .map(|(i, c)| (i, c.conj() * (scale / n_fft as f32)))
                .collect();
            kernels.push(SparseKernel { entries });
        }

        Ok(Self { n_fft, hop, kernels })
    }

    pub(crate) fn n_bins(&self) -> usize {
        self.kernels.len()
    }

    /// Magnitude spectrogram with shape `(n_bins, frames)`.
    pub(crate) fn magnitude(&self, signal: &[f32]) -> Array2<f32> {
        let n_frames = frame_count(signal.len(), self.hop);
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(self.n_fft);

        let mut out = Array2::<f32>::zeros((self.n_bins(), n_frames));
        let mut segment = vec![0.0f32; self.n_fft];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.n_fft];

        for t in 0..n_frames {
            centered_segment(signal, t * self.hop, &mut segment);
            for (slot, &s) in buffer.iter_mut().zip(&segment) {
                *slot = Complex::new(s, 0.0);
            }
            fft.process(&mut buffer);

            for (k, kernel) in self.kernels.iter().enumerate() {
                let acc: Complex<f32> = kernel
                    .entries
                    .iter()
                    .map(|&(i, coeff)| buffer[i] * coeff)
                    .sum();
                out[[k, t]] = acc.norm();
            }
        }

        out
    }
}
