//! Constant-Q transform via a sparse spectral kernel.
//!
//! Each CQT bin is a Hann-windowed complex exponential whose length is
//! inversely proportional to its centre frequency. The kernels are moved to
//! the frequency domain once, sparsified, and applied to one large FFT per
//! frame. Magnitudes are scaled by the square root of each filter length so a
//! sinusoid reads at comparable levels across octaves.

use rustfft::{num_complex::Complex, FftPlanner};

use crate::constants::CQT_SPARSITY;
use crate::postprocessing::poly::SpectralFrame;

use super::stft::hann_window;
use super::windowed_audio::n_centered_frames;

struct KernelRow {
    /// (FFT bin, conjugated kernel weight)
    taps: Vec<(usize, Complex<f32>)>,
    scale: f32,
}

pub struct ConstantQ {
    sample_rate: u32,
    hop_length: usize,
    fft_len: usize,
    rows: Vec<KernelRow>,
}

impl ConstantQ {
    /// Build the spectral kernel.
    ///
    /// # Arguments
    ///
    /// * `sample_rate` - Sample rate of the analysed audio.
    /// * `fmin` - Centre frequency of bin 0.
    /// * `n_bins` - Number of bins.
    /// * `bins_per_octave` - Bins per octave; 12 gives one bin per semitone.
    /// * `hop_length` - Samples between frames.
    pub fn new(sample_rate: u32, fmin: f32, n_bins: usize, bins_per_octave: usize, hop_length: usize) -> Self {
        let sr = sample_rate as f32;
        let q = 1.0 / (2.0f32.powf(1.0 / bins_per_octave as f32) - 1.0);
        let longest = (q * sr / fmin).ceil() as usize;
        let fft_len = longest.max(2).next_power_of_two();

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_len);
        let mut buffer = vec![Complex::new(0.0, 0.0); fft_len];

        let rows = (0..n_bins)
            .map(|k| {
                let freq = fmin * 2.0f32.powf(k as f32 / bins_per_octave as f32);
                if freq >= sr / 2.0 {
                    return KernelRow { taps: vec![], scale: 0.0 };
                }

                let length = ((q * sr / freq).ceil() as usize).clamp(1, fft_len);
                let window = hann_window(length);
                let window_sum: f32 = window.iter().sum::<f32>().max(f32::MIN_POSITIVE);
                let offset = (fft_len - length) / 2;

                buffer.iter_mut().for_each(|c| *c = Complex::new(0.0, 0.0));
                for (n, &w) in window.iter().enumerate() {
                    let phase = 2.0 * std::f32::consts::PI * freq * (n as f32 - length as f32 / 2.0) / sr;
                    buffer[offset + n] = Complex::from_polar(w / window_sum, phase);
                }
                fft.process(&mut buffer);

                let taps = buffer
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.norm() > CQT_SPARSITY)
                    .map(|(j, c)| (j, c.conj() / fft_len as f32))
                    .collect();

                KernelRow {
                    taps,
                    scale: (length as f32).sqrt(),
                }
            })
            .collect();

        Self {
            sample_rate,
            hop_length,
            fft_len,
            rows,
        }
    }

    /// CQT magnitude frames of a signal, one every `hop_length` samples,
    /// each centred on its timestamp.
    pub fn process(&self, samples: &[f32]) -> Vec<SpectralFrame> {
        let n_frames = n_centered_frames(samples.len(), self.hop_length);
        let half = self.fft_len / 2;

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(self.fft_len);
        let mut buffer = vec![Complex::new(0.0, 0.0); self.fft_len];

        (0..n_frames)
            .map(|t| {
                let center = t * self.hop_length;
                for (i, slot) in buffer.iter_mut().enumerate() {
                    let pos = (center + i).checked_sub(half);
                    let sample = pos.and_then(|p| samples.get(p)).copied().unwrap_or(0.0);
                    *slot = Complex::new(sample, 0.0);
                }
                fft.process(&mut buffer);

                let magnitudes = self
                    .rows
                    .iter()
                    .map(|row| {
                        let value: Complex<f32> = row.taps.iter().map(|&(j, w)| buffer[j] * w).sum();
                        value.norm() * row.scale
                    })
                    .collect();

                SpectralFrame {
                    time: (center as f32) / self.sample_rate as f32,
                    magnitudes,
                }
            })
            .collect()
    }
}
