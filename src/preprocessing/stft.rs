//! Short-time Fourier transform and its inverse.
//!
//! Frames are centered (zero padding of `n_fft / 2` on both sides) and
//! windowed with a periodic Hann window. Spectrograms are stored as
//! `(n_fft / 2 + 1, n_frames)` arrays.

use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};

use super::windowed_audio::{pad_center, window_audio_file};

/// Periodic Hann window of `size` points.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Complex STFT of a real signal.
pub fn stft(samples: &[f32], n_fft: usize, hop_length: usize) -> Array2<Complex<f32>> {
    let n_bins = n_fft / 2 + 1;
    let window = hann_window(n_fft);
    let padded = pad_center(samples, n_fft);
    let frames: Vec<&[f32]> = window_audio_file(&padded, n_fft, hop_length).collect();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);

    let mut spectrum = Array2::from_elem((n_bins, frames.len()), Complex::new(0.0, 0.0));
    let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];

    for (t, frame) in frames.iter().enumerate() {
        for (slot, (&s, &w)) in buffer.iter_mut().zip(frame.iter().zip(window.iter())) {
            *slot = Complex::new(s * w, 0.0);
        }
        fft.process(&mut buffer);
        for (f, value) in buffer[..n_bins].iter().enumerate() {
            spectrum[[f, t]] = *value;
        }
    }

    spectrum
}

/// Magnitude of a complex spectrogram.
pub fn magnitude(spectrum: &Array2<Complex<f32>>) -> Array2<f32> {
    spectrum.mapv(|c| c.norm())
}

/// Inverse STFT by weighted overlap-add.
///
/// # Arguments
///
/// * `spectrum` - Complex spectrogram produced by [`stft`] (possibly masked).
/// * `n_fft` - FFT size used for the forward transform.
/// * `hop_length` - Hop used for the forward transform.
/// * `length` - Length of the original signal; the output is trimmed or
///   zero-padded to it.
pub fn istft(
    spectrum: &Array2<Complex<f32>>,
    n_fft: usize,
    hop_length: usize,
    length: usize,
) -> Vec<f32> {
    let (n_bins, n_frames) = spectrum.dim();
    let window = hann_window(n_fft);

    let mut planner = FftPlanner::<f32>::new();
    let ifft = planner.plan_fft_inverse(n_fft);

    let total = n_fft + hop_length * n_frames.saturating_sub(1);
    let mut output = vec![0.0f32; total];
    let mut window_sum = vec![0.0f32; total];
    let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];

    for t in 0..n_frames {
        // Rebuild the full spectrum from its Hermitian half.
        for f in 0..n_fft {
            buffer[f] = if f < n_bins {
                spectrum[[f, t]]
            } else {
                spectrum[[n_fft - f, t]].conj()
            };
        }
        ifft.process(&mut buffer);

        let offset = t * hop_length;
        for i in 0..n_fft {
            output[offset + i] += buffer[i].re / n_fft as f32 * window[i];
            window_sum[offset + i] += window[i] * window[i];
        }
    }

    for (sample, &weight) in output.iter_mut().zip(window_sum.iter()) {
        if weight > 1e-8 {
            *sample /= weight;
        }
    }

    let pad = n_fft / 2;
    let mut signal: Vec<f32> = output.into_iter().skip(pad).take(length).collect();
    signal.resize(length, 0.0);
    signal
}
