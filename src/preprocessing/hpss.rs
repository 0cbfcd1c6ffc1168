//! Harmonic/percussive source separation by median filtering.
//!
//! Harmonic content is steady over time, so a median along the time axis of
//! the magnitude spectrogram keeps it; percussive content is broadband, so a
//! median along the frequency axis keeps it. Soft masks built from the two
//! estimates split the complex STFT, and each half is inverted back to audio.

use ndarray::{Array2, Axis};

use crate::config::HpssConfig;
use crate::postprocessing::helpers::ported::numpy::{median_in_place, reflect_index};

use super::stft::{istft, magnitude, stft};

/// The two components of a separated signal. Both have the input's length.
#[derive(Debug, Clone)]
pub struct Separated {
    pub harmonic: Vec<f32>,
    pub percussive: Vec<f32>,
}

/// Median filter every lane of `data` along `axis` with reflected edges.
fn median_filter(data: &Array2<f32>, kernel_size: usize, axis: Axis) -> Array2<f32> {
    let mut filtered = Array2::zeros(data.dim());
    let half = (kernel_size / 2) as isize;
    let mut scratch = vec![0.0f32; kernel_size];

    for (lane, mut out_lane) in data.lanes(axis).into_iter().zip(filtered.lanes_mut(axis)) {
        let n = lane.len();
        for i in 0..n {
            for (k, slot) in scratch.iter_mut().enumerate() {
                let j = reflect_index(i as isize + k as isize - half, n);
                *slot = lane[j];
            }
            out_lane[i] = median_in_place(&mut scratch);
        }
    }

    filtered
}

/// Wiener-style soft mask `x^p / (x^p + y^p)`; zero where both are zero.
fn soft_mask(x: f32, y: f32, power: f32) -> f32 {
    let z = x.max(y);
    if z < f32::MIN_POSITIVE {
        return 0.0;
    }
    let xp = (x / z).powf(power);
    let yp = (y / z).powf(power);
    xp / (xp + yp)
}

/// Split a signal into harmonic and percussive components.
///
/// # Arguments
///
/// * `samples` - Mono signal.
/// * `config` - STFT size, hop, median kernel size and mask power.
///
/// # Returns
///
/// * The harmonic and percussive signals.
pub fn hpss(samples: &[f32], config: &HpssConfig) -> Separated {
    let spectrum = stft(samples, config.n_fft, config.hop_length);
    let mag = magnitude(&spectrum);

    // Lanes along Axis(1) run over time; along Axis(0) over frequency.
    let harmonic_estimate = median_filter(&mag, config.kernel_size, Axis(1));
    let percussive_estimate = median_filter(&mag, config.kernel_size, Axis(0));

    let mut harmonic_spec = spectrum.clone();
    let mut percussive_spec = spectrum;

    for ((idx, h), p) in harmonic_estimate.indexed_iter().zip(percussive_estimate.iter()) {
        harmonic_spec[idx] *= soft_mask(*h, *p, config.power);
        percussive_spec[idx] *= soft_mask(*p, *h, config.power);
    }

    log::debug!(
        "HPSS: {} bins x {} frames, kernel {}",
        mag.dim().0,
        mag.dim().1,
        config.kernel_size
    );

    Separated {
        harmonic: istft(&harmonic_spec, config.n_fft, config.hop_length, samples.len()),
        percussive: istft(&percussive_spec, config.n_fft, config.hop_length, samples.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postprocessing::helpers::ported::numpy::rms;

    #[test]
    fn median_filter_removes_isolated_spikes() {
        let mut data = Array2::zeros((1, 9));
        data[[0, 4]] = 10.0;
        let filtered = median_filter(&data, 3, Axis(1));
        assert!(filtered.iter().all(|&v| v == 0.0));

        let flat = Array2::from_elem((1, 5), 2.0);
        assert_eq!(median_filter(&flat, 3, Axis(1)), flat);
    }

    #[test]
    fn soft_mask_is_complementary() {
        let m = soft_mask(3.0, 1.0, 2.0);
        assert!((m + soft_mask(1.0, 3.0, 2.0) - 1.0).abs() < 1e-6);
        assert!((m - 0.9).abs() < 1e-6);
        assert_eq!(soft_mask(0.0, 0.0, 2.0), 0.0);
    }

    #[test]
    fn steady_tone_is_harmonic_and_click_is_percussive() {
        let sr = 8000.0;
        let mut tone: Vec<f32> = (0..16000)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 500.0 * i as f32 / sr).sin())
            .collect();
        let separated = hpss(&tone, &HpssConfig::default());
        assert_eq!(separated.harmonic.len(), tone.len());
        assert!(rms(&separated.harmonic) > 5.0 * rms(&separated.percussive));

        tone.iter_mut().for_each(|s| *s = 0.0);
        tone[8000] = 1.0;
        let separated = hpss(&tone, &HpssConfig::default());
        assert!(rms(&separated.percussive) > 5.0 * rms(&separated.harmonic));
    }
}
