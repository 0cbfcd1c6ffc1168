//! Biquad band-limiting filters for the drum bands.
//!
//! RBJ cookbook coefficients, Direct Form II Transposed, computed in f64.
//! Each edge is a cascade of two Butterworth sections (24 dB/octave).

use crate::config::DrumBand;
use crate::constants::{BUTTERWORTH_Q, HIGH_PASS_CEILING_HZ, LOW_PASS_FLOOR_HZ};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Lowpass,
    Highpass,
}

#[derive(Debug, Clone)]
pub struct BiquadFilter {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl BiquadFilter {
    pub fn new(filter_type: FilterType, frequency: f32, q: f32, sample_rate: u32) -> Self {
        let fs = sample_rate as f64;
        let f0 = (frequency as f64).clamp(1.0, fs * 0.49);
        let w0 = 2.0 * std::f64::consts::PI * f0 / fs;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q as f64);

        let (b0, b1, b2) = match filter_type {
            FilterType::Lowpass => ((1.0 - cos_w0) / 2.0, 1.0 - cos_w0, (1.0 - cos_w0) / 2.0),
            FilterType::Highpass => ((1.0 + cos_w0) / 2.0, -(1.0 + cos_w0), (1.0 + cos_w0) / 2.0),
        };
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        let x = input as f64;
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y as f32
    }

    pub fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}

/// The filter stages that isolate a drum band.
///
/// A band starting at or below 20 Hz needs no high-pass stage and a band
/// reaching 8 kHz (or Nyquist) needs no low-pass stage, so kick is a
/// low-pass, hi-hat a high-pass and everything in between a band-pass.
pub fn band_stages(band: &DrumBand, sample_rate: u32) -> Vec<(FilterType, f32)> {
    let nyquist = sample_rate as f32 / 2.0;
    let mut stages = Vec::new();
    if band.low_hz > LOW_PASS_FLOOR_HZ {
        stages.push((FilterType::Highpass, band.low_hz));
    }
    if band.high_hz < HIGH_PASS_CEILING_HZ && band.high_hz < nyquist {
        stages.push((FilterType::Lowpass, band.high_hz));
    }
    stages
}

/// Filter a signal down to one drum band.
pub fn band_filter(samples: &[f32], sample_rate: u32, band: &DrumBand) -> Vec<f32> {
    let mut filtered = samples.to_vec();
    for (filter_type, frequency) in band_stages(band, sample_rate) {
        for _ in 0..2 {
            BiquadFilter::new(filter_type, frequency, BUTTERWORTH_Q, sample_rate).process(&mut filtered);
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postprocessing::helpers::ported::numpy::rms;

    fn sine(freq: f32, sample_rate: u32) -> Vec<f32> {
        (0..sample_rate as usize)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn gain(band: &DrumBand, freq: f32) -> f32 {
        let sr = 22050;
        let input = sine(freq, sr);
        let output = band_filter(&input, sr, band);
        // Skip the filter's settling time.
        rms(&output[2000..]) / rms(&input[2000..])
    }

    #[test]
    fn default_bands_map_to_expected_filter_shapes() {
        let kick = DrumBand::new("kick", 20.0, 200.0, 0.5, 36);
        let snare = DrumBand::new("snare", 200.0, 1200.0, 0.4, 38);
        let hat = DrumBand::new("hi-hat", 1200.0, 8000.0, 0.3, 42);

        assert_eq!(band_stages(&kick, 22050), vec![(FilterType::Lowpass, 200.0)]);
        assert_eq!(
            band_stages(&snare, 22050),
            vec![(FilterType::Highpass, 200.0), (FilterType::Lowpass, 1200.0)]
        );
        assert_eq!(band_stages(&hat, 22050), vec![(FilterType::Highpass, 1200.0)]);
    }

    #[test]
    fn low_pass_keeps_lows_and_cuts_highs() {
        let kick = DrumBand::new("kick", 20.0, 200.0, 0.5, 36);
        assert!(gain(&kick, 60.0) > 0.9);
        assert!(gain(&kick, 2000.0) < 0.01);
    }

    #[test]
    fn band_pass_rejects_both_sides() {
        let snare = DrumBand::new("snare", 200.0, 1200.0, 0.4, 38);
        assert!(gain(&snare, 500.0) > 0.7);
        assert!(gain(&snare, 60.0) < 0.02);
        assert!(gain(&snare, 6000.0) < 0.01);
    }
}
