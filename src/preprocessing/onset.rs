//! Onset-strength envelopes and onset picking.

use crate::config::OnsetConfig;
use crate::postprocessing::helpers::ported::librosa::{
    frames_to_time, mel_filterbank, peak_pick, power_to_db, PeakPickParams,
};
use crate::postprocessing::helpers::ported::numpy::{max_value, min_value};

use super::stft::stft;

/// Spectral-flux onset strength.
///
/// Log-power mel spectrogram, positive first difference at `lag` frames,
/// averaged over mel bands. The envelope is shifted right by
/// `lag + n_fft / (2 * hop)` frames so a peak lines up with the frame where
/// the onset happens rather than where the centred window first sees it.
///
/// # Arguments
///
/// * `samples` - Mono signal.
/// * `sample_rate` - Its sample rate.
/// * `config` - STFT and mel parameters.
///
/// # Returns
///
/// * One non-negative value per STFT frame.
pub fn onset_strength(samples: &[f32], sample_rate: u32, config: &OnsetConfig) -> Vec<f32> {
    let spectrum = stft(samples, config.n_fft, config.hop_length);
    let (n_bins, n_frames) = spectrum.dim();
    let bank = mel_filterbank(sample_rate, config.n_fft, config.n_mels);

    // Row-major, so frame t of bin f sits at f * n_frames + t.
    let power: Vec<f32> = spectrum.iter().map(|c| c.norm_sqr()).collect();
    let mut mel: Vec<Vec<f32>> = bank
        .iter()
        .map(|weights| {
            let taps: Vec<(usize, f32)> = weights[..n_bins]
                .iter()
                .copied()
                .enumerate()
                .filter(|&(_, w)| w > 0.0)
                .collect();
            (0..n_frames)
                .map(|t| taps.iter().map(|&(f, w)| w * power[f * n_frames + t]).sum())
                .collect()
        })
        .collect();
    power_to_db(&mut mel);

    let lag = config.lag;
    let mut envelope = vec![0.0f32; n_frames];
    if n_frames > lag {
        let pad = lag + config.n_fft / (2 * config.hop_length);
        for t in 0..n_frames - lag {
            let flux = mel
                .iter()
                .map(|band| (band[t + lag] - band[t]).max(0.0))
                .sum::<f32>()
                / mel.len() as f32;
            if let Some(slot) = envelope.get_mut(t + pad) {
                *slot = flux;
            }
        }
    }

    envelope
}

/// Pick onset frames from an onset-strength envelope.
///
/// The envelope is normalised to [0, 1] before peak picking, so `delta` is a
/// fraction of the envelope's range. A flat envelope has no onsets.
pub fn onset_detect(envelope: &[f32], sample_rate: u32, hop_length: usize, delta: f32) -> Vec<usize> {
    let floor = min_value(envelope);
    let range = max_value(envelope) - floor;
    if envelope.is_empty() || range <= f32::EPSILON {
        return vec![];
    }

    let normalized: Vec<f32> = envelope.iter().map(|&v| (v - floor) / range).collect();
    let params = PeakPickParams::for_onsets(sample_rate, hop_length, delta);
    peak_pick(&normalized, &params)
}

/// Onset times in seconds for a signal.
pub fn onset_times(samples: &[f32], sample_rate: u32, config: &OnsetConfig) -> Vec<f32> {
    let envelope = onset_strength(samples, sample_rate, config);
    onset_detect(&envelope, sample_rate, config.hop_length, config.delta)
        .into_iter()
        .map(|frame| frames_to_time(frame, sample_rate, config.hop_length))
        .collect()
}
