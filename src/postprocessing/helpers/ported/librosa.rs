/* PORTED LIBROSA FUNCTIONS */

use crate::constants::{AMIN, TOP_DB};

/// Converts a frequency in Hz to the corresponding MIDI pitch.
///
/// # Arguments
///
/// * `hz` - A frequency in Hz.
///
/// # Returns
///
/// * The corresponding MIDI pitch.
pub fn hz_to_midi(hz: f32) -> f32 {
    12.0 * (hz.log2() - 440.0f32.log2()) + 69.0
}

/// Converts a MIDI pitch to the corresponding frequency in Hz.
///
/// # Arguments
///
/// * `midi` - A MIDI pitch.
///
/// # Returns
///
/// * The corresponding frequency in Hz.
pub fn midi_to_hz(midi: f32) -> f32 {
    440.0 * 2.0f32.powf((midi - 69.0) / 12.0)
}

/// Converts STFT frame indices to seconds.
pub fn frames_to_time(frame: usize, sample_rate: u32, hop_length: usize) -> f32 {
    (frame * hop_length) as f32 / sample_rate as f32
}

/// Converts a frequency in Hz to the Slaney mel scale.
pub fn hz_to_mel(hz: f32) -> f32 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = 6.4f32.ln() / 27.0;

    if hz >= min_log_hz {
        min_log_mel + (hz / min_log_hz).ln() / logstep
    } else {
        hz / f_sp
    }
}

/// Converts a Slaney mel value back to Hz.
pub fn mel_to_hz(mel: f32) -> f32 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = 6.4f32.ln() / 27.0;

    if mel >= min_log_mel {
        min_log_hz * (logstep * (mel - min_log_mel)).exp()
    } else {
        f_sp * mel
    }
}

/// Build a Slaney-normalised mel filterbank.
///
/// # Arguments
///
/// * `sample_rate` - Sample rate of the analysed audio.
/// * `n_fft` - FFT size; the bank spans `n_fft / 2 + 1` bins.
/// * `n_mels` - Number of mel bands.
///
/// # Returns
///
/// * `n_mels` rows of filter weights, one weight per FFT bin.
pub fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<Vec<f32>> {
    let n_bins = n_fft / 2 + 1;
    let fmax = sample_rate as f32 / 2.0;
    let fft_freqs: Vec<f32> = (0..n_bins)
        .map(|i| i as f32 * sample_rate as f32 / n_fft as f32)
        .collect();

    let mel_max = hz_to_mel(fmax);
    let mel_freqs: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f32 / (n_mels + 1) as f32))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (lower, center, upper) = (mel_freqs[m], mel_freqs[m + 1], mel_freqs[m + 2]);
            let enorm = 2.0 / (upper - lower);
            fft_freqs
                .iter()
                .map(|&f| {
                    let rising = (f - lower) / (center - lower);
                    let falling = (upper - f) / (upper - center);
                    rising.min(falling).max(0.0) * enorm
                })
                .collect()
        })
        .collect()
}

/// Convert a power spectrogram to decibels, clipped to `TOP_DB` below its
/// peak.
pub fn power_to_db(power: &mut [Vec<f32>]) {
    let mut peak = f32::NEG_INFINITY;
    for row in power.iter_mut() {
        for value in row.iter_mut() {
            *value = 10.0 * value.max(AMIN).log10();
            peak = peak.max(*value);
        }
    }

    let floor = peak - TOP_DB;
    for row in power.iter_mut() {
        for value in row.iter_mut() {
            *value = value.max(floor);
        }
    }
}

/// Window sizes for [`peak_pick`], in samples of the picked signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakPickParams {
    pub pre_max: usize,
    pub post_max: usize,
    pub pre_avg: usize,
    pub post_avg: usize,
    pub delta: f32,
    pub wait: usize,
}

impl PeakPickParams {
    /// The onset-detection defaults, expressed in frames for a given rate.
    pub fn for_onsets(sample_rate: u32, hop_length: usize, delta: f32) -> Self {
        let frames = |seconds: f32| (seconds * sample_rate as f32 / hop_length as f32).floor() as usize;
        Self {
            pre_max: frames(0.03),
            post_max: frames(0.0) + 1,
            pre_avg: frames(0.10),
            post_avg: frames(0.10) + 1,
            delta,
            wait: frames(0.03),
        }
    }
}

/// Pick peaks in a signal.
///
/// A sample `n` is selected when all of the following hold:
///
/// 1. `x[n] == max(x[n - pre_max..n + post_max])`
/// 2. `x[n] >= mean(x[n - pre_avg..n + post_avg]) + delta`
/// 3. `n - previous_n > wait`
///
/// Windows are clipped at the signal edges and zero-valued samples are never
/// peaks.
///
/// # Arguments
///
/// * `x` - Input signal.
/// * `params` - Window sizes, threshold and minimum gap.
///
/// # Returns
///
/// * Indices of the selected peaks, in increasing order.
pub fn peak_pick(x: &[f32], params: &PeakPickParams) -> Vec<usize> {
    let mut peaks: Vec<usize> = Vec::new();

    for n in 0..x.len() {
        let value = x[n];
        if value == 0.0 {
            continue;
        }

        let max_start = n.saturating_sub(params.pre_max);
        let max_end = (n + params.post_max).min(x.len()).max(n + 1);
        let local_max = x[max_start..max_end]
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        if value < local_max {
            continue;
        }

        let avg_start = n.saturating_sub(params.pre_avg);
        let avg_end = (n + params.post_avg).min(x.len()).max(n + 1);
        let window = &x[avg_start..avg_end];
        let local_avg = window.iter().sum::<f32>() / window.len() as f32;
        if value < local_avg + params.delta {
            continue;
        }

        if let Some(&last) = peaks.last() {
            if n <= last + params.wait {
                continue;
            }
        }

        peaks.push(n);
    }

    peaks
}
