//! Polyphonic note segmentation.
//!
//! Notes are assumed to change together at onsets. At every onset the
//! nearest spectral frame is peak-picked along the pitch axis and each strong
//! enough peak becomes a note lasting until the next onset.

use crate::config::PolyConfig;

use super::helpers::ported::librosa::{peak_pick, PeakPickParams};
use super::helpers::ported::numpy::max_value;
use super::note_events::{midi_velocity, NoteEvent};

/// One column of a magnitude spectrogram.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralFrame {
    pub time: f32,
    pub magnitudes: Vec<f32>,
}

/// How long each onset's chord lasts: until the next onset, and the last one
/// until the end of the audio.
pub fn onset_durations(onsets: &[f32], total_duration: f32) -> Vec<f32> {
    onsets
        .iter()
        .enumerate()
        .map(|(i, &onset)| onsets.get(i + 1).copied().unwrap_or(total_duration) - onset)
        .collect()
}

/// Index of the frame whose timestamp is closest to `time`. Ties go to the
/// earlier frame.
pub fn nearest_frame(frames: &[SpectralFrame], time: f32) -> Option<usize> {
    frames
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, frame)| {
            let distance = (frame.time - time).abs();
            match best {
                Some((_, best_distance)) if best_distance <= distance => best,
                _ => Some((i, distance)),
            }
        })
        .map(|(i, _)| i)
}

fn pitch_axis_params(config: &PolyConfig) -> PeakPickParams {
    PeakPickParams {
        pre_max: config.pre_max,
        post_max: config.post_max,
        pre_avg: config.pre_avg,
        post_avg: config.post_avg,
        delta: config.delta,
        wait: config.wait,
    }
}

/// Segment a spectrogram into block chords at the given onsets.
///
/// # Arguments
///
/// * `frames` - Spectral frames in time order.
/// * `onsets` - Strictly increasing onset times in seconds.
/// * `total_duration` - Length of the audio, closing the last chord.
/// * `config` - Peak-picking windows, threshold and velocity mapping.
///
/// # Returns
///
/// * Notes grouped by onset, ascending in pitch within each onset.
pub fn segment_poly(
    frames: &[SpectralFrame],
    onsets: &[f32],
    total_duration: f32,
    config: &PolyConfig,
) -> Vec<NoteEvent> {
    let params = pitch_axis_params(config);
    let durations = onset_durations(onsets, total_duration);
    let mut notes = Vec::new();

    for (&onset, &duration) in onsets.iter().zip(durations.iter()) {
        if duration <= 0.0 {
            log::debug!("Skipping onset at {:.3}s with no duration", onset);
            continue;
        }
        let frame = match nearest_frame(frames, onset) {
            Some(i) => &frames[i],
            None => break,
        };

        let peak = max_value(&frame.magnitudes);
        if peak <= 0.0 {
            continue;
        }

        for bin in peak_pick(&frame.magnitudes, &params) {
            let ratio = frame.magnitudes[bin] / peak;
            if ratio <= config.relative_threshold {
                continue;
            }
            let pitch = bin + config.pitch_offset as usize;
            if pitch > 127 {
                continue;
            }
            notes.push(NoteEvent {
                pitch: pitch as u8,
                start: onset,
                end: onset + duration,
                velocity: midi_velocity(config.velocity_floor + config.velocity_span * ratio),
            });
        }
    }

    notes
}
