//! Drum transcription.
//!
//! Every configured band is filtered out of the percussive signal, given its
//! own onset envelope and peak-picked with its own threshold. Hits become
//! short notes on the band's General MIDI key.

use crate::config::{DrumBand, DrumsConfig, OnsetConfig};
use crate::preprocessing::filters::band_filter;
use crate::preprocessing::load_audio::AudioBuffer;
use crate::preprocessing::onset::{onset_detect, onset_strength};

use super::helpers::ported::librosa::frames_to_time;
use super::helpers::ported::numpy::{max_value, rms};
use super::note_events::{midi_velocity, sort_notes, NoteEvent};

/// A detected hit within one band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnsetEvent {
    pub frame: usize,
    pub time: f32,
}

/// Velocity of a hit from its onset-envelope value.
///
/// Falls back to `drums.fallback_velocity` when the frame lies outside the
/// envelope or the envelope is flat.
pub fn onset_velocity(envelope: &[f32], frame: usize, drums: &DrumsConfig) -> u8 {
    let peak = max_value(envelope);
    match envelope.get(frame) {
        Some(&value) if peak > 0.0 => midi_velocity(drums.velocity_floor + drums.velocity_span * value / peak),
        _ => drums.fallback_velocity,
    }
}

/// Onsets of an already band-limited signal, with its onset envelope.
///
/// `threshold` is the peak-picking delta on the normalised envelope.
pub fn band_onsets(
    filtered: &[f32],
    sample_rate: u32,
    threshold: f32,
    onset: &OnsetConfig,
) -> (Vec<OnsetEvent>, Vec<f32>) {
    let envelope = onset_strength(filtered, sample_rate, onset);
    let events = onset_detect(&envelope, sample_rate, onset.hop_length, threshold)
        .into_iter()
        .map(|frame| OnsetEvent {
            frame,
            time: frames_to_time(frame, sample_rate, onset.hop_length),
        })
        .collect();
    (events, envelope)
}

fn band_notes(
    audio: &AudioBuffer,
    band: &DrumBand,
    gate: f32,
    drums: &DrumsConfig,
    onset: &OnsetConfig,
) -> Vec<NoteEvent> {
    let filtered = band_filter(&audio.samples, audio.sample_rate, band);
    let level = rms(&filtered);
    if level < gate {
        log::debug!("Band {} is below the gate ({:.2e} < {:.2e})", band.name, level, gate);
        return vec![];
    }

    let (events, envelope) = band_onsets(&filtered, audio.sample_rate, band.threshold, onset);
    log::debug!("Band {}: {} onsets", band.name, events.len());

    events
        .into_iter()
        .map(|event| NoteEvent {
            pitch: band.midi_pitch,
            start: event.time,
            end: event.time + drums.note_length,
            velocity: onset_velocity(&envelope, event.frame, drums),
        })
        .collect()
}

/// Transcribe the percussive part of a signal into drum hits.
///
/// # Arguments
///
/// * `percussive` - The percussive component of the input.
/// * `drums` - Bands, note length and velocity fallback.
/// * `onset` - Onset envelope parameters shared by all bands.
///
/// # Returns
///
/// * Hits from all bands, sorted by start time then pitch.
pub fn segment_drums(percussive: &AudioBuffer, drums: &DrumsConfig, onset: &OnsetConfig) -> Vec<NoteEvent> {
    let gate = drums.band_gate_ratio * rms(&percussive.samples);
    if gate <= 0.0 {
        return vec![];
    }

    let mut notes: Vec<NoteEvent> = drums
        .bands
        .iter()
        .flat_map(|band| band_notes(percussive, band, gate, drums, onset))
        .collect();
    sort_notes(&mut notes);
    notes
}
