//! Monophonic note segmentation.
//!
//! A two-state machine walks the pitch curve frame by frame. Consecutive
//! confident frames that round to the same MIDI key extend one note; a key
//! change or an unvoiced frame closes it.

use crate::config::MonoConfig;
use crate::inference::PitchFrame;

use super::helpers::ported::librosa::hz_to_midi;
use super::note_events::{midi_key, NoteEvent};

/// Segmenter state between two frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonoState {
    Idle,
    Open { pitch: u8, start: f32, end: f32 },
}

impl MonoState {
    /// Advance by one frame.
    ///
    /// # Arguments
    ///
    /// * `frame` - The next pitch frame, in time order.
    /// * `config` - Confidence threshold, note extension and velocity.
    ///
    /// # Returns
    ///
    /// * The next state and the note closed by this frame, if any. Closed
    ///   notes are not yet duration-filtered.
    pub fn step(self, frame: &PitchFrame, config: &MonoConfig) -> (MonoState, Option<NoteEvent>) {
        let voiced = frame.frequency > 0.0 && frame.confidence >= config.confidence_threshold;

        if !voiced {
            return (MonoState::Idle, self.finish(config.velocity));
        }

        let pitch = midi_key(hz_to_midi(frame.frequency));
        let end = frame.time + config.note_extension;

        match self {
            MonoState::Open { pitch: open_pitch, start, .. } if open_pitch == pitch => {
                (MonoState::Open { pitch, start, end }, None)
            }
            _ => (
                MonoState::Open { pitch, start: frame.time, end },
                self.finish(config.velocity),
            ),
        }
    }

    /// Close the open note, if there is one.
    pub fn finish(self, velocity: u8) -> Option<NoteEvent> {
        match self {
            MonoState::Idle => None,
            MonoState::Open { pitch, start, end } => Some(NoteEvent {
                pitch,
                start,
                end,
                velocity,
            }),
        }
    }
}

/// Segment a pitch curve into notes.
///
/// Notes shorter than `min_note_duration` are dropped; every note carries the
/// fixed mono velocity.
pub fn segment_mono(frames: &[PitchFrame], config: &MonoConfig) -> Vec<NoteEvent> {
    let mut notes = Vec::new();
    let last = frames.iter().fold(MonoState::Idle, |state, frame| {
        let (next, closed) = state.step(frame, config);
        notes.extend(closed);
        next
    });
    notes.extend(last.finish(config.velocity));

    let total = notes.len();
    notes.retain(|note| note.duration() >= config.min_note_duration);
    if notes.len() < total {
        log::debug!("Dropped {} notes shorter than {}s", total - notes.len(), config.min_note_duration);
    }

    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postprocessing::helpers::ported::librosa::midi_to_hz;

    fn voiced(time: f32, midi: f32) -> PitchFrame {
        PitchFrame {
            time,
            frequency: midi_to_hz(midi),
            confidence: 0.9,
        }
    }

    fn unvoiced(time: f32) -> PitchFrame {
        PitchFrame {
            time,
            frequency: 0.0,
            confidence: 0.0,
        }
    }

    #[test]
    fn idle_opens_on_confident_frame() {
        let config = MonoConfig::default();
        let (state, closed) = MonoState::Idle.step(&voiced(0.5, 60.0), &config);
        assert_eq!(closed, None);
        match state {
            MonoState::Open { pitch, start, end } => {
                assert_eq!(pitch, 60);
                assert_eq!(start, 0.5);
                assert!((end - 0.6).abs() < 1e-6);
            }
            MonoState::Idle => panic!("expected an open note"),
        }
    }

    #[test]
    fn low_confidence_closes_open_note() {
        let config = MonoConfig::default();
        let open = MonoState::Open {
            pitch: 60,
            start: 0.0,
            end: 0.3,
        };
        let frame = PitchFrame {
            time: 0.3,
            frequency: 261.6,
            confidence: 0.69,
        };
        let (state, closed) = open.step(&frame, &config);
        assert_eq!(state, MonoState::Idle);
        assert_eq!(closed.map(|n| (n.pitch, n.end)), Some((60, 0.3)));
    }

    #[test]
    fn same_pitch_frames_merge_into_one_note() {
        let config = MonoConfig::default();
        let frames: Vec<PitchFrame> = (0..20).map(|i| voiced(0.2 + i as f32 * 0.01, 69.2)).collect();

        let notes = segment_mono(&frames, &config);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].pitch, 69);
        assert!((notes[0].start - 0.2).abs() < 1e-6);
        assert!((notes[0].end - (0.39 + 0.1)).abs() < 1e-5);
        assert_eq!(notes[0].velocity, 100);
    }

    #[test]
    fn pitch_change_splits_notes() {
        let config = MonoConfig::default();
        let frames = vec![
            voiced(0.0, 60.0),
            voiced(0.1, 60.0),
            voiced(0.2, 62.0),
            voiced(0.3, 62.0),
        ];

        let notes = segment_mono(&frames, &config);
        let pitches: Vec<u8> = notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![60, 62]);
        assert!((notes[0].end - 0.2).abs() < 1e-6);
        assert!((notes[1].start - 0.2).abs() < 1e-6);
    }

    #[test]
    fn all_unvoiced_yields_nothing() {
        let frames: Vec<PitchFrame> = (0..50).map(|i| unvoiced(i as f32 * 0.01)).collect();
        assert!(segment_mono(&frames, &MonoConfig::default()).is_empty());
    }

    #[test]
    fn single_voiced_frame_survives_duration_filter() {
        let frames = vec![unvoiced(0.0), voiced(0.01, 64.0), unvoiced(0.02)];
        let notes = segment_mono(&frames, &MonoConfig::default());
        assert_eq!(notes.len(), 1);
        assert!((notes[0].duration() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn short_notes_are_filtered() {
        let config = MonoConfig {
            note_extension: 0.03,
            ..MonoConfig::default()
        };
        let frames = vec![voiced(0.0, 64.0), unvoiced(0.01), voiced(0.02, 64.0), voiced(0.05, 64.0)];
        let notes = segment_mono(&frames, &config);

        assert_eq!(notes.len(), 1);
        assert!((notes[0].start - 0.02).abs() < 1e-6);
        assert!(notes.iter().all(|n| n.duration() >= config.min_note_duration));
    }

    #[test]
    fn no_emitted_note_mixes_two_pitches() {
        let config = MonoConfig::default();
        let keys = [60.0, 60.0, 61.0, 61.0, 61.0, 59.0, 60.0, 60.0];
        let frames: Vec<PitchFrame> = keys
            .iter()
            .enumerate()
            .map(|(i, &k)| voiced(i as f32 * 0.05, k))
            .collect();

        let notes = segment_mono(&frames, &config);
        assert_eq!(notes.len(), 4);
        for note in &notes {
            let covered: Vec<&PitchFrame> = frames
                .iter()
                .filter(|f| f.time >= note.start && f.time < note.end - config.note_extension + 1e-6)
                .collect();
            assert!(covered.iter().all(|f| midi_key(hz_to_midi(f.frequency)) == note.pitch));
        }
    }
}
