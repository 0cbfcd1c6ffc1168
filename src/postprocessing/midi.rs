use midly::num::{u4, u7};
use midly::Format;
use midly::Header;
use midly::MetaMessage;
use midly::MidiMessage;
use midly::Smf;
use midly::Timing;
use midly::Track;
use midly::TrackEvent;
use midly::TrackEventKind;

use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_TEMPO_BPM, DRUM_CHANNEL, MAX_TEMPO_MICROS, MELODIC_CHANNEL};
use crate::error::{ConvertError, Result};

use super::note_events::NoteEvent;

/// How the single output track is written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSettings {
    /// Initial tempo. `None` writes no tempo event, so readers assume 120 BPM.
    pub tempo_bpm: Option<f32>,
    /// Drum tracks go on channel 10 and carry no program change.
    pub is_drum_track: bool,
    pub program: u8,
    pub ticks_per_beat: u16,
}

impl TrackSettings {
    fn channel(&self) -> u4 {
        u4::new(if self.is_drum_track { DRUM_CHANNEL } else { MELODIC_CHANNEL })
    }

    fn ticks_per_second(&self) -> f32 {
        let bpm = self.tempo_bpm.unwrap_or(DEFAULT_TEMPO_BPM);
        self.ticks_per_beat as f32 * bpm / 60.0
    }
}

#[derive(Debug, Clone)]
struct TrackEventAbsolute<'a> {
    tick: u32,
    /// Note-offs sort before note-ons on the same tick.
    order: u8,
    kind: TrackEventKind<'a>,
}

/// Microseconds per quarter note for `bpm`, or `None` when the tempo is not
/// positive or too slow for the 24-bit tempo field.
pub fn micros_per_beat(bpm: f32) -> Option<u32> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return None;
    }
    let micros = (60_000_000.0 / bpm as f64).round();
    (micros <= MAX_TEMPO_MICROS as f64).then(|| micros as u32)
}

fn seconds_to_tick(seconds: f32, ticks_per_second: f32) -> u32 {
    (seconds.max(0.0) * ticks_per_second).round() as u32
}

/// Turn note events into delta-timed track events.
///
/// Every note becomes a note-on at its start tick and a note-off at its end
/// tick, at least one tick later. Events are ordered by tick, with note-offs
/// first so a repeated key is released before it is struck again.
pub fn generate_ordered_midi_events(notes: &[NoteEvent], settings: &TrackSettings) -> Vec<TrackEvent<'static>> {
    let ticks_per_second = settings.ticks_per_second();
    let channel = settings.channel();

    let mut track_events_absolute: Vec<TrackEventAbsolute> = vec![];
    for note in notes {
        let key = u7::new(note.pitch.min(127));
        let vel = u7::new(note.velocity.clamp(1, 127));

        let start_tick = seconds_to_tick(note.start, ticks_per_second);
        let end_tick = seconds_to_tick(note.end, ticks_per_second).max(start_tick + 1);

        track_events_absolute.push(TrackEventAbsolute {
            tick: start_tick,
            order: 1,
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn { key, vel },
            },
        });
        track_events_absolute.push(TrackEventAbsolute {
            tick: end_tick,
            order: 0,
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff { key, vel },
            },
        });
    }

    track_events_absolute.sort_by_key(|event| (event.tick, event.order));

    let mut previous_tick = 0;
    track_events_absolute
        .into_iter()
        .map(|event| {
            let delta = event.tick - previous_tick;
            previous_tick = event.tick;
            TrackEvent {
                delta: delta.into(),
                kind: event.kind,
            }
        })
        .collect()
}

/// Generate MIDI file data from note events.
///
/// # Arguments
///
/// * `notes` - Time-based note events for one track.
/// * `settings` - Tempo, channel, program and resolution.
///
/// # Returns
///
/// * The bytes of a format 0 Standard MIDI File.
pub fn generate_midi_file_data(notes: &[NoteEvent], settings: &TrackSettings) -> Result<Vec<u8>> {
    let timing = Timing::Metrical(settings.ticks_per_beat.into());

    let mut smf = Smf::new(Header {
        format: Format::SingleTrack,
        timing,
    });
    let mut track = Track::new();

    if let Some(bpm) = settings.tempo_bpm {
        let micros = micros_per_beat(bpm).ok_or(ConvertError::InvalidTempo(bpm))?;
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(micros.into())),
        });
    }

    if !settings.is_drum_track {
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Midi {
                channel: settings.channel(),
                message: MidiMessage::ProgramChange {
                    program: u7::new(settings.program.min(127)),
                },
            },
        });
    }

    track.extend(generate_ordered_midi_events(notes, settings));
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    smf.tracks.push(track);

    let mut buffer = Vec::new();
    smf.write_std(&mut Cursor::new(&mut buffer))
        .map_err(|e| ConvertError::Midi(e.to_string()))?;

    Ok(buffer)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Write `staging` with `write`, then rename it onto `path`. The staging file
/// is removed on any failure.
fn write_staged<F>(staging: &Path, path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut fs::File) -> io::Result<()>,
{
    let result = fs::File::create(staging)
        .and_then(|mut file| {
            write(&mut file)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(staging, path));

    if result.is_err() && staging.is_file() {
        let _ = fs::remove_file(staging);
    }
    result
}

/// Serialize one track and write it to `path`.
///
/// The file is written next to its destination and renamed into place, so a
/// failed conversion never leaves a truncated file behind.
pub fn emit<P: AsRef<Path>>(path: P, notes: &[NoteEvent], settings: &TrackSettings) -> Result<()> {
    let path = path.as_ref();
    let data = generate_midi_file_data(notes, settings)?;

    let write_error = |source| ConvertError::Write {
        path: path.to_path_buf(),
        source,
    };

    write_staged(&temp_path(path), path, |file| file.write_all(&data)).map_err(write_error)?;

    log::info!("Wrote {} notes to {}", notes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::u15;

    fn settings(tempo_bpm: Option<f32>, is_drum_track: bool) -> TrackSettings {
        TrackSettings {
            tempo_bpm,
            is_drum_track,
            program: 0,
            ticks_per_beat: 220,
        }
    }

    fn note(pitch: u8, start: f32, end: f32) -> NoteEvent {
        NoteEvent {
            pitch,
            start,
            end,
            velocity: 100,
        }
    }

    fn tempo_of(data: &[u8]) -> Option<u32> {
        let smf = Smf::parse(data).unwrap();
        smf.tracks[0].iter().find_map(|event| match event.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(t)) => Some(t.as_int()),
            _ => None,
        })
    }

    #[test]
    fn tempo_meta_encodes_bpm() {
        let data = generate_midi_file_data(&[note(69, 0.0, 1.0)], &settings(Some(120.0), false)).unwrap();
        assert_eq!(tempo_of(&data), Some(500_000));

        let smf = Smf::parse(&data).unwrap();
        assert_eq!(smf.header.format, Format::SingleTrack);
        assert_eq!(smf.header.timing, Timing::Metrical(u15::new(220)));
    }

    #[test]
    fn no_tempo_without_bpm() {
        let data = generate_midi_file_data(&[note(60, 0.0, 0.5)], &settings(None, false)).unwrap();
        assert_eq!(tempo_of(&data), None);
    }

    #[test]
    fn empty_track_is_still_a_valid_file() {
        let data = generate_midi_file_data(&[], &settings(None, false)).unwrap();
        let smf = Smf::parse(&data).unwrap();
        assert_eq!(smf.tracks.len(), 1);
        assert!(smf.tracks[0]
            .iter()
            .all(|e| !matches!(e.kind, TrackEventKind::Midi { message: MidiMessage::NoteOn { .. }, .. })));
        assert!(matches!(
            smf.tracks[0].last().map(|e| e.kind),
            Some(TrackEventKind::Meta(MetaMessage::EndOfTrack))
        ));
    }

    #[test]
    fn notes_land_on_expected_ticks() {
        // 120 BPM at 220 ticks per beat is 440 ticks per second.
        let events = generate_ordered_midi_events(&[note(60, 0.5, 1.0)], &settings(None, false));
        let deltas: Vec<u32> = events.iter().map(|e| e.delta.as_int()).collect();
        assert_eq!(deltas, vec![220, 220]);
    }

    #[test]
    fn note_off_precedes_note_on_on_the_same_tick() {
        let events = generate_ordered_midi_events(
            &[note(60, 0.0, 0.5), note(60, 0.5, 1.0)],
            &settings(Some(120.0), false),
        );
        let kinds: Vec<bool> = events
            .iter()
            .map(|e| matches!(e.kind, TrackEventKind::Midi { message: MidiMessage::NoteOn { .. }, .. }))
            .collect();
        assert_eq!(kinds, vec![true, false, true, false]);
    }

    #[test]
    fn drums_use_channel_ten() {
        let events = generate_ordered_midi_events(&[note(36, 0.2, 0.3)], &settings(None, true));
        assert!(events
            .iter()
            .all(|e| matches!(e.kind, TrackEventKind::Midi { channel, .. } if channel.as_int() == 9)));
    }

    #[test]
    fn emit_writes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mid");
        emit(&path, &[note(64, 0.0, 0.25)], &settings(Some(90.0), false)).unwrap();

        let data = fs::read(&path).unwrap();
        assert_eq!(tempo_of(&data), Some(666_667));
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn tempo_too_slow_for_the_tempo_field_is_rejected() {
        assert_eq!(micros_per_beat(120.0), Some(500_000));
        assert_eq!(micros_per_beat(3.6), Some(16_666_667));
        assert_eq!(micros_per_beat(2.0), None);
        assert_eq!(micros_per_beat(0.0), None);

        let err = generate_midi_file_data(&[note(60, 0.0, 0.5)], &settings(Some(2.0), false)).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidTempo(bpm) if bpm == 2.0));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn failed_staging_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mid");
        let staging = temp_path(&path);

        let err = write_staged(&staging, &path, |file| {
            file.write_all(b"MThd")?;
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        })
        .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert!(!staging.exists());
        assert!(!path.exists());
    }

    #[test]
    fn emit_into_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.mid");
        let err = emit(&path, &[], &settings(None, false)).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(!path.exists());
    }
}
