//! Mode dispatch: load, analyse, segment and write.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use clap::ValueEnum;

use crate::config::Config;
use crate::error::{ConvertError, Result};
use crate::inference::run_inference;
use crate::postprocessing::drums::segment_drums;
use crate::postprocessing::midi::{emit, micros_per_beat, TrackSettings};
use crate::postprocessing::mono::segment_mono;
use crate::postprocessing::note_events::{sort_notes, NoteEvent};
use crate::postprocessing::poly::segment_poly;
use crate::preprocessing::cqt::ConstantQ;
use crate::preprocessing::hpss::hpss;
use crate::preprocessing::load_audio::{load_audio, AudioBuffer};
use crate::preprocessing::onset::onset_times;

/// Transcription policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Single melodic line from a pitch curve.
    Mono,
    /// Block chords from constant-Q peaks at onsets.
    Poly,
    /// Kick, snare and hi-hat hits on a drum track.
    Drums,
}

impl FromStr for Mode {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mono" => Ok(Mode::Mono),
            "poly" => Ok(Mode::Poly),
            "drums" => Ok(Mode::Drums),
            _ => Err(ConvertError::UnsupportedMode(s.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Mono => "mono",
            Mode::Poly => "poly",
            Mode::Drums => "drums",
        };
        write!(f, "{}", name)
    }
}

/// What to convert and how.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversionRequest {
    pub mode: Mode,
    pub tempo_bpm: Option<f32>,
}

impl ConversionRequest {
    /// Build a request, rejecting tempos a MIDI tempo event cannot carry.
    pub fn new(mode: Mode, tempo_bpm: Option<f32>) -> Result<Self> {
        if let Some(bpm) = tempo_bpm {
            if micros_per_beat(bpm).is_none() {
                return Err(ConvertError::InvalidTempo(bpm));
            }
        }
        Ok(Self { mode, tempo_bpm })
    }
}

/// What a finished conversion wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionSummary {
    pub mode: Mode,
    pub notes: usize,
    pub duration_seconds: f32,
}

/// Run one transcription policy over decoded audio.
///
/// # Arguments
///
/// * `audio` - Mono input buffer.
/// * `mode` - The policy to apply.
/// * `config` - Thresholds for every stage.
///
/// # Returns
///
/// * Notes sorted by start time, then pitch.
pub fn transcribe(audio: &AudioBuffer, mode: Mode, config: &Config) -> Result<Vec<NoteEvent>> {
    let mut notes = match mode {
        Mode::Mono => {
            let frames = run_inference(audio, &config.mono)?;
            segment_mono(&frames, &config.mono)
        }
        Mode::Poly => {
            let harmonic = hpss(&audio.samples, &config.hpss).harmonic;
            let poly = &config.poly;
            let cqt = ConstantQ::new(audio.sample_rate, poly.fmin, poly.n_bins, poly.bins_per_octave, poly.hop_length);
            let frames = cqt.process(&harmonic);
            let onsets = onset_times(&harmonic, audio.sample_rate, &config.onset);
            log::info!("Found {} onsets over {} spectral frames", onsets.len(), frames.len());
            segment_poly(&frames, &onsets, audio.duration(), poly)
        }
        Mode::Drums => {
            let percussive = AudioBuffer::new(hpss(&audio.samples, &config.hpss).percussive, audio.sample_rate)?;
            segment_drums(&percussive, &config.drums, &config.onset)
        }
    };

    sort_notes(&mut notes);
    Ok(notes)
}

/// Convert an audio file into a single-track MIDI file.
///
/// Nothing is written when loading or analysis fails. An empty transcription
/// still produces a valid file with one empty track.
pub fn convert<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    request: &ConversionRequest,
    config: &Config,
) -> Result<ConversionSummary> {
    config.validate()?;
    let audio = load_audio(input)?;

    let notes = transcribe(&audio, request.mode, config)?;
    if notes.is_empty() {
        log::warn!("No notes detected in {} mode; writing an empty track", request.mode);
    } else {
        log::info!("Transcribed {} notes in {} mode", notes.len(), request.mode);
    }

    let settings = TrackSettings {
        tempo_bpm: request.tempo_bpm,
        is_drum_track: request.mode == Mode::Drums,
        program: config.midi.program,
        ticks_per_beat: config.midi.ticks_per_beat,
    };
    emit(output, &notes, &settings)?;

    Ok(ConversionSummary {
        mode: request.mode,
        notes: notes.len(),
        duration_seconds: audio.duration(),
    })
}
