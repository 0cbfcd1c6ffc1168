//! Tunable parameters for every stage of the conversion.
//!
//! All thresholds that shape the output live here instead of being
//! literals in the segmenters. A TOML file can override any subset of them;
//! missing keys keep their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    CLOSED_HI_HAT_PITCH, CQT_BINS_PER_OCTAVE, CQT_FMIN, CQT_MIDI_OFFSET, CQT_N_BINS,
    CREPE_MODEL_PATH, HOP_LENGTH, KICK_PITCH, N_FFT, N_MELS, PITCH_FRAME_LENGTH,
    PITCH_HOP_SECONDS, SNARE_PITCH, TICKS_PER_BEAT,
};
use crate::error::{ConvertError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mono: MonoConfig,
    pub poly: PolyConfig,
    pub drums: DrumsConfig,
    pub onset: OnsetConfig,
    pub hpss: HpssConfig,
    pub midi: MidiConfig,
}

/// Which pitch estimator feeds the mono segmenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PitchEstimatorKind {
    Yin,
    Crepe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonoConfig {
    pub confidence_threshold: f32,
    /// Seconds a note extends past the last voiced frame.
    pub note_extension: f32,
    pub min_note_duration: f32,
    pub velocity: u8,
    pub pitch_estimator: PitchEstimatorKind,
    pub model_path: PathBuf,
    pub viterbi: bool,
    pub yin_threshold: f32,
    pub frame_length: usize,
    pub hop_seconds: f32,
    pub min_frequency: f32,
    pub max_frequency: f32,
}

impl Default for MonoConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            note_extension: 0.1,
            min_note_duration: 0.05,
            velocity: 100,
            pitch_estimator: PitchEstimatorKind::Yin,
            model_path: PathBuf::from(CREPE_MODEL_PATH),
            viterbi: true,
            yin_threshold: 0.1,
            frame_length: PITCH_FRAME_LENGTH,
            hop_seconds: PITCH_HOP_SECONDS,
            min_frequency: 32.7,
            max_frequency: 2000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolyConfig {
    pub hop_length: usize,
    pub n_bins: usize,
    pub bins_per_octave: usize,
    pub fmin: f32,
    pub pitch_offset: u8,
    pub pre_max: usize,
    pub post_max: usize,
    pub pre_avg: usize,
    pub post_avg: usize,
    pub delta: f32,
    pub wait: usize,
    /// Fraction of the frame maximum a peak must exceed.
    pub relative_threshold: f32,
    pub velocity_floor: f32,
    pub velocity_span: f32,
}

impl Default for PolyConfig {
    fn default() -> Self {
        Self {
            hop_length: HOP_LENGTH,
            n_bins: CQT_N_BINS,
            bins_per_octave: CQT_BINS_PER_OCTAVE,
            fmin: CQT_FMIN,
            pitch_offset: CQT_MIDI_OFFSET,
            pre_max: 3,
            post_max: 3,
            pre_avg: 3,
            post_avg: 5,
            delta: 0.5,
            wait: 10,
            relative_threshold: 0.1,
            velocity_floor: 50.0,
            velocity_span: 77.0,
        }
    }
}

/// One drum instrument: a frequency band, its onset threshold and the
/// General MIDI key it is written as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrumBand {
    pub name: String,
    pub low_hz: f32,
    pub high_hz: f32,
    pub threshold: f32,
    pub midi_pitch: u8,
}

impl DrumBand {
    pub fn new(name: &str, low_hz: f32, high_hz: f32, threshold: f32, midi_pitch: u8) -> Self {
        Self {
            name: name.to_string(),
            low_hz,
            high_hz,
            threshold,
            midi_pitch,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrumsConfig {
    pub bands: Vec<DrumBand>,
    pub note_length: f32,
    /// Hit velocity is `velocity_floor + velocity_span * envelope / peak`.
    pub velocity_floor: f32,
    pub velocity_span: f32,
    pub fallback_velocity: u8,
    /// Bands quieter than this fraction of the percussive RMS are skipped.
    pub band_gate_ratio: f32,
}

impl Default for DrumsConfig {
    fn default() -> Self {
        Self {
            bands: vec![
                DrumBand::new("kick", 20.0, 200.0, 0.5, KICK_PITCH),
                DrumBand::new("snare", 200.0, 1200.0, 0.4, SNARE_PITCH),
                DrumBand::new("hi-hat", 1200.0, 8000.0, 0.3, CLOSED_HI_HAT_PITCH),
            ],
            note_length: 0.1,
            velocity_floor: 60.0,
            velocity_span: 67.0,
            fallback_velocity: 100,
            band_gate_ratio: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    pub lag: usize,
    pub delta: f32,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            n_fft: N_FFT,
            hop_length: HOP_LENGTH,
            n_mels: N_MELS,
            lag: 1,
            delta: 0.07,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HpssConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub kernel_size: usize,
    pub power: f32,
}

impl Default for HpssConfig {
    fn default() -> Self {
        Self {
            n_fft: N_FFT,
            hop_length: HOP_LENGTH,
            kernel_size: 31,
            power: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    pub ticks_per_beat: u16,
    pub program: u8,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            ticks_per_beat: TICKS_PER_BEAT,
            program: 0,
        }
    }
}

impl Config {
    /// Parse a configuration from TOML text and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a stage meaningless.
    pub fn validate(&self) -> Result<()> {
        let mono = &self.mono;
        if !(0.0..=1.0).contains(&mono.confidence_threshold) {
            return invalid("mono.confidence_threshold must be within [0, 1]");
        }
        if mono.note_extension <= 0.0 {
            return invalid("mono.note_extension must be positive");
        }
        if mono.min_note_duration < 0.0 {
            return invalid("mono.min_note_duration must not be negative");
        }
        check_velocity("mono.velocity", mono.velocity)?;
        if mono.frame_length < 64 || mono.hop_seconds <= 0.0 {
            return invalid("mono.frame_length must be at least 64 and mono.hop_seconds positive");
        }
        if mono.min_frequency <= 0.0 || mono.max_frequency <= mono.min_frequency {
            return invalid("mono frequency range must be positive and non-empty");
        }

        let poly = &self.poly;
        if poly.hop_length == 0 || poly.n_bins == 0 || poly.bins_per_octave == 0 {
            return invalid("poly.hop_length, poly.n_bins and poly.bins_per_octave must be positive");
        }
        if poly.fmin <= 0.0 {
            return invalid("poly.fmin must be positive");
        }
        if !(0.0..1.0).contains(&poly.relative_threshold) {
            return invalid("poly.relative_threshold must be within [0, 1)");
        }

        let drums = &self.drums;
        if drums.note_length <= 0.0 {
            return invalid("drums.note_length must be positive");
        }
        check_velocity("drums.fallback_velocity", drums.fallback_velocity)?;
        for band in &drums.bands {
            if band.low_hz < 0.0 || band.high_hz <= band.low_hz {
                return Err(ConvertError::InvalidConfig(format!(
                    "drum band '{}' has an empty frequency range",
                    band.name
                )));
            }
            if band.midi_pitch > 127 {
                return Err(ConvertError::InvalidConfig(format!(
                    "drum band '{}' pitch {} is outside 0-127",
                    band.name, band.midi_pitch
                )));
            }
        }

        if self.onset.n_fft == 0 || self.onset.hop_length == 0 || self.onset.n_mels == 0 {
            return invalid("onset.n_fft, onset.hop_length and onset.n_mels must be positive");
        }
        if self.onset.lag == 0 {
            return invalid("onset.lag must be at least 1");
        }
        if self.hpss.n_fft == 0 || self.hpss.hop_length == 0 || self.hpss.kernel_size == 0 {
            return invalid("hpss.n_fft, hpss.hop_length and hpss.kernel_size must be positive");
        }
        if self.midi.ticks_per_beat == 0 || self.midi.ticks_per_beat > 0x7fff {
            return invalid("midi.ticks_per_beat must be within 1-32767");
        }
        if self.midi.program > 127 {
            return invalid("midi.program must be within 0-127");
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> Result<()> {
    Err(ConvertError::InvalidConfig(msg.to_string()))
}

fn check_velocity(name: &str, velocity: u8) -> Result<()> {
    if (1..=127).contains(&velocity) {
        Ok(())
    } else {
        Err(ConvertError::InvalidConfig(format!(
            "{} must be within 1-127, got {}",
            name, velocity
        )))
    }
}

/// Load and validate a TOML configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConvertError::InvalidConfig(format!("cannot read {}: {}", path.display(), e)))?;
    Config::from_toml_str(&content)
}
