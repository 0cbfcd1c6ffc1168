// Pitch estimation
pub const PITCH_SAMPLE_RATE: u32 = 16000;
pub const PITCH_FRAME_LENGTH: usize = 1024;
pub const PITCH_HOP_SECONDS: f32 = 0.01;
pub const CREPE_N_BINS: usize = 360;
pub const CREPE_CENTS_OFFSET: f32 = 1997.379_4;
pub const CREPE_CENTS_PER_BIN: f32 = 20.0;
pub const CREPE_MODEL_PATH: &str = "./model/crepe_full.onnx";

// Spectral analysis
pub const N_FFT: usize = 2048;
pub const HOP_LENGTH: usize = 512;
pub const N_MELS: usize = 128;
pub const TOP_DB: f32 = 80.0;
pub const AMIN: f32 = 1e-10;

// Constant-Q transform
pub const CQT_N_BINS: usize = 84;
pub const CQT_BINS_PER_OCTAVE: usize = 12;
pub const CQT_FMIN: f32 = 32.703_197; // C1
pub const CQT_SPARSITY: f32 = 0.0054;

// Drum band filters
pub const LOW_PASS_FLOOR_HZ: f32 = 20.0;
pub const HIGH_PASS_CEILING_HZ: f32 = 8000.0;
pub const BUTTERWORTH_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

// MIDI Conversion
pub const CQT_MIDI_OFFSET: u8 = 24;
pub const TICKS_PER_BEAT: u16 = 220;
pub const DEFAULT_TEMPO_BPM: f32 = 120.0;
pub const MAX_TEMPO_MICROS: u32 = 0xFF_FFFF; // 24-bit tempo field
pub const MELODIC_CHANNEL: u8 = 0;
pub const DRUM_CHANNEL: u8 = 9;
pub const KICK_PITCH: u8 = 36;
pub const SNARE_PITCH: u8 = 38;
pub const CLOSED_HI_HAT_PITCH: u8 = 42;
