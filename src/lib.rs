//! Offline audio-to-MIDI transcription.
//!
//! Three policies turn a decoded signal into notes: `mono` follows a pitch
//! curve, `poly` peak-picks a constant-Q spectrogram at onsets, and `drums`
//! detects onsets in kick, snare and hi-hat bands. The result is written as a
//! single-track Standard MIDI File.

pub mod config;
pub mod constants;
pub mod convert;
pub mod error;
pub mod inference;
pub mod preprocessing {
    pub mod cqt;
    pub mod filters;
    pub mod hpss;
    pub mod load_audio;
    pub mod onset;
    pub mod stft;
    pub mod windowed_audio;
}
pub mod postprocessing {
    pub mod helpers {
        pub mod ported {
            pub mod librosa;
            pub mod numpy;
        }
        pub mod helpers;
    }
    pub mod drums;
    pub mod midi;
    pub mod mono;
    pub mod note_events;
    pub mod poly;
}

pub use config::{load_config, Config};
pub use convert::{convert, transcribe, ConversionRequest, ConversionSummary, Mode};
pub use error::{ConvertError, Result};
pub use postprocessing::note_events::NoteEvent;
pub use preprocessing::load_audio::{load_audio, AudioBuffer};
