//! Error types for audio-to-MIDI conversion.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop a conversion.
///
/// A conversion either writes a complete MIDI file or fails with one of
/// these; there is no partial output.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("cannot open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot decode audio: {0}")]
    Decode(String),

    #[error("unsupported mode '{0}' (expected mono, poly or drums)")]
    UnsupportedMode(String),

    #[error("invalid tempo {0} BPM (must be positive and fit a MIDI tempo event)")]
    InvalidTempo(f32),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("analysis failed: {0}")]
    Analysis(String),

    #[error("pitch model failed: {0}")]
    Model(String),

    #[error("cannot serialize MIDI: {0}")]
    Midi(String),

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConvertError {
    /// Process exit code for this error.
    ///
    /// * 1 - bad input (unreadable or undecodable audio, analysis failure)
    /// * 2 - bad arguments (mode, tempo, configuration)
    /// * 3 - output could not be produced
    pub fn exit_code(&self) -> u8 {
        match self {
            ConvertError::Io { .. }
            | ConvertError::Decode(_)
            | ConvertError::Analysis(_)
            | ConvertError::Model(_) => 1,
            ConvertError::UnsupportedMode(_)
            | ConvertError::InvalidTempo(_)
            | ConvertError::InvalidConfig(_) => 2,
            ConvertError::Midi(_) | ConvertError::Write { .. } => 3,
        }
    }
}

impl From<hound::Error> for ConvertError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => ConvertError::Decode(format!("WAV I/O error: {}", e)),
            other => ConvertError::Decode(format!("WAV error: {}", other)),
        }
    }
}

impl From<symphonia::core::errors::Error> for ConvertError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        ConvertError::Decode(err.to_string())
    }
}

impl From<toml::de::Error> for ConvertError {
    fn from(err: toml::de::Error) -> Self {
        ConvertError::InvalidConfig(err.to_string())
    }
}

#[cfg(feature = "onnx")]
impl From<ort::Error> for ConvertError {
    fn from(err: ort::Error) -> Self {
        ConvertError::Model(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConvertError>;
