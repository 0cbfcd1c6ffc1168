use clap::Parser;
use std::path::PathBuf;

use audio2midi::Mode;

#[derive(Parser, Debug)]
#[command(name = "convert", about = "Transcribe an audio file into a MIDI file")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Output MIDI file
    pub output: PathBuf,

    /// Transcription mode
    #[arg(short, long, value_enum)]
    pub mode: Mode,

    /// Initial tempo in beats per minute
    #[arg(long)]
    pub bpm: Option<f32>,

    /// TOML file overriding analysis thresholds
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log per-stage details
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}
