mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use audio2midi::{convert, load_config, Config, ConversionRequest, ConversionSummary, ConvertError};
use cli::Cli;

const LOCAL_CONFIG: &str = "audio2midi.toml";

fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    // Explicit --config path, or auto-detect audio2midi.toml in the working directory
    let path = explicit.map(Path::to_path_buf).or_else(|| {
        let local = PathBuf::from(LOCAL_CONFIG);
        local.exists().then_some(local)
    });

    match path {
        Some(path) => {
            let config = load_config(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            log::info!("Loaded config from {}", path.display());
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

fn run(cli: &Cli) -> Result<ConversionSummary> {
    let config = resolve_config(cli.config.as_deref())?;
    let request = ConversionRequest::new(cli.mode, cli.bpm)?;

    log::info!("Input: {}", cli.input.display());
    log::info!("Output: {}", cli.output.display());
    log::info!("Mode: {}", request.mode);
    if let Some(bpm) = request.tempo_bpm {
        log::info!("Tempo: {} BPM", bpm);
    }

    let summary = convert(&cli.input, &cli.output, &request, &config)?;
    Ok(summary)
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<ConvertError>().map_or(1, ConvertError::exit_code)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .format_timestamp_millis()
        .init();

    match run(&cli) {
        Ok(summary) => {
            log::info!(
                "Done: {} notes from {:.2}s of audio ({} mode)",
                summary.notes,
                summary.duration_seconds,
                summary.mode
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}
