//! Runs the `convert` binary and checks its output file and exit codes.

mod common;

use std::fs;
use std::process::Command;

use common::{note_ons, sine, tempo, write_wav};

fn convert_bin() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_convert"));
    command.env("RUST_LOG", "warn");
    command
}

#[test]
fn mono_with_bpm_writes_tempo_meta() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.wav");
    let output = dir.path().join("out.mid");
    write_wav(&input, &sine(440.0, 0.5, 16000, 1.0), 16000);

    let status = convert_bin()
        .arg(&input)
        .arg(&output)
        .args(["--mode", "mono", "--bpm", "120"])
        .status()
        .unwrap();

    assert!(status.success());
    let data = fs::read(&output).unwrap();
    assert_eq!(tempo(&data), Some(500_000));
    assert_eq!(note_ons(&data), vec![(0, 69)]);
}

#[test]
fn missing_input_exits_with_one() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.mid");

    let result = convert_bin()
        .arg(dir.path().join("missing.wav"))
        .arg(&output)
        .args(["--mode", "poly"])
        .output()
        .unwrap();

    assert_eq!(result.status.code(), Some(1));
    assert!(!result.stderr.is_empty());
    assert!(!output.exists());
}

#[test]
fn unknown_mode_exits_with_two() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.wav");
    write_wav(&input, &vec![0.0; 1600], 16000);

    let status = convert_bin()
        .arg(&input)
        .arg(dir.path().join("out.mid"))
        .args(["--mode", "bass"])
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(2));
}

#[test]
fn non_positive_bpm_exits_with_two() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.wav");
    write_wav(&input, &vec![0.0; 1600], 16000);

    let status = convert_bin()
        .arg(&input)
        .arg(dir.path().join("out.mid"))
        .args(["--mode", "mono", "--bpm=-5"])
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(2));
}

#[test]
fn bpm_too_slow_for_a_tempo_event_exits_with_two() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.wav");
    let output = dir.path().join("out.mid");
    write_wav(&input, &vec![0.0; 1600], 16000);

    let status = convert_bin()
        .arg(&input)
        .arg(&output)
        .args(["--mode", "drums", "--bpm", "2"])
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(2));
    assert!(!output.exists());
}

#[test]
fn config_file_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.wav");
    let output = dir.path().join("out.mid");
    let config = dir.path().join("settings.toml");
    write_wav(&input, &sine(440.0, 0.5, 16000, 0.5), 16000);
    fs::write(&config, "[midi]\nticks_per_beat = 480\n").unwrap();

    let status = convert_bin()
        .arg(&input)
        .arg(&output)
        .args(["--mode", "mono", "--config"])
        .arg(&config)
        .status()
        .unwrap();

    assert!(status.success());
    let timing = midly::Smf::parse(&fs::read(&output).unwrap()).unwrap().header.timing;
    assert_eq!(timing, midly::Timing::Metrical(midly::num::u15::new(480)));
}

#[test]
fn invalid_config_exits_with_two() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.wav");
    let config = dir.path().join("settings.toml");
    write_wav(&input, &vec![0.0; 1600], 16000);
    fs::write(&config, "[mono]\nconfidence_threshold = 3.0\n").unwrap();

    let status = convert_bin()
        .arg(&input)
        .arg(dir.path().join("out.mid"))
        .args(["--mode", "mono", "--config"])
        .arg(&config)
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(2));
}
