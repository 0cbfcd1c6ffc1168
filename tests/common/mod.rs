//! Synthetic signals and MIDI inspection shared by the integration tests.

#![allow(dead_code)]

use std::f32::consts::PI;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use midly::{MetaMessage, MidiMessage, Smf, TrackEventKind};

pub fn sine(freq: f32, amplitude: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
    (0..(sample_rate as f32 * seconds) as usize)
        .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// A sine burst with 10 ms raised-cosine fades, placed at `at` seconds in
/// an otherwise silent signal.
pub fn burst(freq: f32, at: f32, length: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
    let sr = sample_rate as f32;
    let mut audio = vec![0.0; (sr * seconds) as usize];
    let start = (at * sr) as usize;
    let n = (length * sr) as usize;
    let fade = (0.01 * sr) as usize;
    for i in 0..n {
        let ramp = if i < fade {
            0.5 - 0.5 * (PI * i as f32 / fade as f32).cos()
        } else if i >= n - fade {
            0.5 - 0.5 * (PI * (n - i) as f32 / fade as f32).cos()
        } else {
            1.0
        };
        audio[start + i] = 0.8 * ramp * (2.0 * PI * freq * i as f32 / sr).sin();
    }
    audio
}

pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// Microseconds per quarter note of the first tempo event, if any.
pub fn tempo(data: &[u8]) -> Option<u32> {
    let smf = Smf::parse(data).unwrap();
    smf.tracks[0].iter().find_map(|event| match event.kind {
        TrackEventKind::Meta(MetaMessage::Tempo(t)) => Some(t.as_int()),
        _ => None,
    })
}

/// `(channel, key)` of every note-on in the first track.
pub fn note_ons(data: &[u8]) -> Vec<(u8, u8)> {
    let smf = Smf::parse(data).unwrap();
    assert_eq!(smf.tracks.len(), 1);
    smf.tracks[0]
        .iter()
        .filter_map(|event| match event.kind {
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn { key, .. },
            } => Some((channel.as_int(), key.as_int())),
            _ => None,
        })
        .collect()
}
