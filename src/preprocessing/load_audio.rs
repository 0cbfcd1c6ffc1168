use std::fs::File;
use std::path::Path;

use hound::{SampleFormat, WavReader};
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{ConvertError, Result};

/// Mono audio with its sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(ConvertError::Decode("sample rate must be positive".to_string()));
        }
        if samples.is_empty() {
            return Err(ConvertError::Decode("audio contains no samples".to_string()));
        }
        Ok(Self { samples, sample_rate })
    }

    /// Length in seconds.
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Average interleaved frames down to a single channel.
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn load_wav(path: &Path) -> Result<AudioBuffer> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let max_sample_value = (2.0_f64.powi(spec.bits_per_sample as i32 - 1) - 1.0) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_sample_value))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    AudioBuffer::new(downmix(&interleaved, channels), spec.sample_rate)
}

fn load_compressed(path: &Path) -> Result<AudioBuffer> {
    let file = File::open(path).map_err(|source| ConvertError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ConvertError::Decode("no audio tracks found".to_string()))?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| ConvertError::Decode("unknown sample rate".to_string()))?;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping undecodable packet: {}", msg);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend(downmix(sample_buf.samples(), channels));
    }

    AudioBuffer::new(samples, sample_rate)
}

/// Decode an audio file into a mono buffer at its native sample rate.
///
/// WAV files are read with `hound`; everything else (MP3, FLAC, OGG) goes
/// through `symphonia`'s format probe.
///
/// # Arguments
///
/// * `path` - Path to the audio file.
///
/// # Returns
///
/// * The decoded mono buffer, or a decode error when the file is missing,
///   corrupt, or empty.
pub fn load_audio<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConvertError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        });
    }

    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("wav"));

    let audio = if is_wav { load_wav(path)? } else { load_compressed(path)? };

    log::info!(
        "Decoded audio: {} samples, {}Hz, {:.2}s",
        audio.samples.len(),
        audio.sample_rate,
        audio.duration()
    );

    Ok(audio)
}

/// Resample a buffer with a windowed-sinc interpolator.
///
/// Returns the input unchanged when it is already at `target_sample_rate`.
pub fn resample(audio: &AudioBuffer, target_sample_rate: u32) -> Result<AudioBuffer> {
    if audio.sample_rate == target_sample_rate {
        return Ok(audio.clone());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let resample_ratio = target_sample_rate as f64 / audio.sample_rate as f64;
    let mut resampler = SincFixedIn::<f64>::new(resample_ratio, 2.0, params, audio.samples.len(), 1)
        .map_err(|e| ConvertError::Analysis(format!("cannot build resampler: {}", e)))?;

    let channel_data: Vec<Vec<f64>> = vec![audio.samples.iter().map(|&s| s as f64).collect()];
    let resampled = resampler
        .process(&channel_data, None)
        .map_err(|e| ConvertError::Analysis(format!("resampling failed: {}", e)))?;

    let expected_len = (audio.samples.len() as f64 * resample_ratio).round() as usize;
    let mut samples: Vec<f32> = resampled[0].iter().map(|&s| s as f32).collect();
    samples.resize(expected_len.max(1), 0.0);

    log::debug!(
        "Resampled {}Hz -> {}Hz ({} samples)",
        audio.sample_rate,
        target_sample_rate,
        samples.len()
    );

    AudioBuffer::new(samples, target_sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn write_wav(path: &Path, channels: u16, frames: &[Vec<i16>]) {
        let spec = WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for &s in frame {
                writer.write_sample(s).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn stereo_wav_is_downmixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, &[vec![32767, -32767], vec![32767, 32767]]);

        let audio = load_audio(&path).unwrap();
        assert_eq!(audio.sample_rate, 8000);
        assert_eq!(audio.samples.len(), 2);
        assert!(audio.samples[0].abs() < 1e-6);
        assert!((audio.samples[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_audio("/definitely/not/here.wav").unwrap_err();
        assert!(matches!(err, ConvertError::Io { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"this is not audio at all").unwrap();

        let err = load_audio(&path).unwrap_err();
        assert!(matches!(err, ConvertError::Decode(_)));
    }

    #[test]
    fn empty_wav_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav(&path, 1, &[]);

        assert!(matches!(load_audio(&path), Err(ConvertError::Decode(_))));
    }

    #[test]
    fn resampling_changes_length_by_ratio() {
        let audio = AudioBuffer::new(vec![0.25; 8000], 8000).unwrap();
        let resampled = resample(&audio, 16000).unwrap();
        assert_eq!(resampled.sample_rate, 16000);
        assert_eq!(resampled.samples.len(), 16000);

        let same = resample(&audio, 8000).unwrap();
        assert_eq!(same, audio);
    }
}
