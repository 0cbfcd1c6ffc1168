//! Frame-wise pitch estimation for mono mode.
//!
//! Audio is resampled to 16 kHz and cut into centred frames every 10 ms.
//! Each frame yields a frequency and a confidence in [0, 1]; unvoiced frames
//! report a frequency of zero.

use crate::config::{MonoConfig, PitchEstimatorKind};
use crate::constants::PITCH_SAMPLE_RATE;
use crate::error::Result;
use crate::postprocessing::helpers::ported::librosa::frames_to_time;
use crate::preprocessing::load_audio::{resample, AudioBuffer};
use crate::preprocessing::windowed_audio::{pad_center, window_audio_file};

/// Estimated pitch of one analysis frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchFrame {
    pub time: f32,
    /// Hz, or 0 when the frame is unvoiced.
    pub frequency: f32,
    pub confidence: f32,
}

pub trait PitchEstimator {
    fn name(&self) -> &'static str;

    /// Estimate one pitch frame per hop of `audio`.
    fn estimate(&mut self, audio: &AudioBuffer) -> Result<Vec<PitchFrame>>;
}

fn hop_samples(hop_seconds: f32, sample_rate: u32) -> usize {
    ((hop_seconds * sample_rate as f32).round() as usize).max(1)
}

/// YIN fundamental-frequency estimator.
pub struct Yin {
    frame_length: usize,
    hop_seconds: f32,
    min_frequency: f32,
    max_frequency: f32,
    threshold: f32,
}

impl Yin {
    pub fn new(config: &MonoConfig) -> Self {
        Self {
            frame_length: config.frame_length,
            hop_seconds: config.hop_seconds,
            min_frequency: config.min_frequency,
            max_frequency: config.max_frequency,
            threshold: config.yin_threshold,
        }
    }

    /// Estimate the pitch of one frame.
    ///
    /// # Arguments
    ///
    /// * `frame` - `frame_length` samples.
    /// * `sample_rate` - Sample rate of the frame.
    ///
    /// # Returns
    ///
    /// * `(frequency, confidence)`. `(0.0, 0.0)` when no lag dips below the
    ///   threshold.
    pub fn estimate_frame(&self, frame: &[f32], sample_rate: u32) -> (f32, f32) {
        let window = frame.len() / 2;
        let sr = sample_rate as f32;
        let tau_min = ((sr / self.max_frequency).floor() as usize).max(2);
        let tau_max = ((sr / self.min_frequency).ceil() as usize).min(window.saturating_sub(1));
        if tau_min + 1 >= tau_max {
            return (0.0, 0.0);
        }

        let energy: f32 = frame[..window].iter().map(|x| x * x).sum();
        if energy <= f32::EPSILON {
            return (0.0, 0.0);
        }

        let difference: Vec<f32> = (0..=tau_max)
            .map(|tau| {
                frame[..window]
                    .iter()
                    .zip(&frame[tau..tau + window])
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum()
            })
            .collect();

        // Cumulative mean normalised difference.
        let mut cmndf = vec![1.0f32; tau_max + 1];
        let mut running = 0.0;
        for tau in 1..=tau_max {
            running += difference[tau];
            cmndf[tau] = if running > 0.0 {
                difference[tau] * tau as f32 / running
            } else {
                1.0
            };
        }

        let mut tau = match (tau_min..tau_max).find(|&t| cmndf[t] < self.threshold) {
            Some(t) => t,
            None => return (0.0, 0.0),
        };
        while tau + 1 < tau_max && cmndf[tau + 1] < cmndf[tau] {
            tau += 1;
        }

        let (a, b, c) = (cmndf[tau - 1], cmndf[tau], cmndf[tau + 1]);
        let denominator = a - 2.0 * b + c;
        let shift = if denominator.abs() > f32::EPSILON {
            ((a - c) / (2.0 * denominator)).clamp(-1.0, 1.0)
        } else {
            0.0
        };

        let frequency = sr / (tau as f32 + shift);
        (frequency, (1.0 - b).clamp(0.0, 1.0))
    }
}

impl PitchEstimator for Yin {
    fn name(&self) -> &'static str {
        "yin"
    }

    fn estimate(&mut self, audio: &AudioBuffer) -> Result<Vec<PitchFrame>> {
        let hop = hop_samples(self.hop_seconds, audio.sample_rate);
        let padded = pad_center(&audio.samples, self.frame_length);

        Ok(window_audio_file(&padded, self.frame_length, hop)
            .enumerate()
            .map(|(i, frame)| {
                let (frequency, confidence) = self.estimate_frame(frame, audio.sample_rate);
                PitchFrame {
                    time: frames_to_time(i, audio.sample_rate, hop),
                    frequency,
                    confidence,
                }
            })
            .collect())
    }
}

#[cfg(feature = "onnx")]
pub use crepe::Crepe;

#[cfg(feature = "onnx")]
mod crepe {
    use std::path::{Path, PathBuf};

    use ndarray::Ix2;
    use ort::{GraphOptimizationLevel, Session, Tensor};

    use super::{hop_samples, PitchEstimator, PitchFrame};
    use crate::constants::{CREPE_N_BINS, PITCH_FRAME_LENGTH};
    use crate::error::{ConvertError, Result};
    use crate::postprocessing::helpers::helpers::{cents_to_frequency, local_average_cents, viterbi_decode};
    use crate::postprocessing::helpers::ported::librosa::frames_to_time;
    use crate::postprocessing::helpers::ported::numpy::{arg_max, max_value};
    use crate::preprocessing::load_audio::AudioBuffer;
    use crate::preprocessing::windowed_audio::{pad_center, window_audio_file};

    const BATCH_SIZE: usize = 512;

    /// CREPE pitch-salience network run through ONNX Runtime.
    pub struct Crepe {
        model_path: PathBuf,
        hop_seconds: f32,
        viterbi: bool,
        session: Option<Session>,
    }

    impl Crepe {
        pub fn new<P: AsRef<Path>>(model_path: P, hop_seconds: f32, viterbi: bool) -> Self {
            Self {
                model_path: model_path.as_ref().to_path_buf(),
                hop_seconds,
                viterbi,
                session: None,
            }
        }

        fn session(&mut self) -> Result<&Session> {
            if self.session.is_none() {
                if !self.model_path.exists() {
                    return Err(ConvertError::Model(format!(
                        "model not found at {}",
                        self.model_path.display()
                    )));
                }
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .with_intra_threads(4)?
                    .commit_from_file(&self.model_path)?;
                self.session = Some(session);
            }
            self.session
                .as_ref()
                .ok_or_else(|| ConvertError::Model("session unavailable".to_string()))
        }

        /// Zero-mean, unit-variance frames, as the network was trained on.
        fn normalized_frames(audio: &AudioBuffer, hop: usize) -> Vec<f32> {
            let padded = pad_center(&audio.samples, PITCH_FRAME_LENGTH);
            let mut data = Vec::new();
            for frame in window_audio_file(&padded, PITCH_FRAME_LENGTH, hop) {
                let mean = frame.iter().sum::<f32>() / frame.len() as f32;
                let variance = frame.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / frame.len() as f32;
                let std = variance.sqrt().max(1e-8);
                data.extend(frame.iter().map(|x| (x - mean) / std));
            }
            data
        }

        fn salience(&mut self, frames: Vec<f32>) -> Result<Vec<Vec<f32>>> {
            let session = self.session()?;
            let mut salience = Vec::with_capacity(frames.len() / PITCH_FRAME_LENGTH);

            for batch in frames.chunks(BATCH_SIZE * PITCH_FRAME_LENGTH) {
                let n = batch.len() / PITCH_FRAME_LENGTH;
                let input_shape = vec![n as i64, PITCH_FRAME_LENGTH as i64];
                let input_tensor = Tensor::from_array((input_shape, batch.to_vec()))?;
                let outputs = session.run(ort::inputs![input_tensor]?)?;

                let (_, value) = outputs
                    .iter()
                    .next()
                    .ok_or_else(|| ConvertError::Model("model produced no output".to_string()))?;
                let activations = value
                    .try_extract_tensor::<f32>()?
                    .into_dimensionality::<Ix2>()
                    .map_err(|e| ConvertError::Model(e.to_string()))?;
                if activations.ncols() != CREPE_N_BINS {
                    return Err(ConvertError::Model(format!(
                        "expected {} pitch bins, got {}",
                        CREPE_N_BINS,
                        activations.ncols()
                    )));
                }
                salience.extend(activations.outer_iter().map(|row| row.to_vec()));
            }

            Ok(salience)
        }
    }

    impl PitchEstimator for Crepe {
        fn name(&self) -> &'static str {
            "crepe"
        }

        fn estimate(&mut self, audio: &AudioBuffer) -> Result<Vec<PitchFrame>> {
            let hop = hop_samples(self.hop_seconds, audio.sample_rate);
            let salience = self.salience(Self::normalized_frames(audio, hop))?;

            let path: Vec<usize> = if self.viterbi {
                viterbi_decode(&salience)
            } else {
                salience.iter().map(|row| arg_max(row).unwrap_or(0)).collect()
            };

            Ok(salience
                .iter()
                .zip(path)
                .enumerate()
                .map(|(i, (row, bin))| PitchFrame {
                    time: frames_to_time(i, audio.sample_rate, hop),
                    frequency: cents_to_frequency(local_average_cents(row, bin)),
                    confidence: max_value(row),
                })
                .collect())
        }
    }
}

/// Build the estimator selected in the configuration.
pub fn pitch_estimator(config: &MonoConfig) -> Result<Box<dyn PitchEstimator>> {
    match config.pitch_estimator {
        PitchEstimatorKind::Yin => Ok(Box::new(Yin::new(config))),
        #[cfg(feature = "onnx")]
        PitchEstimatorKind::Crepe => Ok(Box::new(Crepe::new(
            &config.model_path,
            config.hop_seconds,
            config.viterbi,
        ))),
        #[cfg(not(feature = "onnx"))]
        PitchEstimatorKind::Crepe => Err(crate::error::ConvertError::InvalidConfig(
            "the crepe estimator needs the 'onnx' feature".to_string(),
        )),
    }
}

/// Pitch curve of an audio buffer.
///
/// # Arguments
///
/// * `audio` - Mono input at any sample rate.
/// * `config` - Estimator choice and framing.
///
/// # Returns
///
/// * One [`PitchFrame`] per 10 ms hop (by default), in time order.
pub fn run_inference(audio: &AudioBuffer, config: &MonoConfig) -> Result<Vec<PitchFrame>> {
    let audio = resample(audio, PITCH_SAMPLE_RATE)?;
    let mut estimator = pitch_estimator(config)?;

    let frames = estimator.estimate(&audio)?;
    let voiced = frames.iter().filter(|f| f.frequency > 0.0).count();
    log::info!(
        "{} estimated {} frames ({} voiced)",
        estimator.name(),
        frames.len(),
        voiced
    );

    Ok(frames)
}
