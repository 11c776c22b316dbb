//! Cue clips - synthesized tones and decoded WAV files.
//!
//! Key features:
//! - Deterministic sine synthesis with a linear attack/release envelope
//! - WAV decoding (16-bit int or 32-bit float) with mono down-mix
//! - Linear resampling to the output device rate
//! - `CueBank` mapping each cue kind to its clip

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audio::cues::CueKind;
use crate::config::AudioConfig;
use crate::error::DrillError;

/// Tone synthesis parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneSpec {
    pub frequency_hz: f32,
    pub duration_ms: u32,
    pub attack_ms: u32,
    pub release_ms: u32,
    /// Peak amplitude in [0.0, 1.0]
    pub amplitude: f32,
}

impl ToneSpec {
    pub fn countdown_tick() -> Self {
        Self {
            frequency_hz: 880.0,
            duration_ms: 120,
            attack_ms: 5,
            release_ms: 40,
            amplitude: 0.6,
        }
    }

    pub fn set_call() -> Self {
        Self {
            frequency_hz: 660.0,
            duration_ms: 250,
            attack_ms: 10,
            release_ms: 80,
            amplitude: 0.7,
        }
    }

    pub fn whistle() -> Self {
        Self {
            frequency_hz: 3150.0,
            duration_ms: 450,
            attack_ms: 3,
            release_ms: 60,
            amplitude: 0.9,
        }
    }

    /// Render the tone at the given sample rate
    ///
    /// # Returns
    /// Exactly `duration_ms` worth of samples in [-amplitude, amplitude]
    pub fn synthesize(&self, sample_rate: u32) -> Vec<f32> {
        let num_samples = (sample_rate as u64 * self.duration_ms as u64 / 1000) as usize;
        let attack = (sample_rate as u64 * self.attack_ms as u64 / 1000) as usize;
        let release = (sample_rate as u64 * self.release_ms as u64 / 1000) as usize;
        let amplitude = self.amplitude.clamp(0.0, 1.0);
        let step = 2.0 * std::f32::consts::PI * self.frequency_hz / sample_rate.max(1) as f32;

        (0..num_samples)
            .map(|i| {
                let envelope = if attack > 0 && i < attack {
                    i as f32 / attack as f32
                } else if release > 0 && i + release >= num_samples {
                    (num_samples - i) as f32 / release as f32
                } else {
                    1.0
                };
                (step * i as f32).sin() * amplitude * envelope.min(1.0)
            })
            .collect()
    }
}

/// Mono sample clip ready for playback
#[derive(Debug, Clone, PartialEq)]
pub struct CueClip {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl CueClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    pub fn from_tone(spec: &ToneSpec, sample_rate: u32) -> Self {
        Self::new(spec.synthesize(sample_rate), sample_rate)
    }

    /// Decode a WAV file and resample it to `target_rate`
    pub fn from_wav<P: AsRef<Path>>(path: P, target_rate: u32) -> Result<Self, DrillError> {
        let reader = hound::WavReader::open(path.as_ref()).map_err(|err| {
            DrillError::AudioDeviceUnavailable {
                reason: format!("decoding {:?}: {}", path.as_ref(), err),
            }
        })?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(wav_error)?,
            hound::SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(wav_error)?
            }
        };

        let mono: Vec<f32> = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Ok(Self::new(
            resample_linear(&mono, spec.sample_rate, target_rate),
            target_rate,
        ))
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_ms(&self) -> u64 {
        self.samples.len() as u64 * 1000 / self.sample_rate.max(1) as u64
    }
}

fn wav_error(err: hound::Error) -> DrillError {
    DrillError::AudioDeviceUnavailable {
        reason: format!("decoding cue clip: {}", err),
    }
}

/// Linear interpolation resampler; identity when rates match
pub fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() || from_rate == 0 || to_rate == 0 {
        return input.to_vec();
    }
    let out_len = (input.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    let ratio = from_rate as f64 / to_rate as f64;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = input[idx.min(input.len() - 1)];
            let b = input[(idx + 1).min(input.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}

/// Optional WAV overrides per cue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CueClipPaths {
    #[serde(default)]
    pub tick: Option<PathBuf>,
    #[serde(default)]
    pub set: Option<PathBuf>,
    #[serde(default)]
    pub whistle: Option<PathBuf>,
}

/// Clips for every cue kind
#[derive(Debug, Clone)]
pub struct CueBank {
    tick: CueClip,
    set: CueClip,
    whistle: CueClip,
}

impl CueBank {
    /// Build from configuration; a WAV path that fails to decode falls back
    /// to the synthesized tone.
    pub fn from_config(config: &AudioConfig) -> Self {
        let rate = config.sample_rate;
        let load = |path: &Option<PathBuf>, spec: &ToneSpec| match path {
            Some(path) => CueClip::from_wav(path, rate).unwrap_or_else(|err| {
                log::warn!("[CueBank] {}; using synthesized tone", err);
                CueClip::from_tone(spec, rate)
            }),
            None => CueClip::from_tone(spec, rate),
        };

        Self {
            tick: load(&config.clips.tick, &config.tick_tone),
            set: load(&config.clips.set, &config.set_tone),
            whistle: load(&config.clips.whistle, &config.whistle_tone),
        }
    }

    pub fn clip_for(&self, kind: &CueKind) -> &CueClip {
        match kind {
            CueKind::CountdownTick { .. } => &self.tick,
            CueKind::Set { .. } => &self.set,
            CueKind::Whistle => &self.whistle,
        }
    }
}
