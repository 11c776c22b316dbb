//! Configuration management for drill tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling fast iteration on cue timing, sensitivity and session pacing
//! without recompilation. It also holds the per-drill profile table and the
//! validated `DrillConfiguration` a session runs with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::audio::delay::WhistleDelay;
use crate::audio::tone::{CueClipPaths, ToneSpec};
use crate::calibration::{NormalizedRoi, RoiSizing};
use crate::error::ConfigurationError;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub drills: DrillProfiles,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

/// Drill variants sharing the one orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrillKind {
    FaceOff,
    Shooting,
}

impl fmt::Display for DrillKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrillKind::FaceOff => write!(f, "FaceOff"),
            DrillKind::Shooting => write!(f, "Shooting"),
        }
    }
}

/// What a rep measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrillMode {
    /// Whistle-to-motion latency
    Release,
    /// Impact zone 0-8
    Placement,
}

impl fmt::Display for DrillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrillMode::Release => write!(f, "Release"),
            DrillMode::Placement => write!(f, "Placement"),
        }
    }
}

/// One row of the per-drill table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillProfile {
    /// Countdown ticks before set (5 face-off, 3 shooting)
    pub countdown_ticks: u32,
    /// Spacing between ticks
    pub tick_interval_ms: u64,
    /// Pause between countdown end and the "set" call; None = no set call
    pub transition_delay_ms: Option<u64>,
    /// Default mean-luminance-difference threshold
    pub sensitivity_threshold: f32,
    /// Default region sizing
    pub roi_sizing: RoiSizing,
    /// Default whistle strategy
    pub whistle: WhistleDelay,
    /// Whether Placement mode is offered
    pub supports_placement: bool,
}

impl DrillProfile {
    pub fn face_off() -> Self {
        Self {
            countdown_ticks: 5,
            tick_interval_ms: 1000,
            transition_delay_ms: Some(750),
            sensitivity_threshold: 4.0,
            roi_sizing: RoiSizing::NearFull,
            whistle: WhistleDelay::face_off_default(),
            supports_placement: false,
        }
    }

    pub fn shooting() -> Self {
        Self {
            countdown_ticks: 3,
            tick_interval_ms: 1000,
            transition_delay_ms: None,
            sensitivity_threshold: 10.0,
            roi_sizing: RoiSizing::Boxed,
            whistle: WhistleDelay::shooting_default(),
            supports_placement: true,
        }
    }

    /// Reject rows that cannot produce a cue plan
    pub fn validate(&self, drill: DrillKind) -> Result<(), ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidProfile {
            drill: drill.to_string(),
            reason: reason.to_string(),
        };
        if self.countdown_ticks == 0 {
            return Err(invalid("countdown needs at least one tick"));
        }
        if self.tick_interval_ms == 0 {
            return Err(invalid("tick interval must be greater than 0 ms"));
        }
        if !self.sensitivity_threshold.is_finite() || self.sensitivity_threshold <= 0.0 {
            return Err(ConfigurationError::InvalidThreshold {
                value: self.sensitivity_threshold,
            });
        }
        self.whistle.validate()
    }
}

/// Per-drill configuration table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillProfiles {
    pub face_off: DrillProfile,
    pub shooting: DrillProfile,
}

impl DrillProfiles {
    pub fn get(&self, kind: DrillKind) -> &DrillProfile {
        match kind {
            DrillKind::FaceOff => &self.face_off,
            DrillKind::Shooting => &self.shooting,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.face_off.validate(DrillKind::FaceOff)?;
        self.shooting.validate(DrillKind::Shooting)
    }
}

impl Default for DrillProfiles {
    fn default() -> Self {
        Self {
            face_off: DrillProfile::face_off(),
            shooting: DrillProfile::shooting(),
        }
    }
}

/// Default timing parameters applied to new drill configurations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Pause before the first countdown tick
    pub pre_start_delay_ms: u64,
    /// Pause between a rep result and the next rep's start
    pub inter_rep_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            pre_start_delay_ms: 1000,
            inter_rep_delay_ms: 3000,
        }
    }
}

/// Session pacing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Timed sessions end at a rep result when this many seconds or fewer remain
    pub guard_band_secs: u32,
    /// Period of the timed-session clock
    pub clock_tick_ms: u64,
    /// Rep target used when an assignment's notes carry no count
    pub default_rep_target: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            guard_band_secs: 5,
            clock_tick_ms: 1000,
            default_rep_target: 10,
        }
    }
}

/// Cue audio configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    pub tick_tone: ToneSpec,
    pub set_tone: ToneSpec,
    pub whistle_tone: ToneSpec,
    /// Optional WAV overrides
    #[serde(default)]
    pub clips: CueClipPaths,
    /// Capacity of the playback ring buffer in seconds of audio
    pub ring_buffer_secs: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            tick_tone: ToneSpec::countdown_tick(),
            set_tone: ToneSpec::set_call(),
            whistle_tone: ToneSpec::whistle(),
            clips: CueClipPaths::default(),
            ring_buffer_secs: 4,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// Loaded configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => match config.drills.validate() {
                    Ok(()) => {
                        log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                        config
                    }
                    Err(err) => {
                        log::warn!(
                            "[Config] Rejected drill table in {:?}: {}. Using defaults.",
                            path.as_ref(),
                            err
                        );
                        Self::default()
                    }
                },
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/drill_config.json")
    }
}

/// Session target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionTarget {
    /// Complete after this many measurements
    Reps { count: u32 },
    /// Complete when the clock runs out
    Timed { secs: u32 },
}

impl SessionTarget {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            SessionTarget::Reps { count: 0 } => Err(ConfigurationError::NonPositiveRepCount),
            SessionTarget::Timed { secs: 0 } => Err(ConfigurationError::NonPositiveDuration),
            _ => Ok(()),
        }
    }

    pub fn rep_count(&self) -> Option<u32> {
        match self {
            SessionTarget::Reps { count } => Some(*count),
            SessionTarget::Timed { .. } => None,
        }
    }
}

/// Timing parameters of one drill configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrillTiming {
    pub pre_start_delay_ms: u64,
    pub whistle: WhistleDelay,
    pub inter_rep_delay_ms: u64,
}

/// Everything a session runs with; immutable while the session is Running
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillConfiguration {
    pub drill: DrillKind,
    pub mode: DrillMode,
    pub target: SessionTarget,
    pub sensitivity_threshold: f32,
    pub roi: NormalizedRoi,
    pub timing: DrillTiming,
    /// Toggle for the automatic placement classifier
    pub auto_classify: bool,
}

impl DrillConfiguration {
    /// Build from the drill table and timing defaults
    pub fn for_drill(
        config: &AppConfig,
        drill: DrillKind,
        mode: DrillMode,
        target: SessionTarget,
    ) -> Self {
        let profile = config.drills.get(drill);
        Self {
            drill,
            mode,
            target,
            sensitivity_threshold: profile.sensitivity_threshold,
            roi: profile.roi_sizing.default_region(),
            timing: DrillTiming {
                pre_start_delay_ms: config.timing.pre_start_delay_ms,
                whistle: profile.whistle.clone(),
                inter_rep_delay_ms: config.timing.inter_rep_delay_ms,
            },
            auto_classify: mode == DrillMode::Placement,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.sensitivity_threshold = threshold;
        self
    }

    pub fn with_roi(mut self, roi: NormalizedRoi) -> Self {
        self.roi = roi;
        self
    }

    pub fn with_whistle(mut self, whistle: WhistleDelay) -> Self {
        self.timing.whistle = whistle;
        self
    }

    pub fn with_pre_start_delay_ms(mut self, ms: u64) -> Self {
        self.timing.pre_start_delay_ms = ms;
        self
    }

    pub fn with_inter_rep_delay_ms(mut self, ms: u64) -> Self {
        self.timing.inter_rep_delay_ms = ms;
        self
    }

    pub fn with_auto_classify(mut self, enabled: bool) -> Self {
        self.auto_classify = enabled;
        self
    }

    /// Validate against the drill's profile
    pub fn validate(&self, profile: &DrillProfile) -> Result<(), ConfigurationError> {
        profile.validate(self.drill)?;
        self.target.validate()?;
        if !self.sensitivity_threshold.is_finite() || self.sensitivity_threshold <= 0.0 {
            return Err(ConfigurationError::InvalidThreshold {
                value: self.sensitivity_threshold,
            });
        }
        self.roi.validate()?;
        self.timing.whistle.validate()?;
        if self.mode == DrillMode::Placement && !profile.supports_placement {
            return Err(ConfigurationError::UnsupportedMode {
                drill: self.drill.to_string(),
                mode: self.mode.to_string(),
            });
        }
        Ok(())
    }
}
