// Drill runtime error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Drill error code constants
///
/// Single source of truth for the codes surfaced to the UI layer.
///
/// Error code range: 3001-3009
pub struct DrillErrorCodes {}

impl DrillErrorCodes {
    /// Camera could not be opened (permission denied, busy, missing)
    pub const CAMERA_UNAVAILABLE: i32 = 3001;

    /// Audio output device could not be created
    pub const AUDIO_DEVICE_UNAVAILABLE: i32 = 3002;

    /// Video source has no metadata/readiness when arming was requested
    pub const VIDEO_NOT_READY: i32 = 3003;

    /// Command is not valid in the current drill state
    pub const INVALID_TRANSITION: i32 = 3004;

    /// A drill session is already running
    pub const ALREADY_RUNNING: i32 = 3005;

    /// No drill session is running
    pub const NOT_RUNNING: i32 = 3006;

    /// Cue callbacks from a previous sequence are still pending
    pub const CUES_PENDING: i32 = 3007;

    /// Zone index outside the 3x3 grid or tap outside the ROI
    pub const INVALID_ZONE: i32 = 3008;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 3009;
}

/// Log a drill error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_drill_error(err: &DrillError, context: &str) {
    error!(
        "Drill error in {}: code={}, component=DrillEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Drill runtime errors
///
/// `CameraUnavailable` and `AudioDeviceUnavailable` are acquisition failures
/// and, together with `VideoNotReady`, are fatal for the running session.
///
/// Error code range: 3001-3009
#[derive(Debug, Clone, PartialEq)]
pub enum DrillError {
    /// Camera could not be acquired
    CameraUnavailable { reason: String },

    /// Audio output device could not be created
    AudioDeviceUnavailable { reason: String },

    /// Video source not ready when the detector was armed
    VideoNotReady,

    /// Command rejected in the current state
    InvalidTransition { from: String, command: String },

    /// Session already running
    AlreadyRunning,

    /// No session running
    NotRunning,

    /// Previous cue sequence still has live callbacks
    CuesPending { pending: usize },

    /// Zone outside 0..=8 or tap outside the ROI
    InvalidZone { details: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },
}

impl DrillError {
    /// Device acquisition failures (camera or audio output)
    pub fn is_acquisition(&self) -> bool {
        matches!(
            self,
            DrillError::CameraUnavailable { .. } | DrillError::AudioDeviceUnavailable { .. }
        )
    }

    /// Errors that move the drill into its terminal Error state
    pub fn is_fatal(&self) -> bool {
        self.is_acquisition() || matches!(self, DrillError::VideoNotReady)
    }
}

impl ErrorCode for DrillError {
    fn code(&self) -> i32 {
        match self {
            DrillError::CameraUnavailable { .. } => DrillErrorCodes::CAMERA_UNAVAILABLE,
            DrillError::AudioDeviceUnavailable { .. } => DrillErrorCodes::AUDIO_DEVICE_UNAVAILABLE,
            DrillError::VideoNotReady => DrillErrorCodes::VIDEO_NOT_READY,
            DrillError::InvalidTransition { .. } => DrillErrorCodes::INVALID_TRANSITION,
            DrillError::AlreadyRunning => DrillErrorCodes::ALREADY_RUNNING,
            DrillError::NotRunning => DrillErrorCodes::NOT_RUNNING,
            DrillError::CuesPending { .. } => DrillErrorCodes::CUES_PENDING,
            DrillError::InvalidZone { .. } => DrillErrorCodes::INVALID_ZONE,
            DrillError::LockPoisoned { .. } => DrillErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            DrillError::CameraUnavailable { reason } => {
                format!("Camera unavailable: {}", reason)
            }
            DrillError::AudioDeviceUnavailable { reason } => {
                format!("Audio output unavailable: {}", reason)
            }
            DrillError::VideoNotReady => {
                "Video source not ready. Wait for the camera preview before starting.".to_string()
            }
            DrillError::InvalidTransition { from, command } => {
                format!("Cannot {} while drill is {}", command, from)
            }
            DrillError::AlreadyRunning => {
                "Drill already running. Call abort() first.".to_string()
            }
            DrillError::NotRunning => "Drill not running. Call start() first.".to_string(),
            DrillError::CuesPending { pending } => {
                format!("{} cue callbacks still pending from previous sequence", pending)
            }
            DrillError::InvalidZone { details } => format!("Invalid zone: {}", details),
            DrillError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
        }
    }
}

impl fmt::Display for DrillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DrillError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for DrillError {}

impl From<std::io::Error> for DrillError {
    fn from(err: std::io::Error) -> Self {
        DrillError::AudioDeviceUnavailable {
            reason: err.to_string(),
        }
    }
}
