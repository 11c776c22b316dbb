// Configuration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Configuration error code constants
///
/// Error code range: 4001-4008
pub struct ConfigurationErrorCodes {}

impl ConfigurationErrorCodes {
    /// Fixed-count target must be at least one rep
    pub const NON_POSITIVE_REP_COUNT: i32 = 4001;

    /// Timed target must be at least one second
    pub const NON_POSITIVE_DURATION: i32 = 4002;

    /// ROI is empty or does not fit the frame
    pub const INVALID_ROI: i32 = 4003;

    /// Sensitivity threshold must be a positive finite number
    pub const INVALID_THRESHOLD: i32 = 4004;

    /// Whistle delay parameters are unusable
    pub const INVALID_WHISTLE_DELAY: i32 = 4005;

    /// Drill kind does not support the requested mode
    pub const UNSUPPORTED_MODE: i32 = 4006;

    /// Configuration cannot change while a session is running
    pub const LOCKED_WHILE_RUNNING: i32 = 4007;

    /// Drill profile table row is unusable
    pub const INVALID_PROFILE: i32 = 4008;
}

/// Log a configuration error with structured context
pub fn log_configuration_error(err: &ConfigurationError, context: &str) {
    error!(
        "Configuration error in {}: code={}, component=SessionManager, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Configuration errors raised at Setup.
///
/// A rejected configuration leaves the session in Setup.
///
/// Error code range: 4001-4008
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Rep count of zero
    NonPositiveRepCount,

    /// Duration of zero seconds
    NonPositiveDuration,

    /// ROI unusable
    InvalidRoi { reason: String },

    /// Threshold not positive/finite
    InvalidThreshold { value: f32 },

    /// Whistle delay parameters unusable
    InvalidWhistleDelay { reason: String },

    /// Mode not available for the drill kind
    UnsupportedMode { drill: String, mode: String },

    /// Session is Running
    LockedWhileRunning,

    /// Drill profile row unusable (zero ticks, zero tick spacing)
    InvalidProfile { drill: String, reason: String },
}

impl ErrorCode for ConfigurationError {
    fn code(&self) -> i32 {
        match self {
            ConfigurationError::NonPositiveRepCount => {
                ConfigurationErrorCodes::NON_POSITIVE_REP_COUNT
            }
            ConfigurationError::NonPositiveDuration => {
                ConfigurationErrorCodes::NON_POSITIVE_DURATION
            }
            ConfigurationError::InvalidRoi { .. } => ConfigurationErrorCodes::INVALID_ROI,
            ConfigurationError::InvalidThreshold { .. } => {
                ConfigurationErrorCodes::INVALID_THRESHOLD
            }
            ConfigurationError::InvalidWhistleDelay { .. } => {
                ConfigurationErrorCodes::INVALID_WHISTLE_DELAY
            }
            ConfigurationError::UnsupportedMode { .. } => ConfigurationErrorCodes::UNSUPPORTED_MODE,
            ConfigurationError::LockedWhileRunning => {
                ConfigurationErrorCodes::LOCKED_WHILE_RUNNING
            }
            ConfigurationError::InvalidProfile { .. } => ConfigurationErrorCodes::INVALID_PROFILE,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigurationError::NonPositiveRepCount => {
                "Rep count must be greater than 0".to_string()
            }
            ConfigurationError::NonPositiveDuration => {
                "Session duration must be greater than 0 seconds".to_string()
            }
            ConfigurationError::InvalidRoi { reason } => format!("Invalid region: {}", reason),
            ConfigurationError::InvalidThreshold { value } => {
                format!("Sensitivity threshold must be positive (got {})", value)
            }
            ConfigurationError::InvalidWhistleDelay { reason } => {
                format!("Invalid whistle delay: {}", reason)
            }
            ConfigurationError::UnsupportedMode { drill, mode } => {
                format!("{} drill does not support {} mode", drill, mode)
            }
            ConfigurationError::LockedWhileRunning => {
                "Configuration is locked while a session is running. Reset first.".to_string()
            }
            ConfigurationError::InvalidProfile { drill, reason } => {
                format!("Invalid {} drill profile: {}", drill, reason)
            }
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigurationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ConfigurationError {}
