// Classification error types and constants
//
// These never end a session: every variant downgrades to manual zone logging.

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Classification error code constants
///
/// Error code range: 5001-5004
pub struct ClassificationErrorCodes {}

impl ClassificationErrorCodes {
    /// No classification collaborator configured or toggle disabled
    pub const UNAVAILABLE: i32 = 5001;

    /// Collaborator answered with the "unknown" sentinel
    pub const UNKNOWN: i32 = 5002;

    /// Collaborator answered with a zone outside 0..=8
    pub const OUT_OF_RANGE: i32 = 5003;

    /// Collaborator failed (network, encoding, malformed reply)
    pub const SERVICE_FAILURE: i32 = 5004;
}

/// Log a classification error at warn level; these are recovered locally.
pub fn log_classification_error(err: &ClassificationError, context: &str) {
    warn!(
        "Classification fallback in {}: code={}, component=PlacementClassifier, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Shot placement classification errors
///
/// Error code range: 5001-5004
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationError {
    /// Automatic path disabled or missing
    Unavailable,

    /// Sentinel "unknown" response
    Unknown,

    /// Zone outside the grid
    OutOfRange { zone: i64 },

    /// Service failure
    ServiceFailure { reason: String },
}

impl ErrorCode for ClassificationError {
    fn code(&self) -> i32 {
        match self {
            ClassificationError::Unavailable => ClassificationErrorCodes::UNAVAILABLE,
            ClassificationError::Unknown => ClassificationErrorCodes::UNKNOWN,
            ClassificationError::OutOfRange { .. } => ClassificationErrorCodes::OUT_OF_RANGE,
            ClassificationError::ServiceFailure { .. } => ClassificationErrorCodes::SERVICE_FAILURE,
        }
    }

    fn message(&self) -> String {
        match self {
            ClassificationError::Unavailable => {
                "Automatic placement unavailable; log the zone manually".to_string()
            }
            ClassificationError::Unknown => {
                "Could not tell where the shot landed; log the zone manually".to_string()
            }
            ClassificationError::OutOfRange { zone } => {
                format!("Classifier returned zone {} outside 0-8", zone)
            }
            ClassificationError::ServiceFailure { reason } => {
                format!("Classification service failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for ClassificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClassificationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ClassificationError {}

impl From<image::ImageError> for ClassificationError {
    fn from(err: image::ImageError) -> Self {
        ClassificationError::ServiceFailure {
            reason: format!("encoding impact frame: {}", err),
        }
    }
}
