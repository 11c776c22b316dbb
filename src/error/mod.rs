// Error types for the drill engine
//
// This module defines custom error types for device acquisition, drill
// configuration and shot classification, each carrying a stable numeric code
// so the UI layer can branch on failures without parsing messages.

mod classification;
mod config;
mod drill;

pub use classification::{log_classification_error, ClassificationError, ClassificationErrorCodes};
pub use config::{log_configuration_error, ConfigurationError, ConfigurationErrorCodes};
pub use drill::{log_drill_error, DrillError, DrillErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the UI boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
