// Face-off Trainer Core - Rust Drill Engine
// Reaction timing and shot placement with camera-based motion detection

// Module declarations
pub mod analysis;
pub mod audio;
pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;
pub mod managers;

// Re-exports for convenience
pub use config::{AppConfig, DrillConfiguration, DrillKind, DrillMode, SessionTarget};
pub use engine::{DrillDevices, DrillEngine, DrillSnapshot, DrillState, SessionState};
pub use error::{ClassificationError, ConfigurationError, DrillError, ErrorCode};

/// Install a stderr subscriber so `log` records from the engine are visible.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(std::io::stderr)
        .try_init();
}
