//! Device abstractions consumed by the drill engine.
//!
//! The engine owns a camera (`VideoSource`), a cue speaker (`AudioOutput`),
//! an optional placement classifier and a clock (`TimeSource`). Desktop
//! builds get a cpal speaker; tests and the CLI use the deterministic stubs.

use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;

use crate::analysis::{Frame, ZoneClassifier};
use crate::audio::{CueClip, CueKind};
use crate::error::DrillError;

/// Camera consumed by the engine.
///
/// `acquire`/`release` bracket exclusive ownership for one session.
pub trait VideoSource: Send + Sync {
    /// Open the camera; fails with `DrillError::CameraUnavailable`
    fn acquire(&self) -> Result<(), DrillError>;
    fn release(&self);
    /// Metadata loaded and frames flowing
    fn is_ready(&self) -> bool;
    /// Native resolution, once known
    fn resolution(&self) -> Option<(u32, u32)>;
    /// Frame currently on screen, without waiting
    fn current_frame(&self) -> Option<Frame>;
    /// Wait for the next frame; None once the source has been released
    fn next_frame(&self) -> BoxFuture<'_, Option<Frame>>;
}

/// Cue speaker consumed by the engine.
pub trait AudioOutput: Send + Sync {
    /// Create the output device; fails with `DrillError::AudioDeviceUnavailable`
    fn open(&self) -> Result<(), DrillError>;
    /// Start playback of one clip; must not block
    fn play(&self, kind: CueKind, clip: &CueClip) -> Result<(), DrillError>;
    /// Resume a device suspended by the platform
    fn resume(&self) -> Result<(), DrillError>;
    fn close(&self);
}

/// Trait representing a monotonic time source used for measurements.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by the tokio clock, so paused-time tests
/// measure virtual time.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// Everything the engine needs from the outside world
#[derive(Clone)]
pub struct DrillDevices {
    pub video: Arc<dyn VideoSource>,
    pub audio: Arc<dyn AudioOutput>,
    pub classifier: Option<Arc<dyn ZoneClassifier>>,
    pub time_source: Arc<dyn TimeSource>,
}

impl DrillDevices {
    pub fn new(video: Arc<dyn VideoSource>, audio: Arc<dyn AudioOutput>) -> Self {
        Self {
            video,
            audio,
            classifier: None,
            time_source: Arc::new(SystemTimeSource::default()),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ZoneClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }
}

#[cfg(not(target_os = "android"))]
mod cpal;
#[cfg(not(target_os = "android"))]
pub use self::cpal::CpalAudioOutput;

mod desktop_stub;
pub use self::desktop_stub::{StubAudioOutput, StubVideoSource};
