// Audio module - cue planning, whistle delays, clip synthesis and timers

pub mod cues;
pub mod delay;
pub mod scheduler;
pub mod tone;

// Re-export commonly used types for convenience
pub use cues::{AudioCueEvent, CueKind, CuePlan};
pub use delay::{DelayDistribution, WhistleDelay, FACE_OFF_WHISTLE_CANDIDATES_MS};
pub use scheduler::{CueScheduler, TimerId};
pub use tone::{CueBank, CueClip, CueClipPaths, ToneSpec};
