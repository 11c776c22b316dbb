//! Engine module housing the drill orchestrator.
//!
//! This module exposes device abstractions (`backend`), the rep and session
//! state machines (`state`, `session`), external collaborators
//! (`collaborators`) and the `DrillEngine` orchestration layer (`core`).

pub mod backend;
pub mod collaborators;
pub mod core;
pub mod session;
pub mod state;

#[cfg(not(target_os = "android"))]
pub use backend::CpalAudioOutput;
pub use backend::{
    AudioOutput, DrillDevices, StubAudioOutput, StubVideoSource, SystemTimeSource, TimeSource,
    VideoSource,
};
pub use collaborators::{
    parse_target_reps, AssignmentCollaborator, AssignmentReport, InMemoryResultSink,
    RecordedAssignment, ResultSink,
};
pub use self::core::{DrillEngine, DrillSnapshot, TelemetryEvent, TelemetryEventKind};
pub use session::{
    CompletionReason, RepMeasurement, RepOutcome, SessionManager, SessionReport, SessionResult,
};
pub use state::{DrillState, SessionState};
