//! Session manager: fixed-count and timed sessions over many reps.
//!
//! Owns the append-only measurement list. Measurements survive abort and
//! completion; only `new_session()` clears them.

use serde::{Deserialize, Serialize};

use crate::analysis::{ZoneIndex, ZONE_COUNT};
use crate::config::{DrillKind, DrillMode, SessionTarget};
use crate::engine::state::SessionState;
use crate::error::{ConfigurationError, DrillError};

/// One rep's outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepMeasurement {
    Latency { ms: u64 },
    Zone { zone: ZoneIndex },
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    TargetReached,
    TimeExpired,
    /// Too little time left for another rep
    GuardBand,
}

/// What the engine should do after a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepOutcome {
    Continue,
    Complete(CompletionReason),
}

/// Aggregate over a session's measurements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionResult {
    Release {
        count: u32,
        best_ms: u64,
        worst_ms: u64,
        average_ms: u64,
    },
    Placement {
        count: u32,
        zones: [u32; ZONE_COUNT],
    },
}

impl SessionResult {
    /// Aggregate the measurements matching `mode`; None when there are none
    pub fn from_measurements(mode: DrillMode, measurements: &[RepMeasurement]) -> Option<Self> {
        match mode {
            DrillMode::Release => {
                let latencies: Vec<u64> = measurements
                    .iter()
                    .filter_map(|m| match m {
                        RepMeasurement::Latency { ms } => Some(*ms),
                        RepMeasurement::Zone { .. } => None,
                    })
                    .collect();
                let best_ms = *latencies.iter().min()?;
                let worst_ms = *latencies.iter().max()?;
                let total: u64 = latencies.iter().sum();
                let average_ms = (total as f64 / latencies.len() as f64).round() as u64;
                Some(SessionResult::Release {
                    count: latencies.len() as u32,
                    best_ms,
                    worst_ms,
                    average_ms,
                })
            }
            DrillMode::Placement => {
                let mut zones = [0u32; ZONE_COUNT];
                let mut count = 0;
                for m in measurements {
                    if let RepMeasurement::Zone { zone } = m {
                        zones[zone.index()] += 1;
                        count += 1;
                    }
                }
                (count > 0).then_some(SessionResult::Placement { count, zones })
            }
        }
    }

    pub fn count(&self) -> u32 {
        match self {
            SessionResult::Release { count, .. } | SessionResult::Placement { count, .. } => *count,
        }
    }
}

/// Final payload handed to the persistence collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub drill: DrillKind,
    pub mode: DrillMode,
    pub target: SessionTarget,
    pub completion: CompletionReason,
    pub result: Option<SessionResult>,
    pub measurements: Vec<RepMeasurement>,
}

/// Fixed-count / timed session bookkeeping
#[derive(Debug, Clone)]
pub struct SessionManager {
    state: SessionState,
    target: SessionTarget,
    guard_band_secs: u32,
    remaining_secs: Option<u32>,
    measurements: Vec<RepMeasurement>,
    completion: Option<CompletionReason>,
}

impl SessionManager {
    pub fn new(target: SessionTarget, guard_band_secs: u32) -> Self {
        Self {
            state: SessionState::Setup,
            target,
            guard_band_secs,
            remaining_secs: None,
            measurements: Vec::new(),
            completion: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn target(&self) -> SessionTarget {
        self.target
    }

    pub fn measurements(&self) -> &[RepMeasurement] {
        &self.measurements
    }

    pub fn remaining_secs(&self) -> Option<u32> {
        self.remaining_secs
    }

    pub fn completion(&self) -> Option<CompletionReason> {
        self.completion
    }

    /// Replace the target; rejected while Running
    pub fn configure(&mut self, target: SessionTarget) -> Result<(), ConfigurationError> {
        if !self.state.is_editable() {
            return Err(ConfigurationError::LockedWhileRunning);
        }
        target.validate()?;
        self.target = target;
        Ok(())
    }

    pub fn begin_calibration(&mut self) -> Result<(), DrillError> {
        self.transition(SessionState::Calibration, "calibrate")
    }

    pub fn end_calibration(&mut self) -> Result<(), DrillError> {
        if self.state != SessionState::Calibration {
            return Err(self.invalid("finish calibration"));
        }
        self.state = SessionState::Setup;
        Ok(())
    }

    /// Enter Running; a Finished session needs `new_session()` first
    pub fn begin(&mut self) -> Result<(), DrillError> {
        if let Some(count) = self.target.rep_count() {
            if self.measurements.len() >= count as usize {
                return Err(self.invalid("start with target already reached"));
            }
        }
        self.transition(SessionState::Running, "start")?;
        self.remaining_secs = match self.target {
            SessionTarget::Timed { secs } => Some(secs),
            SessionTarget::Reps { .. } => None,
        };
        self.completion = None;
        Ok(())
    }

    /// Advance the timed-session clock by one second
    ///
    /// # Returns
    /// `Some(TimeExpired)` when the clock reaches zero; the session is then Finished.
    pub fn tick_second(&mut self) -> Option<CompletionReason> {
        if self.state != SessionState::Running {
            return None;
        }
        let remaining = self.remaining_secs.as_mut()?;
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.finish(CompletionReason::TimeExpired);
            return Some(CompletionReason::TimeExpired);
        }
        None
    }

    /// Append one measurement and evaluate the completion rules
    pub fn record(&mut self, measurement: RepMeasurement) -> Result<RepOutcome, DrillError> {
        if self.state != SessionState::Running {
            return Err(DrillError::NotRunning);
        }
        self.measurements.push(measurement);

        let reason = match (self.target, self.remaining_secs) {
            (SessionTarget::Reps { count }, _) if self.measurements.len() >= count as usize => {
                Some(CompletionReason::TargetReached)
            }
            (SessionTarget::Timed { .. }, Some(0)) => Some(CompletionReason::TimeExpired),
            (SessionTarget::Timed { .. }, Some(remaining)) if remaining <= self.guard_band_secs => {
                Some(CompletionReason::GuardBand)
            }
            _ => None,
        };

        match reason {
            Some(reason) => {
                self.finish(reason);
                Ok(RepOutcome::Complete(reason))
            }
            None => Ok(RepOutcome::Continue),
        }
    }

    /// Abort: Running drops back to Setup, measurements are kept
    pub fn halt(&mut self) {
        if matches!(self.state, SessionState::Running | SessionState::Calibration) {
            self.state = SessionState::Setup;
        }
        self.remaining_secs = None;
    }

    /// Clear measurements and return to Setup
    pub fn new_session(&mut self) -> Result<(), DrillError> {
        if self.state == SessionState::Running {
            return Err(self.invalid("start a new session"));
        }
        self.measurements.clear();
        self.state = SessionState::Setup;
        self.remaining_secs = None;
        self.completion = None;
        Ok(())
    }

    pub fn result(&self, mode: DrillMode) -> Option<SessionResult> {
        SessionResult::from_measurements(mode, &self.measurements)
    }

    fn finish(&mut self, reason: CompletionReason) {
        log::info!(
            "[SessionManager] session finished ({:?}) after {} reps",
            reason,
            self.measurements.len()
        );
        self.state = SessionState::Finished;
        self.completion = Some(reason);
    }

    fn transition(&mut self, next: SessionState, command: &str) -> Result<(), DrillError> {
        if !self.state.can_transition_to(next) {
            return Err(self.invalid(command));
        }
        self.state = next;
        Ok(())
    }

    fn invalid(&self, command: &str) -> DrillError {
        DrillError::InvalidTransition {
            from: self.state.to_string(),
            command: command.to_string(),
        }
    }
}
