//! Drill and session state machines.
//!
//! Rep flow: Idle -> Starting -> Countdown -> Set -> Measuring -> Result,
//! with Result <-> LogShot for manual placement and Result -> Starting for
//! the next rep. Any state may drop to Error (acquisition/readiness failure)
//! or to Idle (abort, completion).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-rep state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrillState {
    Idle,
    Starting,
    Countdown,
    Set,
    Measuring,
    Result,
    /// Waiting for the operator to tap a zone
    LogShot,
    /// Terminal until reset
    Error,
}

impl DrillState {
    pub fn can_transition_to(self, next: DrillState) -> bool {
        use DrillState::*;
        match (self, next) {
            (_, Idle) | (_, Error) => true,
            (Idle, Starting)
            | (Starting, Countdown)
            | (Countdown, Set)
            | (Set, Measuring)
            | (Measuring, Result)
            | (Result, LogShot)
            | (LogShot, Result)
            | (Result, Starting) => true,
            _ => false,
        }
    }

    /// Timers or frame loop may be live
    pub fn is_active(self) -> bool {
        !matches!(self, DrillState::Idle | DrillState::Error)
    }
}

impl fmt::Display for DrillState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Setup,
    Calibration,
    Running,
    Finished,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Setup, Calibration)
                | (Calibration, Setup)
                | (Setup, Running)
                | (Calibration, Running)
                | (Running, Finished)
                | (Running, Setup)
                | (Finished, Setup)
        )
    }

    /// Configuration and ROI may change only outside Running
    pub fn is_editable(self) -> bool {
        !matches!(self, SessionState::Running)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path_is_allowed() {
        use DrillState::*;
        let path = [Idle, Starting, Countdown, Set, Measuring, Result, Starting];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?}", pair);
        }
    }

    #[test]
    fn test_backward_edges_are_rejected() {
        use DrillState::*;
        assert!(!Countdown.can_transition_to(Starting));
        assert!(!Measuring.can_transition_to(Set));
        assert!(!Error.can_transition_to(Starting));
        assert!(!Idle.can_transition_to(Measuring));
    }

    #[test]
    fn test_any_state_may_abort_or_fail() {
        use DrillState::*;
        for state in [Idle, Starting, Countdown, Set, Measuring, Result, LogShot, Error] {
            assert!(state.can_transition_to(Idle));
            assert!(state.can_transition_to(Error));
        }
    }

    #[test]
    fn test_session_editability() {
        assert!(SessionState::Setup.is_editable());
        assert!(SessionState::Calibration.is_editable());
        assert!(!SessionState::Running.is_editable());
        assert!(!SessionState::Finished.can_transition_to(SessionState::Running));
    }
}
