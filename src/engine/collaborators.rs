//! External collaborators: persistence and coach assignments.

use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::engine::session::{CompletionReason, RepMeasurement, SessionReport};

/// Receives the final result of every self-directed session
pub trait ResultSink: Send + Sync {
    fn save(&self, report: &SessionReport) -> anyhow::Result<()>;
}

/// Completion payload for an assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentReport {
    pub completion: CompletionReason,
    pub measurements: Vec<RepMeasurement>,
}

/// Coach-issued assignment driving the session target
pub trait AssignmentCollaborator: Send + Sync {
    /// Free-text instructions, e.g. "25 shots, focus top corners"
    fn notes(&self) -> String;
    fn on_complete(&self, report: AssignmentReport) -> anyhow::Result<()>;
}

static TARGET_REPS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+)\s*(?:shots?|reps?)\b").unwrap());

/// First "<N> shots|reps" count in the notes; zero counts as absent
pub fn parse_target_reps(notes: &str) -> Option<u32> {
    TARGET_REPS
        .captures_iter(notes)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .find(|&n| n > 0)
}

/// Sink keeping reports in memory
#[derive(Default)]
pub struct InMemoryResultSink {
    reports: Mutex<Vec<SessionReport>>,
}

impl InMemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<SessionReport> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }
}

impl ResultSink for InMemoryResultSink {
    fn save(&self, report: &SessionReport) -> anyhow::Result<()> {
        self.reports
            .lock()
            .map_err(|_| anyhow::anyhow!("result sink lock poisoned"))?
            .push(report.clone());
        Ok(())
    }
}

/// Assignment with fixed notes that records its completion callbacks
pub struct RecordedAssignment {
    notes: String,
    completions: Mutex<Vec<AssignmentReport>>,
}

impl RecordedAssignment {
    pub fn new(notes: impl Into<String>) -> Self {
        Self {
            notes: notes.into(),
            completions: Mutex::new(Vec::new()),
        }
    }

    pub fn completions(&self) -> Vec<AssignmentReport> {
        self.completions
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

impl AssignmentCollaborator for RecordedAssignment {
    fn notes(&self) -> String {
        self.notes.clone()
    }

    fn on_complete(&self, report: AssignmentReport) -> anyhow::Result<()> {
        self.completions
            .lock()
            .map_err(|_| anyhow::anyhow!("assignment lock poisoned"))?
            .push(report);
        Ok(())
    }
}
