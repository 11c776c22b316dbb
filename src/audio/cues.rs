//! Cue plan - ordered offsets for one repetition.
//!
//! Layout of a rep, all offsets relative to the rep start:
//!
//! ```text
//! pre-start | tick N | tick N-1 | ... | tick 1 | (transition) | set | whistle delay | whistle
//! ```
//!
//! Tick `k` (counting down) fires at `pre_start + (N - k) * tick_interval`.
//! The countdown ends one interval after the last tick; the set cue follows
//! after the transition delay (zero and silent for drills without one), and
//! the whistle follows after the sampled whistle delay.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::DrillProfile;

/// Kinds of audio cues fired during a rep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cue", rename_all = "snake_case")]
pub enum CueKind {
    /// Countdown beep; `remaining` is the number shown (N..=1)
    CountdownTick { remaining: u32 },
    /// "Set" call; silent for drills without a transition delay
    Set { audible: bool },
    /// Whistle; arms the motion detector
    Whistle,
}

impl CueKind {
    pub fn label(&self) -> &'static str {
        match self {
            CueKind::CountdownTick { .. } => "tick",
            CueKind::Set { .. } => "set",
            CueKind::Whistle => "whistle",
        }
    }
}

/// One scheduled cue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioCueEvent {
    pub kind: CueKind,
    /// Offset from the rep start in milliseconds
    pub offset_ms: u64,
}

impl AudioCueEvent {
    pub fn offset(&self) -> Duration {
        Duration::from_millis(self.offset_ms)
    }
}

/// Chronological cue list for a single rep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuePlan {
    events: Vec<AudioCueEvent>,
}

impl CuePlan {
    /// Build the plan for one rep
    ///
    /// # Arguments
    /// * `profile` - Drill table row (tick count, spacing, transition)
    /// * `pre_start_delay_ms` - Pause before the first tick
    /// * `whistle_delay_ms` - Already-sampled whistle delay
    pub fn build(profile: &DrillProfile, pre_start_delay_ms: u64, whistle_delay_ms: u64) -> Self {
        let ticks = profile.countdown_ticks;
        let interval = profile.tick_interval_ms;
        let mut events = Vec::with_capacity(ticks as usize + 2);

        for i in 0..ticks {
            events.push(AudioCueEvent {
                kind: CueKind::CountdownTick {
                    remaining: ticks - i,
                },
                offset_ms: pre_start_delay_ms + i as u64 * interval,
            });
        }

        let countdown_end = pre_start_delay_ms + ticks as u64 * interval;
        let transition = profile.transition_delay_ms.unwrap_or(0);
        let set_offset = countdown_end + transition;
        events.push(AudioCueEvent {
            kind: CueKind::Set {
                audible: profile.transition_delay_ms.is_some(),
            },
            offset_ms: set_offset,
        });
        events.push(AudioCueEvent {
            kind: CueKind::Whistle,
            offset_ms: set_offset + whistle_delay_ms,
        });

        debug_assert!(
            events.windows(2).all(|w| w[0].offset_ms <= w[1].offset_ms),
            "cue offsets must be chronological"
        );

        Self { events }
    }

    pub fn events(&self) -> &[AudioCueEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn whistle_offset_ms(&self) -> Option<u64> {
        self.offset_of(|kind| matches!(kind, CueKind::Whistle))
    }

    pub fn set_offset_ms(&self) -> Option<u64> {
        self.offset_of(|kind| matches!(kind, CueKind::Set { .. }))
    }

    fn offset_of(&self, pred: impl Fn(&CueKind) -> bool) -> Option<u64> {
        self.events
            .iter()
            .find(|event| pred(&event.kind))
            .map(|event| event.offset_ms)
    }
}
