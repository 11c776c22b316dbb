//! Whistle delay strategies.
//!
//! The pause between "set" and the whistle is what keeps the athlete from
//! anticipating. Each drill variant picks one strategy: a fixed pause, a draw
//! from a discrete candidate set, or a draw from a continuous range.

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Candidate whistle delays used by the face-off drill
pub const FACE_OFF_WHISTLE_CANDIDATES_MS: [u64; 5] = [1000, 1500, 2000, 3000, 3500];

/// Pluggable whistle-delay distribution
pub trait DelayDistribution {
    /// Draw the next delay in milliseconds
    fn sample_ms(&self, rng: &mut dyn RngCore) -> u64;
}

/// Configured whistle-delay strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WhistleDelay {
    /// Always the same pause
    Fixed { ms: u64 },
    /// Uniform pick from a candidate set
    Discrete { candidates_ms: Vec<u64> },
    /// Uniform draw from an inclusive range
    Range { min_ms: u64, max_ms: u64 },
}

impl WhistleDelay {
    pub fn face_off_default() -> Self {
        WhistleDelay::Discrete {
            candidates_ms: FACE_OFF_WHISTLE_CANDIDATES_MS.to_vec(),
        }
    }

    pub fn shooting_default() -> Self {
        WhistleDelay::Range {
            min_ms: 1000,
            max_ms: 3000,
        }
    }

    /// Every possible draw must be strictly positive so the whistle never
    /// coincides with the set cue.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            WhistleDelay::Fixed { ms } if *ms == 0 => Err(ConfigurationError::InvalidWhistleDelay {
                reason: "fixed delay must be greater than 0 ms".to_string(),
            }),
            WhistleDelay::Discrete { candidates_ms } if candidates_ms.is_empty() => {
                Err(ConfigurationError::InvalidWhistleDelay {
                    reason: "candidate set is empty".to_string(),
                })
            }
            WhistleDelay::Discrete { candidates_ms } if candidates_ms.contains(&0) => {
                Err(ConfigurationError::InvalidWhistleDelay {
                    reason: "candidate set contains 0 ms".to_string(),
                })
            }
            WhistleDelay::Range { min_ms, max_ms } if *min_ms == 0 || min_ms > max_ms => {
                Err(ConfigurationError::InvalidWhistleDelay {
                    reason: format!("range {}..={} ms is not usable", min_ms, max_ms),
                })
            }
            _ => Ok(()),
        }
    }

    /// Upper bound of any draw, used for pacing estimates
    pub fn max_ms(&self) -> u64 {
        match self {
            WhistleDelay::Fixed { ms } => *ms,
            WhistleDelay::Discrete { candidates_ms } => {
                candidates_ms.iter().copied().max().unwrap_or(0)
            }
            WhistleDelay::Range { max_ms, .. } => *max_ms,
        }
    }
}

impl DelayDistribution for WhistleDelay {
    fn sample_ms(&self, rng: &mut dyn RngCore) -> u64 {
        match self {
            WhistleDelay::Fixed { ms } => *ms,
            WhistleDelay::Discrete { candidates_ms } => {
                candidates_ms.choose(rng).copied().unwrap_or(0)
            }
            WhistleDelay::Range { min_ms, max_ms } => {
                if min_ms >= max_ms {
                    *min_ms
                } else {
                    rng.gen_range(*min_ms..=*max_ms)
                }
            }
        }
    }
}
