// MotionDetector - reference-frame differencing inside the ROI
//
// Lifecycle per rep: `arm()` captures the reference luma buffer and the arm
// timestamp; every later frame goes through `process()`, which fires at most
// once per arm cycle when the mean absolute difference exceeds the
// threshold. After firing the detector stays silent until re-armed.

use std::time::{Duration, Instant};

use crate::analysis::frame::Frame;
use crate::analysis::luminance::{mean_abs_diff, roi_luminance};
use crate::calibration::{NormalizedRoi, Roi};

/// Result of a fired detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionTrigger {
    /// now - arm timestamp
    pub elapsed: Duration,
    /// Mean absolute luma difference that crossed the threshold
    pub score: f32,
}

impl MotionTrigger {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

struct Armed {
    reference: Vec<f32>,
    roi: Roi,
    armed_at: Instant,
    fired: bool,
}

/// Single-shot motion trigger
pub struct MotionDetector {
    threshold: f32,
    region: NormalizedRoi,
    armed: Option<Armed>,
}

impl MotionDetector {
    pub fn new(threshold: f32, region: NormalizedRoi) -> Self {
        Self {
            threshold,
            region,
            armed: None,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Capture the reference frame and start a new arm cycle
    ///
    /// The ROI is resolved against this frame's resolution and reused for
    /// every compared frame of the cycle.
    pub fn arm(&mut self, frame: &Frame, now: Instant) -> Roi {
        let roi = self.region.to_pixels(frame.width(), frame.height());
        self.armed = Some(Armed {
            reference: roi_luminance(frame, roi),
            roi,
            armed_at: now,
            fired: false,
        });
        log::debug!(
            "[MotionDetector] armed on {}x{} ROI at ({}, {})",
            roi.width,
            roi.height,
            roi.x,
            roi.y
        );
        roi
    }

    /// Compare one frame against the reference
    ///
    /// # Returns
    /// `Some(trigger)` exactly once per arm cycle; None while unarmed, after
    /// firing, or when the difference stays at or below the threshold.
    pub fn process(&mut self, frame: &Frame, now: Instant) -> Option<MotionTrigger> {
        let threshold = self.threshold;
        let armed = self.armed.as_mut()?;
        if armed.fired {
            return None;
        }

        let current = roi_luminance(frame, armed.roi);
        let score = mean_abs_diff(&armed.reference, &current);
        if score > threshold {
            armed.fired = true;
            Some(MotionTrigger {
                elapsed: now.saturating_duration_since(armed.armed_at),
                score,
            })
        } else {
            None
        }
    }

    /// Armed and still waiting for motion
    pub fn is_armed(&self) -> bool {
        self.armed.as_ref().map(|a| !a.fired).unwrap_or(false)
    }

    pub fn has_fired(&self) -> bool {
        self.armed.as_ref().map(|a| a.fired).unwrap_or(false)
    }

    /// Pixel ROI of the current arm cycle
    pub fn active_roi(&self) -> Option<Roi> {
        self.armed.as_ref().map(|a| a.roi)
    }

    pub fn disarm(&mut self) {
        self.armed = None;
    }
}
