// RegionCalibration - operator positioning of the ROI over the live preview
//
// Works in preview pixel space. Every operation clamps the region so it
// stays inside the frame and never shrinks below the minimum size. The
// result is committed in normalized form so it survives resolution changes.

use crate::calibration::roi::{NormalizedRoi, Roi, RoiSizing};
use crate::error::ConfigurationError;

/// Smallest ROI edge the operator can resize to, in pixels
pub const MIN_ROI_EDGE: u32 = 16;

/// RegionCalibration holds the ROI being edited against a preview size
#[derive(Debug, Clone)]
pub struct RegionCalibration {
    frame_width: u32,
    frame_height: u32,
    roi: Roi,
}

impl RegionCalibration {
    /// Start from an existing (normalized) region
    ///
    /// # Arguments
    /// * `frame_width`, `frame_height` - Native preview resolution
    /// * `initial` - Region currently stored in the drill configuration
    pub fn new(frame_width: u32, frame_height: u32, initial: NormalizedRoi) -> Self {
        let mut calibration = Self {
            frame_width: frame_width.max(1),
            frame_height: frame_height.max(1),
            roi: initial.to_pixels(frame_width, frame_height),
        };
        calibration.enforce_bounds();
        calibration
    }

    /// Start from the drill's default sizing
    pub fn with_sizing(frame_width: u32, frame_height: u32, sizing: RoiSizing) -> Self {
        Self::new(frame_width, frame_height, sizing.default_region())
    }

    pub fn roi(&self) -> Roi {
        self.roi
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (self.frame_width, self.frame_height)
    }

    /// Translate by a pixel delta (drag gesture)
    pub fn move_by(&mut self, dx: i32, dy: i32) -> Roi {
        let max_x = self.frame_width - self.roi.width;
        let max_y = self.frame_height - self.roi.height;
        self.roi.x = (self.roi.x as i64 + dx as i64).clamp(0, max_x as i64) as u32;
        self.roi.y = (self.roi.y as i64 + dy as i64).clamp(0, max_y as i64) as u32;
        self.roi
    }

    /// Center the region on a point (tap-to-place)
    pub fn center_on(&mut self, cx: u32, cy: u32) -> Roi {
        let (current_cx, current_cy) = self.roi.center();
        self.move_by(
            cx as i32 - current_cx as i32,
            cy as i32 - current_cy as i32,
        )
    }

    /// Resize around the current center (pinch/slider gesture)
    pub fn resize(&mut self, width: u32, height: u32) -> Roi {
        let (cx, cy) = self.roi.center();
        let width = width.clamp(MIN_ROI_EDGE.min(self.frame_width), self.frame_width);
        let height = height.clamp(MIN_ROI_EDGE.min(self.frame_height), self.frame_height);
        self.roi = Roi::new(
            cx.saturating_sub(width / 2),
            cy.saturating_sub(height / 2),
            width,
            height,
        );
        self.enforce_bounds();
        self.roi
    }

    /// Scale both edges by a factor around the center
    pub fn scale(&mut self, factor: f32) -> Roi {
        let factor = if factor.is_finite() && factor > 0.0 {
            factor
        } else {
            1.0
        };
        let width = (self.roi.width as f32 * factor).round() as u32;
        let height = (self.roi.height as f32 * factor).round() as u32;
        self.resize(width, height)
    }

    /// Reset to the drill's default sizing
    pub fn reset(&mut self, sizing: RoiSizing) -> Roi {
        self.roi = sizing
            .default_region()
            .to_pixels(self.frame_width, self.frame_height);
        self.enforce_bounds();
        self.roi
    }

    /// Produce the normalized region to store in the drill configuration
    pub fn finalize(&self) -> Result<NormalizedRoi, ConfigurationError> {
        let normalized = self.roi.normalize(self.frame_width, self.frame_height);
        normalized.validate()?;
        Ok(normalized)
    }

    fn enforce_bounds(&mut self) {
        let min_w = MIN_ROI_EDGE.min(self.frame_width);
        let min_h = MIN_ROI_EDGE.min(self.frame_height);
        let width = self.roi.width.clamp(min_w, self.frame_width);
        let height = self.roi.height.clamp(min_h, self.frame_height);
        let x = self.roi.x.min(self.frame_width - width);
        let y = self.roi.y.min(self.frame_height - height);
        self.roi = Roi::new(x, y, width, height);
    }
}
