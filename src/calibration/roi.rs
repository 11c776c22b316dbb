// Region-of-interest geometry
//
// The ROI is stored resolution-independent (`NormalizedRoi`, fractions of the
// frame) in the drill configuration and resolved to pixels (`Roi`) against the
// native frame size at arming time.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Pixel-space rectangle inside a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whole frame
    pub fn full(frame_width: u32, frame_height: u32) -> Self {
        Self::new(0, 0, frame_width, frame_height)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Point containment, right/bottom edges exclusive
    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Clip to the frame bounds, keeping at least one pixel
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Self {
        let frame_width = frame_width.max(1);
        let frame_height = frame_height.max(1);
        let x = self.x.min(frame_width - 1);
        let y = self.y.min(frame_height - 1);
        let width = self.width.clamp(1, frame_width - x);
        let height = self.height.clamp(1, frame_height - y);
        Self::new(x, y, width, height)
    }

    /// Express as fractions of the frame
    pub fn normalize(&self, frame_width: u32, frame_height: u32) -> NormalizedRoi {
        let fw = frame_width.max(1) as f32;
        let fh = frame_height.max(1) as f32;
        NormalizedRoi {
            x: self.x as f32 / fw,
            y: self.y as f32 / fh,
            width: self.width as f32 / fw,
            height: self.height as f32 / fh,
        }
    }
}

/// Frame-relative rectangle; every field is a fraction in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRoi {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedRoi {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Reject empty, non-finite or out-of-frame rectangles
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let fields = [self.x, self.y, self.width, self.height];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(ConfigurationError::InvalidRoi {
                reason: "non-finite coordinate".to_string(),
            });
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(ConfigurationError::InvalidRoi {
                reason: format!("empty region {}x{}", self.width, self.height),
            });
        }
        if self.x < 0.0 || self.y < 0.0 || self.x + self.width > 1.0 + f32::EPSILON
            || self.y + self.height > 1.0 + f32::EPSILON
        {
            return Err(ConfigurationError::InvalidRoi {
                reason: "region extends outside the frame".to_string(),
            });
        }
        Ok(())
    }

    /// Resolve against a concrete frame size
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> Roi {
        let fw = frame_width as f32;
        let fh = frame_height as f32;
        let x = (self.x * fw).round().max(0.0) as u32;
        let y = (self.y * fh).round().max(0.0) as u32;
        let width = (self.width * fw).round().max(1.0) as u32;
        let height = (self.height * fh).round().max(1.0) as u32;
        Roi::new(x, y, width, height).clamp_to(frame_width, frame_height)
    }
}

/// Default ROI sizing per drill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoiSizing {
    /// Nearly the whole frame; face-off crouch fills the view
    NearFull,
    /// Smaller centered box around the stick/ball or goal
    Boxed,
}

impl RoiSizing {
    pub fn default_region(&self) -> NormalizedRoi {
        match self {
            RoiSizing::NearFull => NormalizedRoi::new(0.05, 0.05, 0.9, 0.9),
            RoiSizing::Boxed => NormalizedRoi::new(0.3, 0.3, 0.4, 0.4),
        }
    }
}
