// Calibration module - operator placement of the motion-detection region
//
// This module provides two components:
// 1. Roi / NormalizedRoi / RoiSizing: region geometry in pixel and frame-relative form
// 2. RegionCalibration: move/resize/center workflow against the live preview
//
// The calibration workflow:
// 1. Engine enters SessionState::Calibration with the preview resolution
// 2. Operator drags/resizes the region
// 3. Commit stores the normalized region in the drill configuration

pub mod procedure;
pub mod roi;

pub use procedure::{RegionCalibration, MIN_ROI_EDGE};
pub use roi::{NormalizedRoi, Roi, RoiSizing};
