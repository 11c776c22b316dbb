// Analysis module - frame differencing and placement classification
//
// Pipeline for one rep:
// - Frame: RGBA still from the video source
// - MotionDetector: reference luma over the ROI, mean absolute difference per frame
// - ZoneGrid / PlacementClassifier: impact frame -> zone 0-8 (placement mode)

pub mod classifier;
pub mod frame;
pub mod luminance;
pub mod motion;
pub mod zones;

pub use classifier::{
    encode_impact, PlacementClassifier, PlacementDecision, ScriptedClassifier, ZoneClassifier,
    ZoneResponse,
};
pub use frame::Frame;
pub use luminance::{luma, mean_abs_diff, roi_luminance};
pub use motion::{MotionDetector, MotionTrigger};
pub use zones::{ZoneGrid, ZoneIndex, ZONE_COUNT};
