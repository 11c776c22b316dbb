// Luminance - ROI luma extraction and frame differencing
//
// Luma uses the BT.601 weights 0.299R + 0.587G + 0.114B. The reference and
// every compared buffer are extracted over the identical pixel rectangle, so
// differencing is a straight element-wise walk.

use crate::analysis::frame::Frame;
use crate::calibration::Roi;

/// Luma of one RGB pixel
#[inline]
pub fn luma(rgb: [u8; 3]) -> f32 {
    0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32
}

/// Luma buffer of the ROI, row-major; the ROI is clipped to the frame first
pub fn roi_luminance(frame: &Frame, roi: Roi) -> Vec<f32> {
    let roi = roi.clamp_to(frame.width(), frame.height());
    let mut out = Vec::with_capacity(roi.area() as usize);
    for y in roi.y..roi.bottom() {
        for x in roi.x..roi.right() {
            out.push(luma(frame.rgb(x, y)));
        }
    }
    out
}

/// Mean absolute difference between two equally sized luma buffers
///
/// Returns 0.0 for empty input; a length mismatch compares the common prefix.
pub fn mean_abs_diff(reference: &[f32], current: &[f32]) -> f32 {
    let len = reference.len().min(current.len());
    if len == 0 {
        return 0.0;
    }
    let total: f32 = reference
        .iter()
        .zip(current.iter())
        .map(|(a, b)| (a - b).abs())
        .sum();
    total / len as f32
}
