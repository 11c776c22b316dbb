// Placement classifier - automatic zone lookup with manual fallback
//
// The automatic path hands a PNG crop of the impact frame to an external
// `ZoneClassifier`. Any disabled, unknown, out-of-range or failed response
// resolves to the manual path, where the operator taps a cell of the grid.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use image::ImageEncoder;

use crate::analysis::frame::Frame;
use crate::analysis::zones::ZoneIndex;
use crate::calibration::Roi;
use crate::error::{log_classification_error, ClassificationError};

/// Raw answer of the classification service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneResponse {
    /// Claimed zone; not yet range-checked
    Zone(i64),
    /// Sentinel "could not tell"
    Unknown,
}

/// External image classification collaborator
pub trait ZoneClassifier: Send + Sync {
    /// Classify a PNG-encoded impact still
    fn classify(&self, png: Vec<u8>) -> BoxFuture<'static, Result<ZoneResponse, ClassificationError>>;
}

/// Outcome of the automatic path
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementDecision {
    Automatic(ZoneIndex),
    Manual { reason: ClassificationError },
}

/// Gate around the optional classifier
#[derive(Clone)]
pub struct PlacementClassifier {
    service: Option<Arc<dyn ZoneClassifier>>,
    enabled: bool,
}

impl PlacementClassifier {
    pub fn new(service: Option<Arc<dyn ZoneClassifier>>, enabled: bool) -> Self {
        Self { service, enabled }
    }

    /// Whether the automatic path will be attempted at all
    pub fn is_automatic(&self) -> bool {
        self.enabled && self.service.is_some()
    }

    /// Service to call, if the toggle is on and one is attached
    pub fn service(&self) -> Option<Arc<dyn ZoneClassifier>> {
        if self.enabled {
            self.service.clone()
        } else {
            None
        }
    }

    /// Map a service response onto a decision
    pub fn resolve(response: Result<ZoneResponse, ClassificationError>) -> PlacementDecision {
        let outcome = response.and_then(|resp| match resp {
            ZoneResponse::Zone(zone) => ZoneIndex::try_from(zone),
            ZoneResponse::Unknown => Err(ClassificationError::Unknown),
        });
        match outcome {
            Ok(zone) => PlacementDecision::Automatic(zone),
            Err(err) => {
                log_classification_error(&err, "resolve");
                PlacementDecision::Manual { reason: err }
            }
        }
    }
}

/// Encode the ROI crop of the impact frame as PNG
pub fn encode_impact(frame: &Frame, roi: Roi) -> Result<Vec<u8>, ClassificationError> {
    let roi = roi.clamp_to(frame.width(), frame.height());
    let image = image::RgbaImage::from_raw(frame.width(), frame.height(), frame.pixels().to_vec())
        .ok_or_else(|| ClassificationError::ServiceFailure {
            reason: "frame buffer does not match its resolution".to_string(),
        })?;
    let crop = image::imageops::crop_imm(&image, roi.x, roi.y, roi.width, roi.height).to_image();

    let mut png = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png).write_image(
        crop.as_raw(),
        crop.width(),
        crop.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(png)
}

/// Classifier replaying a queue of canned responses; `Unknown` once drained
#[derive(Default)]
pub struct ScriptedClassifier {
    responses: Mutex<VecDeque<Result<ZoneResponse, ClassificationError>>>,
    calls: Mutex<usize>,
}

impl ScriptedClassifier {
    pub fn new(responses: Vec<Result<ZoneResponse, ClassificationError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().map(|c| *c).unwrap_or(0)
    }
}

impl ZoneClassifier for ScriptedClassifier {
    fn classify(&self, png: Vec<u8>) -> BoxFuture<'static, Result<ZoneResponse, ClassificationError>> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or(Ok(ZoneResponse::Unknown));
        log::debug!("[ScriptedClassifier] {} byte still -> {:?}", png.len(), next);
        Box::pin(async move { next })
    }
}
