//! Object detection: backends, label classes and the adapter feeding the
//! capture loop.

mod adapter;
mod backend;
mod backends;
pub mod labels;
pub mod nms;
mod result;
pub mod weights;

use anyhow::Result;

use crate::config::{ModelBackendKind, ModelSettings};

pub use adapter::{Detector, DEFAULT_CONFIDENCE_THRESHOLD};
pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{
    contains_person, BoundingBox, Detection, DetectionOutcome, LabelClass, RawDetection,
};

/// Build the detector once at startup, fetching weights when needed.
pub fn build_detector(settings: &ModelSettings) -> Result<Detector> {
    let backend: Box<dyn DetectorBackend> = match settings.backend {
        ModelBackendKind::Tract => tract_backend(settings)?,
        ModelBackendKind::Stub => {
            log::warn!("stub detector selected; no objects will be detected");
            Box::new(StubBackend::new())
        }
    };
    let mut detector = Detector::new(backend).with_threshold(settings.confidence_threshold);
    if let DetectionOutcome::Failed(reason) = detector.warm_up() {
        log::warn!("detector warm-up failed: {}", reason);
    }
    log::info!("detector ready (backend: {})", detector.backend_name());
    Ok(detector)
}

#[cfg(feature = "backend-tract")]
fn tract_backend(settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    let path = weights::ensure_weights(&settings.path, settings.url.as_deref())?;
    let backend = TractBackend::new(&path, settings.input_size)?
        .with_iou_threshold(settings.iou_threshold)
        .with_score_floor(settings.confidence_threshold);
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn tract_backend(_settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    anyhow::bail!("the tract model backend requires the backend-tract feature")
}
