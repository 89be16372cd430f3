use crate::detect::backend::DetectorBackend;
use crate::detect::labels::label_for;
use crate::detect::result::{BoundingBox, Detection, DetectionOutcome, RawDetection};
use crate::frame::Frame;

/// Default minimum score kept by the adapter.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;

/// Best-effort detector adapter around a backend.
///
/// `detect` never returns an error: a failing backend yields
/// `DetectionOutcome::Failed` and the caller chooses how to continue.
pub struct Detector {
    backend: Box<dyn DetectorBackend>,
    confidence_threshold: f32,
    failures: u64,
}

impl Detector {
    pub fn new(backend: Box<dyn DetectorBackend>) -> Self {
        Self {
            backend,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            failures: 0,
        }
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Number of failed invocations so far.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn warm_up(&mut self) -> DetectionOutcome {
        match self.backend.warm_up() {
            Ok(()) => DetectionOutcome::Detected(Vec::new()),
            Err(err) => DetectionOutcome::Failed(format!("{:#}", err)),
        }
    }

    /// Run detection on one frame.
    pub fn detect(&mut self, frame: &Frame) -> DetectionOutcome {
        match self.backend.infer(frame) {
            Ok(raw) => DetectionOutcome::Detected(
                raw.into_iter()
                    .filter_map(|det| self.resolve(det, frame))
                    .collect(),
            ),
            Err(err) => {
                self.failures += 1;
                DetectionOutcome::Failed(format!("{}: {:#}", self.backend.name(), err))
            }
        }
    }

    fn resolve(&self, raw: RawDetection, frame: &Frame) -> Option<Detection> {
        if !raw.score.is_finite() || raw.bbox.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let confidence = raw.score.clamp(0.0, 1.0);
        if confidence < self.confidence_threshold {
            return None;
        }
        let max_x = frame.width.saturating_sub(1) as i32;
        let max_y = frame.height.saturating_sub(1) as i32;
        let [x1, y1, x2, y2] = raw.bbox;
        let bbox = BoundingBox {
            x1: (x1.round() as i32).clamp(0, max_x),
            y1: (y1.round() as i32).clamp(0, max_y),
            x2: (x2.round() as i32).clamp(0, max_x),
            y2: (y2.round() as i32).clamp(0, max_y),
        };
        Some(Detection {
            bbox,
            label: label_for(raw.class_index),
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};

    struct FixedBackend(Vec<RawDetection>);

    impl DetectorBackend for FixedBackend {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn infer(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenBackend;

    impl DetectorBackend for BrokenBackend {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn infer(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
            Err(anyhow!("tensor shape mismatch"))
        }
    }

    #[test]
    fn rounds_clamps_and_labels() {
        let backend = FixedBackend(vec![RawDetection {
            bbox: [-3.4, 10.6, 700.2, 99.5],
            class_index: 0,
            score: 1.3,
        }]);
        let mut detector = Detector::new(Box::new(backend));
        let frame = Frame::black(640, 480);

        let detections = detector.detect(&frame).into_detections();
        assert_eq!(detections.len(), 1);
        let det = &detections[0];
        assert_eq!(det.label, "person");
        assert_eq!(det.confidence, 1.0);
        assert_eq!(
            det.bbox,
            BoundingBox {
                x1: 0,
                y1: 11,
                x2: 639,
                y2: 100
            }
        );
    }

    #[test]
    fn drops_low_scores_and_keeps_unknown_classes() {
        let backend = FixedBackend(vec![
            RawDetection {
                bbox: [0.0, 0.0, 5.0, 5.0],
                class_index: 2,
                score: 0.1,
            },
            RawDetection {
                bbox: [0.0, 0.0, 5.0, 5.0],
                class_index: 123,
                score: 0.9,
            },
        ]);
        let mut detector = Detector::new(Box::new(backend)).with_threshold(0.5);
        let detections = detector.detect(&Frame::black(8, 8)).into_detections();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "123");
    }

    #[test]
    fn backend_failure_becomes_outcome() {
        let mut detector = Detector::new(Box::new(BrokenBackend));
        let frame = Frame::black(4, 4);
        let before = frame.clone();

        let outcome = detector.detect(&frame);
        assert!(outcome.is_failure());
        assert!(outcome.into_detections().is_empty());
        assert_eq!(detector.failures(), 1);
        assert_eq!(frame, before);
    }
}
