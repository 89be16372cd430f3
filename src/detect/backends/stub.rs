use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::labels::index_of;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Scripted backend for testing and model-less builds.
///
/// Replays a cyclic sequence of per-call results. An empty script never
/// detects anything. `None` entries in the script simulate a model failure.
pub struct StubBackend {
    script: Vec<Option<Vec<RawDetection>>>,
    calls: usize,
}

impl StubBackend {
    /// Backend that never detects anything.
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            calls: 0,
        }
    }

    /// Replay `script` cyclically, one entry per call.
    pub fn scripted(script: Vec<Option<Vec<RawDetection>>>) -> Self {
        Self { script, calls: 0 }
    }

    /// Script built from label lists: each tick yields one centred box per
    /// label with score 0.9. Unknown labels are ignored.
    pub fn from_labels(ticks: &[&[&str]]) -> Self {
        let script = ticks
            .iter()
            .map(|labels| {
                Some(
                    labels
                        .iter()
                        .filter_map(|label| index_of(label))
                        .map(|class_index| RawDetection {
                            bbox: [8.0, 8.0, 24.0, 24.0],
                            class_index,
                            score: 0.9,
                        })
                        .collect(),
                )
            })
            .collect();
        Self::scripted(script)
    }

    /// Backend whose every call fails.
    pub fn failing() -> Self {
        Self::scripted(vec![None])
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
        let call = self.calls;
        self.calls += 1;
        if self.script.is_empty() {
            return Ok(Vec::new());
        }
        match &self.script[call % self.script.len()] {
            Some(detections) => Ok(detections.clone()),
            None => Err(anyhow!("scripted failure on call {}", call + 1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_script_cyclically() -> Result<()> {
        let mut backend = StubBackend::from_labels(&[&[], &["person", "car"]]);
        let frame = Frame::black(32, 32);

        assert!(backend.infer(&frame)?.is_empty());
        assert_eq!(backend.infer(&frame)?.len(), 2);
        assert!(backend.infer(&frame)?.is_empty());
        assert_eq!(backend.calls(), 3);
        Ok(())
    }

    #[test]
    fn failing_backend_errors() {
        let mut backend = StubBackend::failing();
        assert!(backend.infer(&Frame::black(2, 2)).is_err());
    }

    #[test]
    fn empty_script_never_detects() -> Result<()> {
        let mut backend = StubBackend::new();
        for _ in 0..5 {
            assert!(backend.infer(&Frame::black(2, 2))?.is_empty());
        }
        Ok(())
    }
}
