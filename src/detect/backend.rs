use anyhow::Result;

use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Detector backend trait.
///
/// A backend wraps one pretrained model. It receives a read-only RGB frame
/// and returns raw detections in frame pixel coordinates. Label lookup,
/// rounding and thresholding happen in `Detector`, not here.
///
/// Backends must not write to disk, keep the frame beyond the call, or
/// mutate it.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run the model on one frame.
    fn infer(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
