//! Still captures of the current annotated frame.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Local;

use crate::frame::{Frame, FrameSlot};
use crate::storage::OutputLayout;

/// Image formats accepted for captures.
pub const CAPTURE_FORMATS: &[&str] = &["png", "jpg", "jpeg"];

/// Save the latest frame of `slot`. Returns `Ok(None)` when no frame has been
/// produced yet; nothing is written in that case.
pub fn capture_still(slot: &FrameSlot, layout: &OutputLayout, extension: &str) -> Result<Option<PathBuf>> {
    let Some(frame) = slot.latest() else {
        log::debug!("capture skipped: no frame yet");
        return Ok(None);
    };
    let path = layout.capture_path(Local::now(), extension);
    write_image(frame, &path)?;
    Ok(Some(path))
}

/// Encode `frame` to `path`; the format follows the extension.
pub fn write_image(frame: &Frame, path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !CAPTURE_FORMATS.contains(&extension.as_str()) {
        return Err(anyhow!("unsupported capture format '{}'", extension));
    }
    frame
        .to_rgb_image()?
        .save(path)
        .with_context(|| format!("write capture {}", path.display()))
}
