//! Frame sources.
//!
//! This module provides the sources a feed can pull frames from:
//! - Cameras by index (feature: ingest-v4l2)
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Synthetic `stub://` sources (testing, demos, builds without capture features)
//!
//! Every source produces RGB24 `Frame`s. A source is owned by exactly one
//! feed; `release` is idempotent and also runs on drop.

pub mod camera;
pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
#[cfg(feature = "ingest-v4l2")]
pub(crate) mod normalize;
pub mod synthetic;

use anyhow::Result;

use crate::frame::Frame;

pub use camera::{CameraConfig, CameraSource};
pub use file::{FileConfig, FileSource};
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// An open-able handle to a camera or a video file.
pub trait FrameSource {
    /// Human-readable origin, used in logs.
    fn describe(&self) -> String;

    /// Open the underlying device or file.
    fn open(&mut self) -> Result<()>;

    /// Pull the next frame. `Ok(None)` means the stream has ended.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying handle. Calling it twice is harmless.
    fn release(&mut self);

    fn is_open(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Counters reported by a source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub origin: String,
}

/// What a feed should open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSpec {
    /// Camera by index (`/dev/video<N>` unless the device template says otherwise).
    Camera { index: u32 },
    /// Local video file, or a `stub://` URI.
    File { path: String },
}

impl SourceSpec {
    pub fn describe(&self) -> String {
        match self {
            SourceSpec::Camera { index } => format!("camera {}", index),
            SourceSpec::File { path } => format!("file {}", path),
        }
    }
}

/// Capture settings shared by every camera feed.
#[derive(Clone, Debug)]
pub struct CaptureSettings {
    /// Device path template; `{index}` is replaced by the camera index.
    pub device_template: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            device_template: "/dev/video{index}".to_string(),
            width: 640,
            height: 480,
            target_fps: 30,
        }
    }
}

impl CaptureSettings {
    pub fn device_for(&self, index: u32) -> String {
        self.device_template.replace("{index}", &index.to_string())
    }
}

/// Construct (but do not open) a source for `spec`.
pub fn build_source(spec: &SourceSpec, settings: &CaptureSettings) -> Result<Box<dyn FrameSource>> {
    match spec {
        SourceSpec::Camera { index } => Ok(Box::new(CameraSource::new(CameraConfig {
            device: settings.device_for(*index),
            target_fps: settings.target_fps,
            width: settings.width,
            height: settings.height,
        })?)),
        SourceSpec::File { path } => Ok(Box::new(FileSource::new(FileConfig {
            path: path.clone(),
            target_fps: settings.target_fps,
        })?)),
    }
}
