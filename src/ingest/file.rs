//! Local file frame source.
//!
//! `FileSource` reads frames from a local video file (feature:
//! ingest-file-ffmpeg) or from a `stub://` URI. File sources are finite:
//! `next_frame` returns `Ok(None)` once the file is exhausted. URL schemes
//! other than `stub://` are rejected.

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::synthetic::{SyntheticConfig, SyntheticSource, STUB_SCHEME};
use super::{FrameSource, SourceStats};
use crate::frame::Frame;

/// Frames produced by a `stub://` file URI that does not say otherwise.
const DEFAULT_STUB_FILE_FRAMES: u64 = 100;

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path (e.g., "clips/lobby.mp4").
    pub path: String,
    /// Nominal frame rate, used for logging only; files are read as fast as
    /// the feed ticks.
    pub target_fps: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            target_fps: 30,
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes): '{}'",
                config.path
            ));
        }
        if config.path.starts_with(STUB_SCHEME) {
            let defaults = SyntheticConfig {
                frames: Some(DEFAULT_STUB_FILE_FRAMES),
                ..SyntheticConfig::default()
            };
            let synthetic = SyntheticConfig::from_uri(&config.path, defaults)?;
            Ok(Self {
                backend: FileBackend::Synthetic(SyntheticSource::new(synthetic)),
            })
        } else {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                Ok(Self {
                    backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)),
                })
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                Err(anyhow!(
                    "file ingestion requires the ingest-file-ffmpeg feature"
                ))
            }
        }
    }

    fn inner(&self) -> &dyn FrameSource {
        match &self.backend {
            FileBackend::Synthetic(source) => source,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn FrameSource {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source,
        }
    }
}

impl FrameSource for FileSource {
    fn describe(&self) -> String {
        self.inner().describe()
    }

    fn open(&mut self) -> Result<()> {
        self.inner_mut().open()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.inner_mut().next_frame()
    }

    fn release(&mut self) {
        self.inner_mut().release()
    }

    fn is_open(&self) -> bool {
        self.inner().is_open()
    }

    fn stats(&self) -> SourceStats {
        self.inner().stats()
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        self.release();
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with(STUB_SCHEME) {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_urls_and_empty_paths() {
        for path in ["", "   ", "rtsp://camera/stream", "https://example.com/a.mp4"] {
            let result = FileSource::new(FileConfig {
                path: path.to_string(),
                ..FileConfig::default()
            });
            assert!(result.is_err(), "{} should be rejected", path);
        }
    }

    #[test]
    fn stub_file_defaults_to_finite() -> Result<()> {
        let mut source = FileSource::new(FileConfig {
            path: "stub://clip?width=4&height=4".to_string(),
            ..FileConfig::default()
        })?;
        source.open()?;
        let mut count = 0;
        while source.next_frame()?.is_some() {
            count += 1;
        }
        assert_eq!(count, DEFAULT_STUB_FILE_FRAMES);
        Ok(())
    }
}
