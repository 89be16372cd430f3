//! Output layout on disk.
//!
//! Two directories: finished recordings and still captures. File names carry
//! a local timestamp (`record_20250101_120000.mp4`,
//! `capture_20250101_120000.png`); a `_N` suffix keeps names unique when
//! several files are produced within the same second.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

pub const RECORDING_PREFIX: &str = "record";
pub const CAPTURE_PREFIX: &str = "capture";

/// Timestamp format used in output file names.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Where recordings and captures are written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    pub recordings_dir: PathBuf,
    pub captures_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(recordings_dir: impl Into<PathBuf>, captures_dir: impl Into<PathBuf>) -> Self {
        Self {
            recordings_dir: recordings_dir.into(),
            captures_dir: captures_dir.into(),
        }
    }

    /// Create both directories if absent.
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.recordings_dir, &self.captures_dir] {
            if !dir.exists() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("create output directory {}", dir.display()))?;
                log::info!("created output directory {}", dir.display());
            }
        }
        Ok(())
    }

    /// Fresh path for a new recording.
    pub fn recording_path(&self, now: DateTime<Local>, container: &str) -> PathBuf {
        unique_path(&self.recordings_dir, RECORDING_PREFIX, now, container)
    }

    /// Fresh path for a new still capture.
    pub fn capture_path(&self, now: DateTime<Local>, extension: &str) -> PathBuf {
        unique_path(&self.captures_dir, CAPTURE_PREFIX, now, extension)
    }
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self::new("recordings", "captures")
    }
}

/// `<dir>/<prefix>_<timestamp>[_N].<ext>` whose stem no file in `dir` uses
/// yet, so sidecar files (such as recording manifests) also reserve a name.
pub fn unique_path(dir: &Path, prefix: &str, now: DateTime<Local>, extension: &str) -> PathBuf {
    let stamp = now.format(FILE_TIMESTAMP_FORMAT).to_string();
    let first = format!("{}_{}", prefix, stamp);
    let stem = std::iter::once(first.clone())
        .chain((1u32..).map(|n| format!("{}_{}_{}", prefix, stamp, n)))
        .find(|stem| !stem_taken(dir, stem))
        .unwrap_or(first);
    dir.join(format!("{}.{}", stem, extension))
}

fn stem_taken(dir: &Path, stem: &str) -> bool {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .any(|entry| entry.path().file_stem().is_some_and(|s| s == stem))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 9, 7, 5, 1)
            .single()
            .expect("unambiguous local time")
    }

    #[test]
    fn names_follow_timestamp_pattern() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let layout = OutputLayout::new(dir.path().join("rec"), dir.path().join("cap"));

        let rec = layout.recording_path(fixed_time(), "mp4");
        let cap = layout.capture_path(fixed_time(), "png");
        assert_eq!(rec.file_name().unwrap(), "record_20240309_070501.mp4");
        assert_eq!(cap.file_name().unwrap(), "capture_20240309_070501.png");
        Ok(())
    }

    #[test]
    fn ensure_creates_directories() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let layout = OutputLayout::new(dir.path().join("a/rec"), dir.path().join("b/cap"));
        layout.ensure()?;
        layout.ensure()?;
        assert!(layout.recordings_dir.is_dir());
        assert!(layout.captures_dir.is_dir());
        Ok(())
    }

    #[test]
    fn collisions_get_a_suffix() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let layout = OutputLayout::new(dir.path(), dir.path());

        let first = layout.capture_path(fixed_time(), "png");
        fs::write(&first, b"x")?;
        let second = layout.capture_path(fixed_time(), "png");
        fs::write(&second, b"x")?;
        let third = layout.capture_path(fixed_time(), "png");

        assert_eq!(second.file_name().unwrap(), "capture_20240309_070501_1.png");
        assert_eq!(third.file_name().unwrap(), "capture_20240309_070501_2.png");
        Ok(())
    }

    #[test]
    fn sidecar_with_same_stem_reserves_the_name() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let layout = OutputLayout::new(dir.path(), dir.path());

        fs::write(dir.path().join("record_20240309_070501.frames"), b"")?;
        let next = layout.recording_path(fixed_time(), "mp4");
        assert_eq!(next.file_name().unwrap(), "record_20240309_070501_1.mp4");
        Ok(())
    }
}
