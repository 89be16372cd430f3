//! Synthetic `stub://` frame source.
//!
//! URI form: `stub://<name>?frames=<n>&width=<w>&height=<h>&fail=open`.
//! Every parameter is optional. Without `frames` the source is endless
//! (camera-like); with it the source ends after `n` frames (file-like).
//! `fail=open` makes `open` fail, to exercise the "no feed" path.

use anyhow::{anyhow, Result};

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

pub const STUB_SCHEME: &str = "stub://";

/// Configuration of a synthetic source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Total frames before end of stream; `None` never ends.
    pub frames: Option<u64>,
    pub fail_open: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "synthetic".to_string(),
            width: 640,
            height: 480,
            frames: None,
            fail_open: false,
        }
    }
}

impl SyntheticConfig {
    /// Parse a `stub://` URI on top of `defaults`.
    pub fn from_uri(uri: &str, defaults: SyntheticConfig) -> Result<Self> {
        let rest = uri
            .strip_prefix(STUB_SCHEME)
            .ok_or_else(|| anyhow!("not a stub:// URI: {}", uri))?;
        let (name, query) = match rest.split_once('?') {
            Some((name, query)) => (name, Some(query)),
            None => (rest, None),
        };
        let mut cfg = defaults;
        if !name.is_empty() {
            cfg.name = name.to_string();
        }
        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed stub parameter '{}'", pair))?;
            match key {
                "frames" => cfg.frames = Some(parse_number(key, value)?),
                "width" => cfg.width = parse_number(key, value)?,
                "height" => cfg.height = parse_number(key, value)?,
                "fail" if value == "open" => cfg.fail_open = true,
                _ => return Err(anyhow!("unknown stub parameter '{}'", pair)),
            }
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(anyhow!("stub source dimensions must be non-zero"));
        }
        Ok(cfg)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("stub parameter '{}' must be a number, got '{}'", key, value))
}

/// Deterministic synthetic frame generator.
pub struct SyntheticSource {
    config: SyntheticConfig,
    open: bool,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            open: false,
            frame_count: 0,
            scene_state: 0,
        }
    }

    /// Finite source of `frames` frames, handy in tests.
    pub fn finite(name: &str, width: u32, height: u32, frames: u64) -> Self {
        Self::new(SyntheticConfig {
            name: name.to_string(),
            width,
            height,
            frames: Some(frames),
            fail_open: false,
        })
    }

    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.config.width as usize) * (self.config.height as usize) * 3;
        // Scene shifts every 50 frames so consecutive clips differ.
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("{}{}", STUB_SCHEME, self.config.name)
    }

    fn open(&mut self) -> Result<()> {
        if self.config.fail_open {
            return Err(anyhow!("{} is unavailable", self.describe()));
        }
        self.open = true;
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.describe(),
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.open {
            return Err(anyhow!("{} is not open", self.describe()));
        }
        if let Some(limit) = self.config.frames {
            if self.frame_count >= limit {
                return Ok(None);
            }
        }
        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels();
        Frame::from_rgb(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )
        .map(Some)
    }

    fn release(&mut self) {
        if self.open {
            log::debug!("SyntheticSource: released {}", self.describe());
        }
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            origin: self.describe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_uri_parameters() -> Result<()> {
        let cfg = SyntheticConfig::from_uri(
            "stub://lobby?frames=3&width=16&height=8",
            SyntheticConfig::default(),
        )?;
        assert_eq!(cfg.name, "lobby");
        assert_eq!(cfg.frames, Some(3));
        assert_eq!((cfg.width, cfg.height), (16, 8));
        assert!(!cfg.fail_open);

        let cfg = SyntheticConfig::from_uri("stub://?fail=open", SyntheticConfig::default())?;
        assert_eq!(cfg.name, "synthetic");
        assert!(cfg.fail_open);
        Ok(())
    }

    #[test]
    fn rejects_bad_uris() {
        let defaults = SyntheticConfig::default;
        assert!(SyntheticConfig::from_uri("rtsp://cam", defaults()).is_err());
        assert!(SyntheticConfig::from_uri("stub://x?frames=many", defaults()).is_err());
        assert!(SyntheticConfig::from_uri("stub://x?colour=red", defaults()).is_err());
        assert!(SyntheticConfig::from_uri("stub://x?width=0", defaults()).is_err());
    }

    #[test]
    fn finite_source_ends() -> Result<()> {
        let mut source = SyntheticSource::finite("clip", 4, 4, 2);
        source.open()?;
        assert_eq!(source.next_frame()?.map(|f| f.sequence), Some(1));
        assert_eq!(source.next_frame()?.map(|f| f.sequence), Some(2));
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }

    #[test]
    fn pulling_before_open_is_an_error() {
        let mut source = SyntheticSource::finite("clip", 4, 4, 2);
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn release_is_idempotent() -> Result<()> {
        let mut source = SyntheticSource::new(SyntheticConfig::default());
        source.open()?;
        source.release();
        source.release();
        assert!(!source.is_open());
        Ok(())
    }
}
