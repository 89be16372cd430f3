use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app::{DetectionPolicy, ViewPolicy};
use crate::capture::CAPTURE_FORMATS;
use crate::command::parse_camera_list;
use crate::detect::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::feed::RecordMode;
use crate::ingest::CaptureSettings;
use crate::record::{FfmpegSettings, DEFAULT_RECORD_FPS};
use crate::scheduler::MAX_FEEDS;
use crate::storage::OutputLayout;

const DEFAULT_RECORDINGS_DIR: &str = "recordings";
const DEFAULT_CAPTURES_DIR: &str = "captures";
const DEFAULT_CONTAINER: &str = "mp4";
const DEFAULT_CAPTURE_FORMAT: &str = "png";
const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
const DEFAULT_CAMERA_INDEX: u32 = 0;
const DEFAULT_GRID_CAMERAS: [u32; MAX_FEEDS] = [0, 1, 2, 3];
const DEFAULT_DEVICE_TEMPLATE: &str = "/dev/video{index}";
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_MODEL_PATH: &str = "yolov8n.onnx";
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const DEFAULT_TICK_MS: u64 = 10;
const DEFAULT_FIRST_TICK_MS: u64 = 50;
const DEFAULT_HEALTH_LOG_SECS: u64 = 30;

const KNOWN_CONTAINERS: &[&str] = &["mp4", "avi", "mkv", "mov", "webm"];

#[derive(Debug, Deserialize, Default)]
struct FeedwatchConfigFile {
    recordings_dir: Option<PathBuf>,
    captures_dir: Option<PathBuf>,
    recording: Option<RecordingConfigFile>,
    capture: Option<CaptureConfigFile>,
    camera: Option<CameraConfigFile>,
    model: Option<ModelConfigFile>,
    schedule: Option<ScheduleConfigFile>,
    single: Option<ViewConfigFile>,
    grid: Option<ViewConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct RecordingConfigFile {
    fps: Option<f64>,
    container: Option<String>,
    codec: Option<String>,
    ffmpeg_path: Option<String>,
    encode: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    format: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    default_index: Option<u32>,
    grid: Option<Vec<u32>>,
    device_template: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    backend: Option<ModelBackendKind>,
    path: Option<PathBuf>,
    url: Option<String>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ScheduleConfigFile {
    tick_ms: Option<u64>,
    first_tick_ms: Option<u64>,
    health_log_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ViewConfigFile {
    detection: Option<DetectionPolicy>,
    record_mode: Option<RecordMode>,
}

#[derive(Debug, Clone)]
pub struct FeedwatchConfig {
    pub recordings_dir: PathBuf,
    pub captures_dir: PathBuf,
    pub recording: RecordingSettings,
    pub capture_format: String,
    pub camera: CameraSettings,
    pub model: ModelSettings,
    pub schedule: ScheduleSettings,
    pub single: ViewPolicy,
    pub grid: ViewPolicy,
}

#[derive(Debug, Clone)]
pub struct RecordingSettings {
    pub fps: f64,
    pub container: String,
    pub codec: Option<String>,
    pub ffmpeg_path: String,
    /// `false` keeps frame manifests instead of spawning the encoder.
    pub encode: bool,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub default_index: u32,
    pub grid: Vec<u32>,
    pub device_template: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelBackendKind {
    Tract,
    Stub,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub backend: ModelBackendKind,
    pub path: PathBuf,
    pub url: Option<String>,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub tick_interval: Duration,
    pub first_tick_delay: Duration,
    pub health_log_interval: Duration,
}

impl FeedwatchConfig {
    /// Load from the file named by `FEEDWATCH_CONFIG` (if any), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Like `load`, with an explicit file taking precedence over `FEEDWATCH_CONFIG`.
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("FEEDWATCH_CONFIG").ok().map(PathBuf::from));
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: FeedwatchConfigFile) -> Self {
        let recording = file.recording.unwrap_or_default();
        let camera = file.camera.unwrap_or_default();
        let model = file.model.unwrap_or_default();
        let schedule = file.schedule.unwrap_or_default();
        let single = file.single.unwrap_or_default();
        let grid = file.grid.unwrap_or_default();
        let single_default = ViewPolicy::single();
        let grid_default = ViewPolicy::grid();

        Self {
            recordings_dir: file
                .recordings_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RECORDINGS_DIR)),
            captures_dir: file
                .captures_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CAPTURES_DIR)),
            recording: RecordingSettings {
                fps: recording.fps.unwrap_or(DEFAULT_RECORD_FPS),
                container: recording
                    .container
                    .unwrap_or_else(|| DEFAULT_CONTAINER.to_string()),
                codec: recording.codec,
                ffmpeg_path: recording
                    .ffmpeg_path
                    .unwrap_or_else(|| DEFAULT_FFMPEG_PATH.to_string()),
                encode: recording.encode.unwrap_or(true),
            },
            capture_format: file
                .capture
                .and_then(|capture| capture.format)
                .unwrap_or_else(|| DEFAULT_CAPTURE_FORMAT.to_string()),
            camera: CameraSettings {
                default_index: camera.default_index.unwrap_or(DEFAULT_CAMERA_INDEX),
                grid: camera
                    .grid
                    .unwrap_or_else(|| DEFAULT_GRID_CAMERAS.to_vec()),
                device_template: camera
                    .device_template
                    .unwrap_or_else(|| DEFAULT_DEVICE_TEMPLATE.to_string()),
                width: camera.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
                target_fps: camera.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
            },
            model: ModelSettings {
                backend: model.backend.unwrap_or_else(default_backend),
                path: model
                    .path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
                url: model.url,
                input_size: model.input_size.unwrap_or(DEFAULT_MODEL_INPUT),
                confidence_threshold: model
                    .confidence_threshold
                    .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
                iou_threshold: model.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            },
            schedule: ScheduleSettings {
                tick_interval: Duration::from_millis(schedule.tick_ms.unwrap_or(DEFAULT_TICK_MS)),
                first_tick_delay: Duration::from_millis(
                    schedule.first_tick_ms.unwrap_or(DEFAULT_FIRST_TICK_MS),
                ),
                health_log_interval: Duration::from_secs(
                    schedule.health_log_secs.unwrap_or(DEFAULT_HEALTH_LOG_SECS),
                ),
            },
            single: ViewPolicy {
                detection: single.detection.unwrap_or(single_default.detection),
                record_mode: single.record_mode.unwrap_or(single_default.record_mode),
            },
            grid: ViewPolicy {
                detection: grid.detection.unwrap_or(grid_default.detection),
                record_mode: grid.record_mode.unwrap_or(grid_default.record_mode),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("FEEDWATCH_RECORDINGS_DIR") {
            if !dir.trim().is_empty() {
                self.recordings_dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var("FEEDWATCH_CAPTURES_DIR") {
            if !dir.trim().is_empty() {
                self.captures_dir = PathBuf::from(dir);
            }
        }
        if let Ok(index) = std::env::var("FEEDWATCH_CAMERA_INDEX") {
            self.camera.default_index = index
                .trim()
                .parse()
                .map_err(|_| anyhow!("FEEDWATCH_CAMERA_INDEX must be a camera number"))?;
        }
        if let Ok(cameras) = std::env::var("FEEDWATCH_GRID_CAMERAS") {
            let parsed = parse_camera_list(&cameras)?;
            if !parsed.is_empty() {
                self.camera.grid = parsed;
            }
        }
        if let Ok(path) = std::env::var("FEEDWATCH_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model.path = PathBuf::from(path);
            }
        }
        if let Ok(url) = std::env::var("FEEDWATCH_MODEL_URL") {
            if !url.trim().is_empty() {
                self.model.url = Some(url);
            }
        }
        if let Ok(tick) = std::env::var("FEEDWATCH_TICK_MS") {
            let millis: u64 = tick
                .trim()
                .parse()
                .map_err(|_| anyhow!("FEEDWATCH_TICK_MS must be an integer number of milliseconds"))?;
            self.schedule.tick_interval = Duration::from_millis(millis);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if !self.recording.fps.is_finite() || self.recording.fps <= 0.0 {
            return Err(anyhow!("recording fps must be greater than zero"));
        }
        self.recording.container = self.recording.container.to_lowercase();
        if !KNOWN_CONTAINERS.contains(&self.recording.container.as_str()) {
            return Err(anyhow!(
                "unknown recording container '{}' (expected one of {})",
                self.recording.container,
                KNOWN_CONTAINERS.join(", ")
            ));
        }
        self.capture_format = self.capture_format.to_lowercase();
        if !CAPTURE_FORMATS.contains(&self.capture_format.as_str()) {
            return Err(anyhow!(
                "unknown capture format '{}' (expected one of {})",
                self.capture_format,
                CAPTURE_FORMATS.join(", ")
            ));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera width and height must be greater than zero"));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be greater than zero"));
        }
        if self.camera.grid.is_empty() || self.camera.grid.len() > MAX_FEEDS {
            return Err(anyhow!("grid needs between 1 and {} cameras", MAX_FEEDS));
        }
        if !self.camera.device_template.contains("{index}") {
            return Err(anyhow!("camera device_template must contain {{index}}"));
        }
        for (name, value) in [
            ("confidence_threshold", self.model.confidence_threshold),
            ("iou_threshold", self.model.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("model {} must be within [0, 1]", name));
            }
        }
        if self.model.input_size == 0 || self.model.input_size % 32 != 0 {
            return Err(anyhow!("model input_size must be a positive multiple of 32"));
        }
        if self.schedule.tick_interval.is_zero() {
            return Err(anyhow!("tick interval must be greater than zero"));
        }
        Ok(())
    }

    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.recordings_dir, &self.captures_dir)
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            device_template: self.camera.device_template.clone(),
            width: self.camera.width,
            height: self.camera.height,
            target_fps: self.camera.target_fps,
        }
    }

    pub fn ffmpeg_settings(&self) -> FfmpegSettings {
        FfmpegSettings {
            ffmpeg_path: self.recording.ffmpeg_path.clone(),
            codec: self.recording.codec.clone(),
        }
    }
}

impl Default for FeedwatchConfig {
    fn default() -> Self {
        Self::from_file(FeedwatchConfigFile::default())
    }
}

fn default_backend() -> ModelBackendKind {
    if cfg!(feature = "backend-tract") {
        ModelBackendKind::Tract
    } else {
        ModelBackendKind::Stub
    }
}

fn read_config_file(path: &Path) -> Result<FeedwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let mut cfg = FeedwatchConfig::default();
        cfg.validate().expect("defaults are valid");
        assert_eq!(cfg.recordings_dir, PathBuf::from("recordings"));
        assert_eq!(cfg.recording.fps, 20.0);
        assert_eq!(cfg.camera.grid, vec![0, 1, 2, 3]);
        assert_eq!(cfg.single.detection, DetectionPolicy::EveryFeed);
        assert_eq!(cfg.grid.record_mode, RecordMode::Manual);
        assert_eq!(cfg.schedule.first_tick_delay, Duration::from_millis(50));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut cfg = FeedwatchConfig::default();
        cfg.model.confidence_threshold = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = FeedwatchConfig::default();
        cfg.recording.fps = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = FeedwatchConfig::default();
        cfg.capture_format = "bmp".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = FeedwatchConfig::default();
        cfg.camera.width = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn normalizes_format_case() {
        let mut cfg = FeedwatchConfig::default();
        cfg.recording.container = "MP4".to_string();
        cfg.capture_format = "JPG".to_string();
        cfg.validate().expect("valid");
        assert_eq!(cfg.recording.container, "mp4");
        assert_eq!(cfg.capture_format, "jpg");
    }
}
