use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use feedwatch::config::{FeedwatchConfig, ModelBackendKind};
use feedwatch::{DetectionPolicy, RecordMode};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "FEEDWATCH_CONFIG",
        "FEEDWATCH_RECORDINGS_DIR",
        "FEEDWATCH_CAPTURES_DIR",
        "FEEDWATCH_CAMERA_INDEX",
        "FEEDWATCH_GRID_CAMERAS",
        "FEEDWATCH_MODEL_PATH",
        "FEEDWATCH_MODEL_URL",
        "FEEDWATCH_TICK_MS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "recordings_dir": "/srv/feedwatch/rec",
        "captures_dir": "/srv/feedwatch/cap",
        "recording": { "fps": 15, "container": "avi", "codec": "mjpeg" },
        "capture": { "format": "jpg" },
        "camera": { "default_index": 1, "grid": [1, 3], "width": 1280, "height": 720 },
        "model": { "backend": "stub", "confidence_threshold": 0.4 },
        "schedule": { "tick_ms": 25, "first_tick_ms": 100 },
        "grid": { "detection": "every_feed", "record_mode": "auto" }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("FEEDWATCH_CONFIG", file.path());
    std::env::set_var("FEEDWATCH_CAMERA_INDEX", "2");
    std::env::set_var("FEEDWATCH_MODEL_PATH", "/models/yolov8s.onnx");
    std::env::set_var("FEEDWATCH_TICK_MS", "40");

    let cfg = FeedwatchConfig::load().expect("load config");

    assert_eq!(cfg.recordings_dir, PathBuf::from("/srv/feedwatch/rec"));
    assert_eq!(cfg.captures_dir, PathBuf::from("/srv/feedwatch/cap"));
    assert_eq!(cfg.recording.fps, 15.0);
    assert_eq!(cfg.recording.container, "avi");
    assert_eq!(cfg.recording.codec.as_deref(), Some("mjpeg"));
    assert_eq!(cfg.capture_format, "jpg");
    assert_eq!(cfg.camera.default_index, 2);
    assert_eq!(cfg.camera.grid, vec![1, 3]);
    assert_eq!(cfg.camera.width, 1280);
    assert_eq!(cfg.model.backend, ModelBackendKind::Stub);
    assert_eq!(cfg.model.path, PathBuf::from("/models/yolov8s.onnx"));
    assert_eq!(cfg.model.confidence_threshold, 0.4);
    assert_eq!(cfg.schedule.tick_interval, Duration::from_millis(40));
    assert_eq!(cfg.schedule.first_tick_delay, Duration::from_millis(100));
    assert_eq!(cfg.single.detection, DetectionPolicy::EveryFeed);
    assert_eq!(cfg.single.record_mode, RecordMode::Auto);
    assert_eq!(cfg.grid.detection, DetectionPolicy::EveryFeed);
    assert_eq!(cfg.grid.record_mode, RecordMode::Auto);

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
recordings_dir = "out/rec"

[recording]
fps = 10.0
encode = false

[model]
backend = "stub"
url = "https://models.example.invalid/yolov8n.onnx"

[single]
detection = "off"
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let cfg = FeedwatchConfig::load_with(Some(file.path())).expect("load config");
    assert_eq!(cfg.recordings_dir, PathBuf::from("out/rec"));
    assert_eq!(cfg.captures_dir, PathBuf::from("captures"));
    assert_eq!(cfg.recording.fps, 10.0);
    assert!(!cfg.recording.encode);
    assert_eq!(
        cfg.model.url.as_deref(),
        Some("https://models.example.invalid/yolov8n.onnx")
    );
    assert_eq!(cfg.single.detection, DetectionPolicy::Off);

    clear_env();
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = FeedwatchConfig::load().expect("load config");
    assert_eq!(cfg.recordings_dir, PathBuf::from("recordings"));
    assert_eq!(cfg.captures_dir, PathBuf::from("captures"));
    assert_eq!(cfg.recording.container, "mp4");
    assert_eq!(cfg.capture_format, "png");
    assert_eq!(cfg.camera.default_index, 0);
    assert_eq!(cfg.camera.device_template, "/dev/video{index}");
    assert_eq!(cfg.schedule.tick_interval, Duration::from_millis(10));
    assert_eq!(cfg.grid.detection, DetectionPolicy::FocusedOnly);
    assert_eq!(cfg.grid.record_mode, RecordMode::Manual);

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{ "model": { "iou_threshold": 2.0 } }"#)
        .expect("write config");
    std::env::set_var("FEEDWATCH_CONFIG", file.path());
    let err = FeedwatchConfig::load().unwrap_err();
    assert!(err.to_string().contains("iou_threshold"));

    clear_env();
    std::env::set_var("FEEDWATCH_TICK_MS", "soon");
    assert!(FeedwatchConfig::load().is_err());

    clear_env();
    std::env::set_var("FEEDWATCH_GRID_CAMERAS", "0,1,2,3,4");
    assert!(FeedwatchConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_unreadable_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ not json").expect("write config");
    let err = FeedwatchConfig::load_with(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));

    let missing = file.path().with_extension("missing");
    let err = FeedwatchConfig::load_with(Some(&missing)).unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));

    clear_env();
}
