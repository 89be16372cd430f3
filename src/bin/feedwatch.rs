//! feedwatch - live detection overlays with person-triggered recording
//!
//! This binary:
//! 1. Loads configuration and creates the output directories
//! 2. Loads the detector once (fetching weights if configured)
//! 3. Opens the requested view (webcam, video file, camera grid or launcher)
//! 4. Reads commands from stdin until quit or until every feed has ended

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use feedwatch::command::HELP;
use feedwatch::{
    build_detector, App, AppSettings, Command, ConsoleDisplay, FeedwatchConfig,
    FfmpegPipeFactory, MemorySinkFactory, Outputs, SinkFactory, UiMode,
};

#[derive(Parser, Debug)]
#[command(name = "feedwatch", version, about)]
struct Args {
    /// Config file (JSON, or TOML by extension). Overrides FEEDWATCH_CONFIG.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Keep frame manifests instead of encoding recordings with ffmpeg.
    #[arg(long)]
    no_encode: bool,

    /// UI mode for the status lines (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE", env = "FEEDWATCH_UI")]
    ui: String,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Single view on a camera.
    Webcam {
        #[arg(long)]
        index: Option<u32>,
    },
    /// Single view on a local video file.
    Video { path: String },
    /// Up to four cameras side by side.
    Grid {
        #[arg(long, value_delimiter = ',')]
        cameras: Vec<u32>,
    },
    /// Start idle and wait for `open ...` commands.
    Launcher,
}

impl Mode {
    fn initial_command(self) -> Option<Command> {
        match self {
            Mode::Webcam { index } => Some(Command::OpenWebcam { index }),
            Mode::Video { path } => Some(Command::OpenVideo { path }),
            Mode::Grid { cameras } => Some(Command::OpenGrid { cameras }),
            Mode::Launcher => None,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = FeedwatchConfig::load_with(args.config.as_deref())?;

    let layout = config.layout();
    layout.ensure()?;
    let detector = build_detector(&config.model)?;

    let sinks: Box<dyn SinkFactory> = if args.no_encode || !config.recording.encode {
        log::warn!("recording encoder disabled; recordings are frame manifests");
        Box::new(MemorySinkFactory::new())
    } else {
        Box::new(FfmpegPipeFactory::new(config.ffmpeg_settings()))
    };
    let outputs = Outputs {
        layout,
        sinks,
        record_fps: config.recording.fps,
        container: config.recording.container.clone(),
        capture_format: config.capture_format.clone(),
    };

    let is_tty = std::io::stderr().is_terminal();
    let display = ConsoleDisplay::new(UiMode::from_flag(Some(&args.ui)), is_tty);
    let mut app = App::new(
        AppSettings::from_config(&config),
        outputs,
        detector,
        Box::new(display),
    );

    let (tx, rx) = mpsc::channel();
    let signal_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = signal_tx.send(Command::Quit);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    match args.mode.unwrap_or(Mode::Launcher).initial_command() {
        Some(command) => {
            let _ = tx.send(command);
        }
        None => eprintln!("{}", HELP),
    }

    thread::spawn(move || read_commands(tx));

    log::info!(
        "feedwatch running; recordings in {}, captures in {}",
        config.recordings_dir.display(),
        config.captures_dir.display()
    );
    app.run(&rx);

    let summary = app.summary();
    for recording in &summary.recordings {
        log::info!(
            "recording {} ({} frames)",
            recording.path.display(),
            recording.frames_written
        );
    }
    log::info!(
        "feedwatch stopped: {} recording(s), {} capture(s)",
        summary.recordings.len(),
        summary.captures.len()
    );
    Ok(())
}

fn read_commands(tx: mpsc::Sender<Command>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines().map_while(|line| line.ok()) {
        if line.trim().is_empty() {
            continue;
        }
        match Command::parse(&line) {
            Ok(command) => {
                if tx.send(command).is_err() {
                    return;
                }
            }
            Err(err) => eprintln!("{}\n{}", err, HELP),
        }
    }
    let _ = tx.send(Command::EndOfInput);
}
