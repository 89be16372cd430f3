//! Loop driver: owns every feed, the detector, the outputs and the display.
//!
//! Everything runs on one thread. User commands arrive over a channel and
//! are handled between ticks; each due feed then runs one tick and is
//! re-armed after it returns.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::annotate::no_feed_frame;
use crate::command::Command;
use crate::config::FeedwatchConfig;
use crate::detect::Detector;
use crate::display::DisplaySink;
use crate::feed::{FeedContext, Outputs, RecordMode, StopReason, TickOutcome};
use crate::ingest::{build_source, CaptureSettings, FrameSource, SourceSpec};
use crate::record::RecordingSummary;
use crate::scheduler::{TickScheduler, MAX_FEEDS};

/// Wait used when no feed is armed.
const IDLE_WAIT: Duration = Duration::from_millis(100);

/// Which feeds run the detector each tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionPolicy {
    EveryFeed,
    /// Only the feed shown full-screen (in single view, the only feed).
    FocusedOnly,
    Off,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewPolicy {
    pub detection: DetectionPolicy,
    pub record_mode: RecordMode,
}

impl ViewPolicy {
    pub fn single() -> Self {
        Self {
            detection: DetectionPolicy::EveryFeed,
            record_mode: RecordMode::Auto,
        }
    }

    pub fn grid() -> Self {
        Self {
            detection: DetectionPolicy::FocusedOnly,
            record_mode: RecordMode::Manual,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewMode {
    /// Nothing open; waiting for an `open` command.
    Launcher,
    Single,
    Grid { focused: Option<usize> },
}

#[derive(Clone, Debug)]
pub struct AppSettings {
    pub capture: CaptureSettings,
    pub default_camera: u32,
    pub grid_cameras: Vec<u32>,
    pub single: ViewPolicy,
    pub grid: ViewPolicy,
    pub tick_interval: Duration,
    pub first_tick_delay: Duration,
    pub health_log_interval: Duration,
}

impl AppSettings {
    pub fn from_config(cfg: &FeedwatchConfig) -> Self {
        Self {
            capture: cfg.capture_settings(),
            default_camera: cfg.camera.default_index,
            grid_cameras: cfg.camera.grid.clone(),
            single: cfg.single,
            grid: cfg.grid,
            tick_interval: cfg.schedule.tick_interval,
            first_tick_delay: cfg.schedule.first_tick_delay,
            health_log_interval: cfg.schedule.health_log_interval,
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self::from_config(&FeedwatchConfig::default())
    }
}

/// Files produced during the run.
#[derive(Clone, Debug, Default)]
pub struct AppSummary {
    pub recordings: Vec<RecordingSummary>,
    pub captures: Vec<PathBuf>,
}

pub struct App {
    settings: AppSettings,
    outputs: Outputs,
    detector: Detector,
    display: Box<dyn DisplaySink>,
    feeds: Vec<Option<FeedContext>>,
    scheduler: TickScheduler,
    view: ViewMode,
    quit: bool,
    input_closed: bool,
    summary: AppSummary,
    last_health: Instant,
}

impl App {
    pub fn new(
        settings: AppSettings,
        outputs: Outputs,
        detector: Detector,
        display: Box<dyn DisplaySink>,
    ) -> Self {
        let scheduler = TickScheduler::new(settings.tick_interval, settings.first_tick_delay);
        let mut feeds = Vec::with_capacity(MAX_FEEDS);
        feeds.resize_with(MAX_FEEDS, || None);
        Self {
            settings,
            outputs,
            detector,
            display,
            feeds,
            scheduler,
            view: ViewMode::Launcher,
            quit: false,
            input_closed: false,
            summary: AppSummary::default(),
            last_health: Instant::now(),
        }
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    pub fn feed(&self, slot: usize) -> Option<&FeedContext> {
        self.feeds.get(slot).and_then(Option::as_ref)
    }

    pub fn live_feeds(&self) -> usize {
        self.feeds.iter().flatten().filter(|feed| feed.is_live()).count()
    }

    pub fn summary(&self) -> &AppSummary {
        &self.summary
    }

    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    pub fn should_exit(&self) -> bool {
        self.quit || (self.input_closed && self.live_feeds() == 0)
    }

    /// Apply one user command. Failures are logged, never returned.
    pub fn handle(&mut self, command: Command) {
        log::debug!("command: {:?}", command);
        match command {
            Command::OpenWebcam { index } => {
                let index = index.unwrap_or(self.settings.default_camera);
                self.open_single(SourceSpec::Camera { index });
            }
            Command::OpenVideo { path } => self.open_single(SourceSpec::File { path }),
            Command::OpenGrid { cameras } => {
                let cameras = if cameras.is_empty() {
                    self.settings.grid_cameras.clone()
                } else {
                    cameras
                };
                let specs = cameras
                    .into_iter()
                    .map(|index| SourceSpec::Camera { index })
                    .collect();
                self.open_grid(specs);
            }
            Command::Stop => self.stop_view(),
            Command::CaptureStill => self.capture(),
            Command::ToggleRecord => match self.active_feed().map(FeedContext::is_recording) {
                Some(true) => self.stop_record(),
                Some(false) => self.start_record(),
                None => log::info!("no focused feed to record"),
            },
            Command::StartRecord => self.start_record(),
            Command::StopRecord => self.stop_record(),
            Command::SelectCamera(slot) => self.select(slot),
            Command::ReturnFromFullscreen => {
                if let ViewMode::Grid { focused: Some(_) } = self.view {
                    self.view = ViewMode::Grid { focused: None };
                    self.display.focus(None);
                }
            }
            Command::Quit => {
                log::info!("quit requested");
                self.quit = true;
            }
            Command::EndOfInput => {
                log::debug!("command input closed");
                self.input_closed = true;
            }
        }
    }

    /// Open one source in single view. Ignored unless the launcher is showing.
    pub fn open_single(&mut self, spec: SourceSpec) {
        if self.view != ViewMode::Launcher {
            log::warn!("a view is already open; ignoring open {}", spec.describe());
            return;
        }
        if let Some(source) = self.build(0, &spec) {
            self.open_single_source(source);
        }
    }

    pub fn open_single_source(&mut self, source: Box<dyn FrameSource>) {
        if self.view != ViewMode::Launcher {
            log::warn!("a view is already open; ignoring {}", source.describe());
            return;
        }
        if self.attach(0, source, self.settings.single.record_mode) {
            self.view = ViewMode::Single;
        }
    }

    /// Open up to `MAX_FEEDS` cameras in grid view.
    pub fn open_grid(&mut self, specs: Vec<SourceSpec>) {
        if self.view != ViewMode::Launcher {
            log::warn!("a view is already open; ignoring grid");
            return;
        }
        let sources = specs
            .iter()
            .take(MAX_FEEDS)
            .enumerate()
            .map(|(slot, spec)| self.build(slot, spec))
            .collect();
        self.open_grid_sources(sources);
    }

    /// Grid view over prepared sources; `None` entries show a placeholder.
    pub fn open_grid_sources(&mut self, sources: Vec<Option<Box<dyn FrameSource>>>) {
        if self.view != ViewMode::Launcher {
            log::warn!("a view is already open; ignoring grid");
            return;
        }
        if sources.len() > MAX_FEEDS {
            log::warn!("grid limited to {} feeds, ignoring {} more", MAX_FEEDS, sources.len() - MAX_FEEDS);
        }
        let mode = self.settings.grid.record_mode;
        let mut attached = 0;
        for (slot, source) in sources.into_iter().take(MAX_FEEDS).enumerate() {
            if let Some(source) = source {
                if self.attach(slot, source, mode) {
                    attached += 1;
                }
            }
        }
        if attached > 0 {
            self.view = ViewMode::Grid { focused: None };
            self.display.focus(None);
            log::info!("grid open with {} feed(s)", attached);
        }
    }

    fn build(&mut self, slot: usize, spec: &SourceSpec) -> Option<Box<dyn FrameSource>> {
        match build_source(spec, &self.settings.capture) {
            Ok(source) => Some(source),
            Err(err) => {
                log::error!("cannot open {}: {:#}", spec.describe(), err);
                self.display.placeholder(slot, &no_feed_frame(), &format!("{:#}", err));
                None
            }
        }
    }

    fn attach(&mut self, slot: usize, source: Box<dyn FrameSource>, mode: RecordMode) -> bool {
        let mut feed = FeedContext::new(slot, source, mode);
        match feed.open() {
            Ok(()) => {
                self.feeds[slot] = Some(feed);
                self.scheduler.arm_first(slot, Instant::now());
                true
            }
            Err(err) => {
                log::error!("cannot open {}: {:#}", feed.origin(), err);
                self.display.placeholder(slot, &no_feed_frame(), &format!("{:#}", err));
                false
            }
        }
    }

    /// Slot that capture and manual record act on.
    pub fn active_slot(&self) -> Option<usize> {
        let slot = match self.view {
            ViewMode::Single => 0,
            ViewMode::Grid { focused: Some(slot) } => slot,
            _ => return None,
        };
        self.feed(slot).filter(|feed| feed.is_live()).map(|_| slot)
    }

    fn active_feed(&self) -> Option<&FeedContext> {
        self.active_slot().and_then(|slot| self.feed(slot))
    }

    fn select(&mut self, slot: usize) {
        if !matches!(self.view, ViewMode::Grid { .. }) {
            log::info!("camera selection only applies to the grid");
            return;
        }
        if self.feed(slot).is_some_and(FeedContext::is_live) {
            self.view = ViewMode::Grid {
                focused: Some(slot),
            };
            self.display.focus(Some(slot));
        } else {
            log::info!("camera {} has no live feed", slot + 1);
        }
    }

    fn capture(&mut self) {
        let Some(slot) = self.active_slot() else {
            log::info!("no focused feed to capture");
            return;
        };
        let Some(feed) = self.feeds[slot].as_mut() else {
            return;
        };
        match feed.capture_still(&self.outputs) {
            Ok(Some(path)) => self.summary.captures.push(path),
            Ok(None) => log::info!("feed {}: no frame to capture yet", slot),
            Err(err) => log::error!("feed {}: capture failed: {:#}", slot, err),
        }
    }

    fn start_record(&mut self) {
        let Some(slot) = self.active_slot() else {
            log::info!("no focused feed to record");
            return;
        };
        if let Some(feed) = self.feeds[slot].as_mut() {
            feed.start_recording(&self.outputs);
        }
    }

    fn stop_record(&mut self) {
        let Some(slot) = self.active_slot() else {
            return;
        };
        if let Some(feed) = self.feeds[slot].as_mut() {
            feed.stop_recording();
        }
    }

    fn stop_view(&mut self) {
        match self.view {
            ViewMode::Launcher => log::info!("nothing to stop"),
            ViewMode::Single => self.close_slot(0),
            ViewMode::Grid { focused: Some(slot) } => {
                self.close_slot(slot);
                if matches!(self.view, ViewMode::Grid { .. }) {
                    self.view = ViewMode::Grid { focused: None };
                    self.display.focus(None);
                }
            }
            ViewMode::Grid { focused: None } => {
                for slot in 0..MAX_FEEDS {
                    self.close_slot(slot);
                }
                self.view = ViewMode::Launcher;
            }
        }
    }

    fn close_slot(&mut self, slot: usize) {
        if let Some(feed) = self.feeds[slot].as_mut() {
            feed.stop(StopReason::UserStop);
            self.retire(slot);
        }
    }

    /// Drop a stopped feed and update the view around it.
    fn retire(&mut self, slot: usize) {
        let Some(mut feed) = self.feeds[slot].take() else {
            return;
        };
        feed.stop(StopReason::Shutdown);
        self.summary
            .recordings
            .extend(feed.finished_recordings().iter().cloned());
        self.scheduler.disarm(slot);
        self.display.closed(slot);

        self.view = match self.view {
            ViewMode::Single => ViewMode::Launcher,
            ViewMode::Grid { .. } if self.feeds.iter().all(Option::is_none) => {
                log::info!("grid closed");
                ViewMode::Launcher
            }
            ViewMode::Grid { focused } if focused == Some(slot) => {
                self.display.focus(None);
                ViewMode::Grid { focused: None }
            }
            other => other,
        };
    }

    fn should_detect(&self, slot: usize) -> bool {
        let policy = match self.view {
            ViewMode::Grid { .. } => self.settings.grid.detection,
            _ => self.settings.single.detection,
        };
        match policy {
            DetectionPolicy::EveryFeed => true,
            DetectionPolicy::Off => false,
            DetectionPolicy::FocusedOnly => match self.view {
                ViewMode::Grid { focused } => focused == Some(slot),
                _ => true,
            },
        }
    }

    /// Run every feed whose deadline has passed. Returns how many ticked.
    pub fn run_due(&mut self, now: Instant) -> usize {
        let due = self.scheduler.take_due(now);
        for &slot in &due {
            self.tick_slot(slot);
        }
        due.len()
    }

    fn tick_slot(&mut self, slot: usize) {
        let detect = self.should_detect(slot);
        let Some(feed) = self.feeds[slot].as_mut() else {
            return;
        };
        let detector = if detect { Some(&mut self.detector) } else { None };
        match feed.tick(detector, &self.outputs) {
            TickOutcome::Frame { .. } => {
                if let Some(frame) = feed.current_frame() {
                    self.display.present(slot, frame, feed.is_recording());
                }
                self.scheduler.rearm(slot, Instant::now());
            }
            TickOutcome::Stopped(_) | TickOutcome::Inactive => self.retire(slot),
        }
    }

    /// Drive feeds and commands until quit, or until input has closed and no
    /// feed is left.
    pub fn run(&mut self, commands: &Receiver<Command>) {
        while !self.should_exit() {
            let wait = self
                .scheduler
                .time_until_next(Instant::now())
                .unwrap_or(IDLE_WAIT);
            if self.input_closed {
                thread::sleep(wait);
            } else {
                match commands.recv_timeout(wait) {
                    Ok(command) => self.handle(command),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => self.input_closed = true,
                }
            }
            if self.quit {
                break;
            }
            self.run_due(Instant::now());
            self.log_health(Instant::now());
        }
        self.shutdown();
    }

    fn log_health(&mut self, now: Instant) {
        if now.saturating_duration_since(self.last_health) < self.settings.health_log_interval {
            return;
        }
        self.last_health = now;
        for feed in self.feeds.iter().flatten() {
            let stats = feed.stats();
            log::info!(
                "feed {} health: source={} frames={} recording={} detector_failures={} write_errors={}",
                feed.id(),
                feed.origin(),
                stats.frames,
                feed.is_recording(),
                stats.detector_failures,
                stats.write_errors
            );
        }
    }

    /// Stop every feed, finalising open recordings.
    pub fn shutdown(&mut self) {
        for slot in 0..MAX_FEEDS {
            if self.feeds[slot].is_some() {
                self.retire(slot);
            }
        }
        self.view = ViewMode::Launcher;
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.shutdown();
    }
}
