//! Per-feed capture/record loop.
//!
//! A `FeedContext` owns one frame source, at most one recording session and
//! the latest annotated frame. States:
//!
//! ```text
//! Idle -> Streaming <-> Recording
//!   \         \            /
//!    `---------`-> Stopped <'
//! ```
//!
//! `Recording` holds exactly when a session is open. `Stopped` is terminal:
//! the source is released and any session finalised, once.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::Local;
use serde::Deserialize;

use crate::annotate::annotate;
use crate::capture::capture_still;
use crate::detect::{contains_person, DetectionOutcome, Detector};
use crate::frame::{Frame, FrameSlot};
use crate::ingest::FrameSource;
use crate::record::{RecordingSession, RecordingSummary, SinkFactory};
use crate::storage::OutputLayout;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Streaming,
    Recording,
    Stopped,
}

/// How recordings start and stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMode {
    /// A session is open exactly while a person is detected.
    Auto,
    /// Sessions follow explicit start/stop actions.
    Manual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    PullFailed,
    OpenFailed,
    UserStop,
    Shutdown,
}

/// Where a feed writes its files.
pub struct Outputs {
    pub layout: OutputLayout,
    pub sinks: Box<dyn SinkFactory>,
    pub record_fps: f64,
    /// Recording container extension, e.g. `mp4`.
    pub container: String,
    /// Capture image extension, e.g. `png`.
    pub capture_format: String,
}

/// Result of one tick.
#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    /// Feed not streaming; nothing happened.
    Inactive,
    Frame {
        detections: usize,
        person: bool,
        detector_failed: bool,
        recording: bool,
    },
    Stopped(StopReason),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub ticks: u64,
    pub frames: u64,
    pub person_ticks: u64,
    pub detector_failures: u64,
    pub write_errors: u64,
    pub captures: u64,
}

pub struct FeedContext {
    id: usize,
    origin: String,
    source: Option<Box<dyn FrameSource>>,
    state: FeedState,
    mode: RecordMode,
    recording: Option<RecordingSession>,
    slot: FrameSlot,
    stats: FeedStats,
    stop_reason: Option<StopReason>,
    finished: Vec<RecordingSummary>,
}

impl FeedContext {
    pub fn new(id: usize, source: Box<dyn FrameSource>, mode: RecordMode) -> Self {
        Self {
            id,
            origin: source.describe(),
            source: Some(source),
            state: FeedState::Idle,
            mode,
            recording: None,
            slot: FrameSlot::new(),
            stats: FeedStats::default(),
            stop_reason: None,
            finished: Vec::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn state(&self) -> FeedState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, FeedState::Streaming | FeedState::Recording)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Latest annotated frame.
    pub fn current_frame(&self) -> Option<&Frame> {
        self.slot.latest()
    }

    /// Recordings finalised so far, oldest first.
    pub fn finished_recordings(&self) -> &[RecordingSummary] {
        &self.finished
    }

    /// Idle -> Streaming. On failure the feed is Stopped and the error returned.
    pub fn open(&mut self) -> Result<()> {
        if self.state != FeedState::Idle {
            return Err(anyhow!("feed {} already opened", self.id));
        }
        let source = self
            .source
            .as_mut()
            .ok_or_else(|| anyhow!("feed {} has no source", self.id))?;
        match source.open() {
            Ok(()) => {
                self.state = FeedState::Streaming;
                log::info!("feed {}: streaming from {}", self.id, self.origin);
                Ok(())
            }
            Err(err) => {
                self.stop(StopReason::OpenFailed);
                Err(err)
            }
        }
    }

    /// One pull-detect-annotate-record cycle. Never returns an error: every
    /// failure is contained in this feed.
    pub fn tick(&mut self, detector: Option<&mut Detector>, outputs: &Outputs) -> TickOutcome {
        if !self.is_live() {
            return TickOutcome::Inactive;
        }
        self.stats.ticks += 1;

        let pulled = match self.source.as_mut() {
            Some(source) => source.next_frame(),
            None => Ok(None),
        };
        let mut frame = match pulled {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("feed {}: end of stream ({})", self.id, self.origin);
                self.stop(StopReason::EndOfStream);
                return TickOutcome::Stopped(StopReason::EndOfStream);
            }
            Err(err) => {
                log::warn!("feed {}: pull failed, closing: {:#}", self.id, err);
                self.stop(StopReason::PullFailed);
                return TickOutcome::Stopped(StopReason::PullFailed);
            }
        };
        self.stats.frames += 1;

        let mut detector_failed = false;
        let detections = match detector.map(|d| d.detect(&frame)) {
            Some(outcome) => {
                if let DetectionOutcome::Failed(reason) = &outcome {
                    detector_failed = true;
                    self.stats.detector_failures += 1;
                    log::debug!("feed {}: {}", self.id, reason);
                }
                outcome.into_detections()
            }
            None => Vec::new(),
        };
        let person = contains_person(&detections);
        if person {
            self.stats.person_ticks += 1;
        }

        annotate(&mut frame, &detections);

        if self.mode == RecordMode::Auto {
            if person && self.recording.is_none() {
                self.open_session(&frame, outputs);
            } else if !person && self.recording.is_some() {
                self.stop_recording();
            }
        }

        if let Some(session) = self.recording.as_mut() {
            if let Err(err) = session.write(&frame) {
                self.stats.write_errors += 1;
                log::warn!("feed {}: recording write failed: {:#}", self.id, err);
            }
        }

        self.slot.store(frame);

        TickOutcome::Frame {
            detections: detections.len(),
            person,
            detector_failed,
            recording: self.recording.is_some(),
        }
    }

    /// Open a session sized after the latest frame. No-op (returns false) in
    /// auto mode, when already recording, not live, or before the first frame.
    pub fn start_recording(&mut self, outputs: &Outputs) -> bool {
        if self.mode == RecordMode::Auto {
            log::info!("feed {}: recording is automatic in this view", self.id);
            return false;
        }
        if !self.is_live() || self.recording.is_some() {
            return false;
        }
        let Some(frame) = self.slot.latest().cloned() else {
            log::info!("feed {}: no frame yet, recording not started", self.id);
            return false;
        };
        self.open_session(&frame, outputs)
    }

    fn open_session(&mut self, frame: &Frame, outputs: &Outputs) -> bool {
        let path = outputs.layout.recording_path(Local::now(), &outputs.container);
        match RecordingSession::open(outputs.sinks.as_ref(), path, frame, outputs.record_fps) {
            Ok(session) => {
                log::info!("[rec start] feed {}: {}", self.id, session.path().display());
                self.recording = Some(session);
                self.state = FeedState::Recording;
                true
            }
            Err(err) => {
                log::error!("feed {}: cannot start recording: {:#}", self.id, err);
                false
            }
        }
    }

    /// Finalise the open session, if any.
    pub fn stop_recording(&mut self) -> Option<RecordingSummary> {
        let session = self.recording.take()?;
        if self.state == FeedState::Recording {
            self.state = FeedState::Streaming;
        }
        let path = session.path().to_path_buf();
        let frames_written = session.frames_written();
        let write_errors = session.write_errors();
        let (width, height) = session.dimensions();
        match session.finalize() {
            Ok(summary) => {
                log::info!(
                    "[rec stop] feed {}: {} ({} frames)",
                    self.id,
                    summary.path.display(),
                    summary.frames_written
                );
                self.finished.push(summary.clone());
                Some(summary)
            }
            Err(err) => {
                log::error!("feed {}: {:#}", self.id, err);
                let summary = RecordingSummary {
                    path,
                    frames_written,
                    write_errors,
                    width,
                    height,
                };
                self.finished.push(summary.clone());
                Some(summary)
            }
        }
    }

    /// Save the latest annotated frame. `Ok(None)` when there is none yet.
    pub fn capture_still(&mut self, outputs: &Outputs) -> Result<Option<PathBuf>> {
        let saved = capture_still(&self.slot, &outputs.layout, &outputs.capture_format)?;
        if let Some(path) = &saved {
            self.stats.captures += 1;
            log::info!("[capture] feed {}: {}", self.id, path.display());
        }
        Ok(saved)
    }

    /// Any state -> Stopped. Idempotent.
    pub fn stop(&mut self, reason: StopReason) {
        if self.state == FeedState::Stopped {
            return;
        }
        self.stop_recording();
        if let Some(mut source) = self.source.take() {
            source.release();
        }
        self.state = FeedState::Stopped;
        self.stop_reason = Some(reason);
        log::info!("feed {}: stopped ({:?})", self.id, reason);
    }
}

impl Drop for FeedContext {
    fn drop(&mut self) {
        self.stop(StopReason::Shutdown);
    }
}
