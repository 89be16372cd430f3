//! feedwatch
//!
//! Live object-detection overlays on camera and video feeds, with
//! person-triggered recording.
//!
//! # Architecture
//!
//! One thread drives everything. Each open feed is a [`FeedContext`] ticked
//! by the [`App`] loop: pull a frame, run the detector, draw labelled boxes,
//! decide whether a recording should be open, append the frame to it, show
//! the result. Up to [`MAX_FEEDS`] feeds run side by side in grid view; one
//! feed ending or failing never touches another.
//!
//! # Module Structure
//!
//! - `frame`: RGB24 frames and the latest-frame slot
//! - `ingest`: camera, file and synthetic `stub://` sources
//! - `detect`: detector backends, label classes, weights bootstrap
//! - `annotate`: box and caption drawing
//! - `record` / `capture` / `storage`: recordings, stills and file naming
//! - `feed`: per-feed state machine
//! - `scheduler` / `app`: tick deadlines and the loop driver
//! - `command` / `display`: terminal input and status output
//! - `config`: file and environment configuration

pub mod annotate;
pub mod app;
pub mod capture;
pub mod command;
pub mod config;
pub mod detect;
pub mod display;
pub mod feed;
pub mod frame;
pub mod ingest;
pub mod record;
pub mod scheduler;
pub mod storage;

pub use app::{App, AppSettings, AppSummary, DetectionPolicy, ViewMode, ViewPolicy};
pub use command::Command;
pub use config::FeedwatchConfig;
pub use detect::{
    build_detector, contains_person, Detection, DetectionOutcome, Detector, DetectorBackend,
    LabelClass, StubBackend,
};
pub use display::{ConsoleDisplay, DisplaySink, NullDisplay, UiMode};
pub use feed::{FeedContext, FeedState, Outputs, RecordMode, StopReason, TickOutcome};
pub use frame::{Frame, FrameSlot};
pub use ingest::{build_source, CaptureSettings, FrameSource, SourceSpec, SyntheticSource};
pub use record::{
    FfmpegPipeFactory, MemorySinkFactory, RecordingSession, RecordingSummary, SinkFactory,
};
pub use scheduler::{TickScheduler, MAX_FEEDS};
pub use storage::OutputLayout;
