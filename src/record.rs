//! Recording sessions.
//!
//! A `RecordingSession` owns one output file. Its frame size is fixed by the
//! first frame; frames of a different size are rejected. Finalising flushes
//! and closes the sink (for FFmpeg this writes the container trailer), and
//! happens exactly once, on `finalize` or on drop.
//!
//! Sinks:
//! - `FfmpegPipeFactory`: pipes raw RGB24 frames into an `ffmpeg` child.
//! - `MemorySinkFactory`: keeps frame sequence numbers in memory and writes a
//!   `.frames` text manifest next to the would-be video on finish (dry runs,
//!   tests).

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{anyhow, Context, Result};

use crate::frame::Frame;

/// Default recording frame rate.
pub const DEFAULT_RECORD_FPS: f64 = 20.0;

/// Destination for the frames of one recording.
pub trait RecordingSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close. Called exactly once.
    fn finish(&mut self) -> Result<()>;
}

/// Opens sinks for new recordings.
pub trait SinkFactory {
    fn open(&self, path: &Path, width: u32, height: u32, fps: f64) -> Result<Box<dyn RecordingSink>>;
}

// ----------------------------------------------------------------------------
// RecordingSession
// ----------------------------------------------------------------------------

/// Summary of a finalised recording.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordingSummary {
    pub path: PathBuf,
    pub frames_written: u64,
    pub write_errors: u64,
    pub width: u32,
    pub height: u32,
}

pub struct RecordingSession {
    path: PathBuf,
    width: u32,
    height: u32,
    frames_written: u64,
    write_errors: u64,
    sink: Option<Box<dyn RecordingSink>>,
}

impl RecordingSession {
    /// Open a session sized after `first`. The frame itself is not written.
    pub fn open(factory: &dyn SinkFactory, path: PathBuf, first: &Frame, fps: f64) -> Result<Self> {
        let (width, height) = first.dimensions();
        let sink = factory
            .open(&path, width, height, fps)
            .with_context(|| format!("open recording {}", path.display()))?;
        Ok(Self {
            path,
            width,
            height,
            frames_written: 0,
            write_errors: 0,
            sink: Some(sink),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn write_errors(&self) -> u64 {
        self.write_errors
    }

    /// Append one frame. Failures are counted and returned to the caller.
    pub fn write(&mut self, frame: &Frame) -> Result<()> {
        let result = self.try_write(frame);
        match result {
            Ok(()) => self.frames_written += 1,
            Err(_) => self.write_errors += 1,
        }
        result
    }

    fn try_write(&mut self, frame: &Frame) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(anyhow!(
                "frame is {}x{} but recording {} is {}x{}",
                frame.width,
                frame.height,
                self.path.display(),
                self.width,
                self.height
            ));
        }
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| anyhow!("recording {} already finalized", self.path.display()))?;
        sink.write_frame(frame)
    }

    /// Flush and close the output.
    pub fn finalize(mut self) -> Result<RecordingSummary> {
        self.finish_sink()?;
        Ok(self.summary())
    }

    fn summary(&self) -> RecordingSummary {
        RecordingSummary {
            path: self.path.clone(),
            frames_written: self.frames_written,
            write_errors: self.write_errors,
            width: self.width,
            height: self.height,
        }
    }

    fn finish_sink(&mut self) -> Result<()> {
        match self.sink.take() {
            Some(mut sink) => sink
                .finish()
                .with_context(|| format!("finalize recording {}", self.path.display())),
            None => Ok(()),
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if self.sink.is_some() {
            if let Err(err) = self.finish_sink() {
                log::error!("{:#}", err);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// FFmpeg pipe sink
// ----------------------------------------------------------------------------

/// Encoder settings for the FFmpeg sink.
#[derive(Clone, Debug)]
pub struct FfmpegSettings {
    pub ffmpeg_path: String,
    /// Video codec; `None` picks one from the container.
    pub codec: Option<String>,
}

impl Default for FfmpegSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            codec: None,
        }
    }
}

/// Codec used when none is configured.
pub fn default_codec_for(container: &str) -> &'static str {
    match container {
        "webm" => "libvpx-vp9",
        "mkv" => "libx264",
        _ => "mpeg4",
    }
}

/// Build the `ffmpeg` invocation that encodes raw RGB24 from stdin into `output`.
pub fn build_ffmpeg_command(
    settings: &FfmpegSettings,
    output: &Path,
    width: u32,
    height: u32,
    fps: f64,
) -> Command {
    let container = output
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("mp4")
        .to_lowercase();
    let codec = settings
        .codec
        .clone()
        .unwrap_or_else(|| default_codec_for(&container).to_string());

    let mut cmd = Command::new(&settings.ffmpeg_path);
    cmd.arg("-y").arg("-loglevel").arg("error");
    cmd.arg("-f").arg("rawvideo");
    cmd.arg("-pix_fmt").arg("rgb24");
    cmd.arg("-s").arg(format!("{}x{}", width, height));
    cmd.arg("-r").arg(format!("{}", fps));
    cmd.arg("-i").arg("-");
    cmd.arg("-an");
    cmd.arg("-c:v").arg(codec);
    // yuv420p needs even dimensions.
    cmd.arg("-vf").arg("pad=ceil(iw/2)*2:ceil(ih/2)*2");
    cmd.arg("-pix_fmt").arg("yuv420p");
    cmd.arg(output);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    cmd
}

pub struct FfmpegPipeFactory {
    settings: FfmpegSettings,
}

impl FfmpegPipeFactory {
    pub fn new(settings: FfmpegSettings) -> Self {
        Self { settings }
    }
}

impl SinkFactory for FfmpegPipeFactory {
    fn open(&self, path: &Path, width: u32, height: u32, fps: f64) -> Result<Box<dyn RecordingSink>> {
        let mut child = build_ffmpeg_command(&self.settings, path, width, height, fps)
            .spawn()
            .with_context(|| format!("spawn {}", self.settings.ffmpeg_path))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("ffmpeg stdin unavailable"))?;
        if let Some(stderr) = child.stderr.take() {
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(|line| line.ok()) {
                    log::warn!("[ffmpeg] {}", line);
                }
            });
        }
        Ok(Box::new(FfmpegPipeSink {
            child,
            stdin: Some(stdin),
        }))
    }
}

struct FfmpegPipeSink {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl RecordingSink for FfmpegPipeSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| anyhow!("ffmpeg input already closed"))?;
        stdin
            .write_all(frame.pixels())
            .context("write frame to ffmpeg")
    }

    fn finish(&mut self) -> Result<()> {
        // Closing stdin lets ffmpeg write the trailer and exit.
        drop(self.stdin.take());
        let status = self.child.wait().context("wait for ffmpeg")?;
        if !status.success() {
            return Err(anyhow!("ffmpeg exited with status {}", status));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// In-memory sink
// ----------------------------------------------------------------------------

/// What a `MemorySinkFactory` saw for one recording.
#[derive(Clone, Debug, PartialEq)]
pub struct MemoryRecording {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Sequence numbers of the frames written, in order.
    pub frames: Vec<u64>,
    pub finished: bool,
}

/// Where a `MemorySinkFactory` writes the manifest for the recording `path`.
pub fn manifest_path(path: &Path) -> PathBuf {
    path.with_extension("frames")
}

/// Sink factory that records frame sequence numbers instead of encoding.
///
/// On finish, writes a manifest to `manifest_path(path)`: one frame sequence
/// number per line. No video file is created.
#[derive(Clone, Default)]
pub struct MemorySinkFactory {
    recordings: Arc<Mutex<Vec<MemoryRecording>>>,
}

impl MemorySinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recording opened so far.
    pub fn recordings(&self) -> Vec<MemoryRecording> {
        self.recordings
            .lock()
            .map(|list| list.clone())
            .unwrap_or_default()
    }
}

impl SinkFactory for MemorySinkFactory {
    fn open(&self, path: &Path, width: u32, height: u32, fps: f64) -> Result<Box<dyn RecordingSink>> {
        let mut list = self
            .recordings
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))?;
        list.push(MemoryRecording {
            path: path.to_path_buf(),
            width,
            height,
            fps,
            frames: Vec::new(),
            finished: false,
        });
        let manifest = manifest_path(path);
        std::fs::write(&manifest, "")
            .with_context(|| format!("create recording manifest {}", manifest.display()))?;
        Ok(Box::new(MemorySink {
            index: list.len() - 1,
            recordings: self.recordings.clone(),
        }))
    }
}

struct MemorySink {
    index: usize,
    recordings: Arc<Mutex<Vec<MemoryRecording>>>,
}

impl MemorySink {
    fn with_entry<T>(&self, f: impl FnOnce(&mut MemoryRecording) -> T) -> Result<T> {
        let mut list = self
            .recordings
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))?;
        let entry = list
            .get_mut(self.index)
            .ok_or_else(|| anyhow!("memory recording {} vanished", self.index))?;
        Ok(f(entry))
    }
}

impl RecordingSink for MemorySink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let sequence = frame.sequence;
        self.with_entry(|entry| entry.frames.push(sequence))
    }

    fn finish(&mut self) -> Result<()> {
        let (path, manifest) = self.with_entry(|entry| {
            entry.finished = true;
            let manifest: String = entry
                .frames
                .iter()
                .map(|seq| format!("{}\n", seq))
                .collect();
            (manifest_path(&entry.path), manifest)
        })?;
        std::fs::write(&path, manifest)
            .with_context(|| format!("write recording manifest {}", path.display()))
    }
}
