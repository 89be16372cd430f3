//! User actions and their text form.
//!
//! Single keys: `c` capture, `s` stop, `r` toggle recording, `q` quit,
//! `1`-`4` focus a grid slot, `b`/`esc` leave full screen. Lines:
//! `open webcam [N]`, `open video <PATH>`, `open grid [0,1,2,3]`,
//! `record start|stop`.

use anyhow::{anyhow, bail, Result};

use crate::scheduler::MAX_FEEDS;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    CaptureStill,
    Stop,
    ToggleRecord,
    StartRecord,
    StopRecord,
    Quit,
    /// `None` uses the configured default camera.
    OpenWebcam { index: Option<u32> },
    OpenVideo { path: String },
    /// Empty uses the configured default cameras.
    OpenGrid { cameras: Vec<u32> },
    /// Zero-based grid slot.
    SelectCamera(usize),
    ReturnFromFullscreen,
    /// The interactive input has closed; no further commands will follow.
    EndOfInput,
}

pub const HELP: &str = "\
keys: c capture | s stop | r record on/off (grid) | q quit | 1-4 focus camera | b back
lines: open webcam [N] | open video <PATH> | open grid [0,1,2,3] | record start|stop";

impl Command {
    /// Parse one line of user input. Blank input is an error.
    pub fn parse(input: &str) -> Result<Self> {
        let line = input.trim();
        let mut words = line.split_whitespace();
        let head = words
            .next()
            .ok_or_else(|| anyhow!("empty command"))?
            .to_ascii_lowercase();

        match head.as_str() {
            "c" | "capture" => Ok(Command::CaptureStill),
            "s" | "stop" => Ok(Command::Stop),
            "r" => Ok(Command::ToggleRecord),
            "q" | "quit" | "exit" => Ok(Command::Quit),
            "b" | "esc" | "back" => Ok(Command::ReturnFromFullscreen),
            "record" => match words.next().map(str::to_ascii_lowercase).as_deref() {
                None | Some("toggle") => Ok(Command::ToggleRecord),
                Some("start") => Ok(Command::StartRecord),
                Some("stop") => Ok(Command::StopRecord),
                Some(other) => bail!("unknown record action '{}'", other),
            },
            "open" => parse_open(line, words.next()),
            digit if digit.len() == 1 && digit.as_bytes()[0].is_ascii_digit() => {
                let n = (digit.as_bytes()[0] - b'0') as usize;
                if n == 0 || n > MAX_FEEDS {
                    bail!("camera slot must be 1-{}", MAX_FEEDS);
                }
                Ok(Command::SelectCamera(n - 1))
            }
            other => bail!("unknown command '{}'", other),
        }
    }
}

fn parse_open(line: &str, target: Option<&str>) -> Result<Command> {
    let target = target.ok_or_else(|| anyhow!("open what? webcam, video or grid"))?;
    let rest = line
        .split_once(target)
        .map(|(_, rest)| rest.trim())
        .unwrap_or_default();
    match target.to_ascii_lowercase().as_str() {
        "webcam" | "camera" => {
            let index = if rest.is_empty() {
                None
            } else {
                Some(
                    rest.parse()
                        .map_err(|_| anyhow!("camera index must be a number, got '{}'", rest))?,
                )
            };
            Ok(Command::OpenWebcam { index })
        }
        "video" | "file" => {
            if rest.is_empty() {
                bail!("open video needs a path");
            }
            Ok(Command::OpenVideo {
                path: rest.to_string(),
            })
        }
        "grid" => Ok(Command::OpenGrid {
            cameras: parse_camera_list(rest)?,
        }),
        other => bail!("cannot open '{}'", other),
    }
}

/// `0,1,2` into indices; at most `MAX_FEEDS` entries.
pub fn parse_camera_list(value: &str) -> Result<Vec<u32>> {
    let cameras = value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<u32>()
                .map_err(|_| anyhow!("invalid camera index '{}'", entry))
        })
        .collect::<Result<Vec<_>>>()?;
    if cameras.len() > MAX_FEEDS {
        bail!("at most {} cameras in a grid", MAX_FEEDS);
    }
    Ok(cameras)
}
