//! Where annotated frames go.
//!
//! The terminal shell has no video surface, so `ConsoleDisplay` renders one
//! status line per feed: origin, frame size, frame count and a REC badge that
//! blinks while a recording is open.

use std::time::{Duration, Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::frame::Frame;
use crate::scheduler::MAX_FEEDS;

/// Period of the REC badge blink.
pub const BLINK_PERIOD: Duration = Duration::from_millis(500);

pub trait DisplaySink {
    /// Show the latest annotated frame of `slot`.
    fn present(&mut self, slot: usize, frame: &Frame, recording: bool);

    /// The feed in `slot` could not be opened; `frame` is the "no feed" image.
    fn placeholder(&mut self, slot: usize, frame: &Frame, reason: &str);

    /// The feed in `slot` is gone.
    fn closed(&mut self, slot: usize);

    /// Grid focus changed; `None` shows every slot.
    fn focus(&mut self, _slot: Option<usize>) {}
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn present(&mut self, _slot: usize, _frame: &Frame, _recording: bool) {}
    fn placeholder(&mut self, _slot: usize, _frame: &Frame, _reason: &str) {}
    fn closed(&mut self, _slot: usize) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

/// REC badge state: on for one period, off for the next.
#[derive(Debug)]
pub struct Blink {
    started: Instant,
    period: Duration,
}

impl Blink {
    pub fn new(started: Instant, period: Duration) -> Self {
        Self { started, period }
    }

    pub fn is_on(&self, now: Instant) -> bool {
        let period = self.period.as_millis().max(1);
        let elapsed = now.saturating_duration_since(self.started).as_millis();
        (elapsed / period) % 2 == 0
    }
}

pub struct ConsoleDisplay {
    multi: Option<MultiProgress>,
    lines: [Option<ProgressBar>; MAX_FEEDS],
    recording: [bool; MAX_FEEDS],
    focused: Option<usize>,
    blink: Blink,
}

impl ConsoleDisplay {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        let pretty = match mode {
            UiMode::Pretty => true,
            UiMode::Auto => is_tty,
            UiMode::Plain => false,
        };
        let multi = pretty.then(|| MultiProgress::with_draw_target(ProgressDrawTarget::stderr()));
        Self {
            multi,
            lines: Default::default(),
            recording: [false; MAX_FEEDS],
            focused: None,
            blink: Blink::new(Instant::now(), BLINK_PERIOD),
        }
    }

    fn line(&mut self, slot: usize) -> Option<&ProgressBar> {
        let multi = self.multi.as_ref()?;
        let line = self.lines.get_mut(slot)?;
        if line.is_none() {
            let bar = multi.add(ProgressBar::new_spinner());
            let style = ProgressStyle::with_template("{spinner} {prefix} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            bar.set_prefix(format!("[{}]", slot + 1));
            *line = Some(bar);
        }
        line.as_ref()
    }

    fn marker(&self, slot: usize) -> &'static str {
        match self.focused {
            Some(focused) if focused == slot => "*",
            _ => " ",
        }
    }
}

impl DisplaySink for ConsoleDisplay {
    fn present(&mut self, slot: usize, frame: &Frame, recording: bool) {
        if slot >= MAX_FEEDS {
            return;
        }
        let was_recording = std::mem::replace(&mut self.recording[slot], recording);
        if self.multi.is_none() {
            if recording != was_recording {
                let state = if recording { "REC" } else { "live" };
                eprintln!("==> camera {}: {}", slot + 1, state);
            }
            return;
        }

        let badge = if recording && self.blink.is_on(Instant::now()) {
            "● REC"
        } else if recording {
            "  REC"
        } else {
            ""
        };
        let marker = self.marker(slot);
        let message = format!(
            "{}{}x{} frame {} {}",
            marker, frame.width, frame.height, frame.sequence, badge
        );
        if let Some(line) = self.line(slot) {
            line.set_message(message);
            line.tick();
        }
    }

    fn placeholder(&mut self, slot: usize, frame: &Frame, reason: &str) {
        if self.multi.is_none() {
            eprintln!("==> camera {}: no feed ({})", slot + 1, reason);
            return;
        }
        let message = format!("{}x{} no feed: {}", frame.width, frame.height, reason);
        if let Some(line) = self.line(slot) {
            line.set_message(message);
        }
    }

    fn closed(&mut self, slot: usize) {
        if let Some(flag) = self.recording.get_mut(slot) {
            *flag = false;
        }
        match self.lines.get_mut(slot).and_then(Option::take) {
            Some(line) => line.finish_with_message("closed"),
            None if self.multi.is_none() => eprintln!("==> camera {}: closed", slot + 1),
            None => {}
        }
    }

    fn focus(&mut self, slot: Option<usize>) {
        self.focused = slot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blink_alternates_every_period() {
        let start = Instant::now();
        let blink = Blink::new(start, BLINK_PERIOD);
        assert!(blink.is_on(start));
        assert!(blink.is_on(start + Duration::from_millis(499)));
        assert!(!blink.is_on(start + Duration::from_millis(500)));
        assert!(blink.is_on(start + Duration::from_millis(1000)));
    }

    #[test]
    fn ui_flag_parsing() {
        assert_eq!(UiMode::from_flag(Some("plain")), UiMode::Plain);
        assert_eq!(UiMode::from_flag(Some("pretty")), UiMode::Pretty);
        assert_eq!(UiMode::from_flag(None), UiMode::Auto);
    }

    #[test]
    fn plain_console_accepts_out_of_range_slots() {
        let mut display = ConsoleDisplay::new(UiMode::Plain, false);
        display.present(MAX_FEEDS, &Frame::black(2, 2), true);
        display.closed(MAX_FEEDS);
        display.placeholder(0, &Frame::placeholder(), "device busy");
        display.closed(0);
    }
}
