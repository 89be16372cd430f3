//! Per-slot tick deadlines.
//!
//! A slot is re-armed only after its tick has run, so a slow tick delays the
//! next one instead of queueing extra ticks.

use std::time::{Duration, Instant};

/// Upper bound on simultaneously polled feeds.
pub const MAX_FEEDS: usize = 4;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);
pub const DEFAULT_FIRST_TICK_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct TickScheduler {
    deadlines: [Option<Instant>; MAX_FEEDS],
    interval: Duration,
    first_delay: Duration,
}

impl TickScheduler {
    pub fn new(interval: Duration, first_delay: Duration) -> Self {
        Self {
            deadlines: [None; MAX_FEEDS],
            interval,
            first_delay,
        }
    }

    /// First deadline after a feed opens.
    pub fn arm_first(&mut self, slot: usize, now: Instant) {
        self.arm_at(slot, now + self.first_delay);
    }

    /// Next deadline once a tick has returned.
    pub fn rearm(&mut self, slot: usize, now: Instant) {
        self.arm_at(slot, now + self.interval);
    }

    fn arm_at(&mut self, slot: usize, deadline: Instant) {
        if let Some(entry) = self.deadlines.get_mut(slot) {
            *entry = Some(deadline);
        }
    }

    pub fn disarm(&mut self, slot: usize) {
        if let Some(entry) = self.deadlines.get_mut(slot) {
            *entry = None;
        }
    }

    pub fn is_armed(&self, slot: usize) -> bool {
        self.deadlines.get(slot).is_some_and(Option::is_some)
    }

    /// Slots whose deadline has passed, earliest deadline first. Taking them
    /// disarms them until `rearm`.
    pub fn take_due(&mut self, now: Instant) -> Vec<usize> {
        let mut due: Vec<(Instant, usize)> = self
            .deadlines
            .iter()
            .enumerate()
            .filter_map(|(slot, deadline)| deadline.filter(|d| *d <= now).map(|d| (d, slot)))
            .collect();
        due.sort();
        for (_, slot) in &due {
            self.deadlines[*slot] = None;
        }
        due.into_iter().map(|(_, slot)| slot).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.iter().flatten().min().copied()
    }

    /// Time to sleep before the next deadline; zero when one is already due.
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL, DEFAULT_FIRST_TICK_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_is_delayed() {
        let start = Instant::now();
        let mut scheduler = TickScheduler::default();
        scheduler.arm_first(0, start);

        assert!(scheduler.take_due(start + Duration::from_millis(49)).is_empty());
        assert_eq!(scheduler.take_due(start + Duration::from_millis(50)), vec![0]);
    }

    #[test]
    fn due_slots_are_taken_once_until_rearmed() {
        let start = Instant::now();
        let mut scheduler = TickScheduler::default();
        scheduler.arm_first(1, start);

        let late = start + Duration::from_secs(1);
        assert_eq!(scheduler.take_due(late), vec![1]);
        assert!(scheduler.take_due(late).is_empty(), "no catch-up ticks");
        assert!(!scheduler.is_armed(1));

        scheduler.rearm(1, late);
        assert_eq!(scheduler.next_deadline(), Some(late + DEFAULT_TICK_INTERVAL));
    }

    #[test]
    fn earliest_deadline_runs_first() {
        let start = Instant::now();
        let mut scheduler = TickScheduler::new(Duration::from_millis(10), Duration::ZERO);
        scheduler.rearm(2, start);
        scheduler.arm_first(3, start);
        scheduler.rearm(0, start + Duration::from_millis(5));

        let due = scheduler.take_due(start + Duration::from_millis(20));
        assert_eq!(due, vec![3, 2, 0]);
    }

    #[test]
    fn out_of_range_slots_are_ignored() {
        let mut scheduler = TickScheduler::default();
        scheduler.arm_first(MAX_FEEDS, Instant::now());
        assert!(scheduler.next_deadline().is_none());
        assert!(!scheduler.is_armed(MAX_FEEDS));
    }

    #[test]
    fn sleep_time_saturates() {
        let start = Instant::now();
        let mut scheduler = TickScheduler::default();
        assert!(scheduler.time_until_next(start).is_none());
        scheduler.arm_first(0, start);
        assert_eq!(
            scheduler.time_until_next(start + Duration::from_secs(1)),
            Some(Duration::ZERO)
        );
    }
}
