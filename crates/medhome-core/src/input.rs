//! Debounced start button.
//!
//! The button is polled once per loop iteration. A press registers as a
//! single rising edge once the level has read high for the whole debounce
//! window after having been low; holding the button never re-triggers.
//! A level already high at power-on is not a press: the detector arms only
//! once it has seen the button released.

use std::time::{Duration, Instant};

/// Default minimum stable-high time for a press.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Raw digital level of the start control.
pub trait StartButton {
    fn is_pressed(&mut self) -> bool;
}

/// Rising-edge detector with a stability window.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    /// Level accepted as stable.
    stable: bool,
    /// Raw level seen on the previous poll and when it started.
    candidate: Option<(bool, Instant)>,
    /// Set once a low level has been seen; edges fire only while armed.
    armed: bool,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            stable: false,
            candidate: None,
            armed: false,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Feed one raw sample. Returns `true` exactly once per debounced press.
    pub fn update(&mut self, level: bool, now: Instant) -> bool {
        if !level {
            self.armed = true;
        }
        let since = match self.candidate {
            Some((prev, since)) if prev == level => since,
            _ => {
                self.candidate = Some((level, now));
                now
            }
        };

        if level == self.stable || now.duration_since(since) < self.window {
            return false;
        }

        self.stable = level;
        level && self.armed
    }

    /// Forget all history; the next press needs a fresh low→high transition.
    pub fn rearm(&mut self, level: bool) {
        self.stable = level;
        self.candidate = None;
        self.armed = !level;
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    fn feed(d: &mut Debouncer, t0: Instant, samples: &[(u64, bool)]) -> Vec<u64> {
        samples
            .iter()
            .filter_map(|&(t, level)| d.update(level, t0 + MS * t as u32).then_some(t))
            .collect()
    }

    #[test]
    fn test_press_registers_after_window() {
        let mut d = Debouncer::new(50 * MS);
        let t0 = Instant::now();
        let edges = feed(&mut d, t0, &[(0, false), (10, true), (40, true), (60, true), (90, true)]);
        assert_eq!(edges, vec![60]);
    }

    #[test]
    fn test_bounce_shorter_than_window_ignored() {
        let mut d = Debouncer::new(50 * MS);
        let t0 = Instant::now();
        let edges = feed(
            &mut d,
            t0,
            &[(0, true), (20, false), (30, true), (45, false), (200, false)],
        );
        assert!(edges.is_empty());
    }

    #[test]
    fn test_held_from_power_on_never_triggers() {
        let mut d = Debouncer::new(50 * MS);
        let t0 = Instant::now();
        let samples: Vec<(u64, bool)> = (0..100).map(|i| (i * 10, true)).collect();
        assert!(feed(&mut d, t0, &samples).is_empty());
    }

    #[test]
    fn test_held_from_power_on_triggers_after_release() {
        let mut d = Debouncer::new(50 * MS);
        let t0 = Instant::now();
        let mut samples: Vec<(u64, bool)> = (0..10).map(|i| (i * 10, true)).collect();
        samples.extend((10..20).map(|i| (i * 10, false)));
        samples.extend((20..30).map(|i| (i * 10, true)));
        assert_eq!(feed(&mut d, t0, &samples), vec![250]);
    }

    #[test]
    fn test_held_button_triggers_once() {
        let mut d = Debouncer::new(50 * MS);
        let t0 = Instant::now();
        let mut samples = vec![(0, false)];
        samples.extend((1..100).map(|i| (i * 10, true)));
        assert_eq!(feed(&mut d, t0, &samples), vec![60]);
    }

    #[test]
    fn test_second_press_needs_release() {
        let mut d = Debouncer::new(50 * MS);
        let t0 = Instant::now();
        let edges = feed(
            &mut d,
            t0,
            &[
                (0, false),
                (10, true),
                (70, true),
                (100, false),
                (160, false),
                (200, true),
                (260, true),
            ],
        );
        assert_eq!(edges, vec![70, 260]);
    }

    #[test]
    fn test_rearm_high_suppresses_held_level() {
        let mut d = Debouncer::new(50 * MS);
        let t0 = Instant::now();
        d.rearm(true);
        let edges = feed(&mut d, t0, &[(0, true), (100, true)]);
        assert!(edges.is_empty());
    }
}
