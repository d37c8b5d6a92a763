/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Time sources for the alarm coordinator.
//!
//! Every deadline in this crate is an `f64` number of seconds on the timeline
//! of one [`TimeSource`].  The coordinator never mixes clocks: the same source
//! answers "what time is it" for `set`, for the timed wait and for the
//! polling fallback of `check`.
//!
//! | Source | Origin | Typical use |
//! |---|---|---|
//! | [`MonotonicClock`] | construction of the clock | default, immune to wall-clock steps |
//! | [`WallClock`] | UNIX epoch | deadlines exchanged with other processes |
//! | [`ManualClock`] | whatever the test sets | deterministic policy tests |

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Deserialize;

// ── TimeSource ────────────────────────────────────────────────────────────────

/// Supplies the current time as floating-point seconds.
///
/// Implementations must be monotonic enough for sub-second comparisons and
/// cheap to call; `now()` is read while the alarm lock is held.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> f64;
}

// ── MonotonicClock ────────────────────────────────────────────────────────────

/// Seconds elapsed since the clock was constructed.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

// ── WallClock ─────────────────────────────────────────────────────────────────

/// Seconds since the UNIX epoch.
///
/// A system clock set before 1970 reads as `0.0` rather than failing.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl TimeSource for WallClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

// ── ManualClock ───────────────────────────────────────────────────────────────

/// A clock that only moves when told to.
///
/// Stores the `f64` bit pattern in an `AtomicU64` so it can be shared with
/// the coordinator thread without a lock.
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    /// Creates a clock that reads `start`.
    pub fn new(start: f64) -> Self {
        Self {
            bits: AtomicU64::new(start.to_bits()),
        }
    }

    /// Jumps the clock to `t`.  Moving backwards is allowed.
    pub fn set(&self, t: f64) {
        self.bits.store(t.to_bits(), Ordering::SeqCst);
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: f64) {
        let _ = self
            .bits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |b| {
                Some((f64::from_bits(b) + secs).to_bits())
            });
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

// ── ClockKind ─────────────────────────────────────────────────────────────────

/// Which real clock to build from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockKind {
    #[default]
    Monotonic,
    Wall,
}

impl ClockKind {
    /// Builds a fresh instance of the selected clock.
    pub fn build(self) -> Arc<dyn TimeSource> {
        match self {
            ClockKind::Monotonic => Arc::new(MonotonicClock::new()),
            ClockKind::Wall => Arc::new(WallClock),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn monotonic_clock_starts_near_zero() {
        let clock = MonotonicClock::new();
        let t = clock.now();
        assert!((0.0..1.0).contains(&t), "fresh clock read {t}");
    }

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        thread::sleep(Duration::from_millis(5));
        let b = clock.now();
        assert!(b > a);
        assert!(b - a >= 0.004);
    }

    #[test]
    fn wall_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(WallClock.now() > 1_577_836_800.0);
    }

    #[test]
    fn manual_clock_set_and_advance() {
        let clock = ManualClock::new(10.0);
        assert_eq!(clock.now(), 10.0);
        clock.advance(0.5);
        assert_eq!(clock.now(), 10.5);
        clock.set(-3.0);
        assert_eq!(clock.now(), -3.0);
    }

    #[test]
    fn clock_kind_defaults_to_monotonic() {
        assert_eq!(ClockKind::default(), ClockKind::Monotonic);
        assert!(ClockKind::Monotonic.build().now() < 1.0);
        assert!(ClockKind::Wall.build().now() > 1_577_836_800.0);
    }
}
