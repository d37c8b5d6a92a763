/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Process-wide alarm: one pending deadline, one coordinator, many callers.
//!
//! Any thread may ask to be woken at (or after) a point in time with
//! [`Alarm::set`].  A single coordinator thread sleeps until the soonest
//! requested deadline, bumps a firing serial and invokes the injected
//! [`Broadcast`].  Any thread can later ask, without blocking, whether an
//! alarm fired since it last looked with [`Alarm::check`].
//!
//! ```text
//!  caller ──set(when)──► AlarmState{deadline, generation} ──signal──► coordinator
//!                                                                       │ timed wait
//!  caller ◄──check(&mut seen)── serial (atomic) ◄──── += 1 ─────────────┤ fire
//!                                                   notify_all() ◄──────┘
//! ```
//!
//! # Soonest-wins
//! There is exactly one pending deadline.  A request later than a deadline
//! that is still in the future is dropped; an earlier one replaces it.  Once
//! armed, a deadline cannot be withdrawn, only preempted by an earlier one.
//!
//! # Modes
//! | Mode | Coordinator | `check` |
//! |---|---|---|
//! | [`AlarmMode::Threaded`] | one background thread | compares the caller's serial to the firing serial |
//! | [`AlarmMode::Polling`] | none | compares the deadline to the clock on every call |
//!
//! # Example
//! ```rust,ignore
//! let hub = Arc::new(WakeHub::new());
//! let alarm = Alarm::init(&AlarmSettings::default(), hub.clone())?;
//!
//! alarm.set(alarm.now() + 0.05);
//! let mut seen = CallerSerial::default();
//! let mut epoch = hub.epoch();
//! while !alarm.check(&mut seen) {
//!     hub.wait(&mut epoch);
//! }
//! ```

mod coordinator;
pub mod error;

pub use error::AlarmError;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use serde::Deserialize;
use tracing::{debug, info, trace};

use crate::broadcast::Broadcast;
use crate::clock::TimeSource;
use crate::config::AlarmSettings;

use coordinator::WaitBudget;

/// Deadline stored before the first `set`: elapsed under every clock.
const UNARMED: f64 = f64::NEG_INFINITY;

// ── Public types ──────────────────────────────────────────────────────────────

/// Whether a coordinator thread backs the alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmMode {
    /// A background coordinator fires alarms and publishes a serial.
    #[default]
    Threaded,
    /// No coordinator.  `check` degrades to `deadline <= now` and callers
    /// must poll; no asynchronous wake is ever delivered.
    Polling,
}

/// The last firing serial a caller has observed.
///
/// Owned by the caller and only ever advanced by [`Alarm::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallerSerial(u64);

impl CallerSerial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

// ── Shared state ──────────────────────────────────────────────────────────────

/// Fields guarded by [`Shared::state`].
#[derive(Debug)]
struct AlarmState {
    /// When the pending alarm should fire.  "Nothing armed" is any value
    /// that is already `<= now`.
    deadline: f64,
    /// Bumped by every `set` that stores a deadline.  Lets the coordinator
    /// tell "deadline changed" apart from "time passed", even when the new
    /// value equals the old one.
    generation: u64,
}

/// Everything the coordinator thread and the callers share.
struct Shared {
    state: Mutex<AlarmState>,
    cond: Condvar,
    /// Firing serial.  Written only by the coordinator while it holds
    /// `state`; read lock-free by `check`.
    serial: AtomicU64,
    clock: Arc<dyn TimeSource>,
    broadcast: Arc<dyn Broadcast>,
}

impl Shared {
    /// Every critical section leaves `AlarmState` consistent, so a poisoned
    /// lock is recovered instead of propagated.
    fn lock(&self) -> MutexGuard<'_, AlarmState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `true` while `deadline` is strictly in the future.  NaN never is.
fn is_pending(deadline: f64, now: f64) -> bool {
    deadline > now
}

// ── Alarm ─────────────────────────────────────────────────────────────────────

/// Handle to the process-wide alarm state.
///
/// Cloning is cheap and every clone refers to the same state; hand one to
/// each thread that needs to set or check alarms.
#[derive(Clone)]
pub struct Alarm {
    shared: Arc<Shared>,
    mode: AlarmMode,
}

impl Alarm {
    /// Creates the alarm state and, in threaded mode, starts its coordinator.
    ///
    /// Call once per process, from a thread that outlives every caller.  The
    /// coordinator is detached and runs until the process exits.
    ///
    /// # Errors
    /// [`AlarmError`] if the coordinator thread cannot be started.  This is
    /// meant to abort start-up.
    pub fn init(
        settings: &AlarmSettings,
        broadcast: Arc<dyn Broadcast>,
    ) -> Result<Self, AlarmError> {
        Self::init_with_clock(settings, settings.clock.build(), broadcast)
    }

    /// Like [`init`](Self::init) with an explicit time source.
    pub fn init_with_clock(
        settings: &AlarmSettings,
        clock: Arc<dyn TimeSource>,
        broadcast: Arc<dyn Broadcast>,
    ) -> Result<Self, AlarmError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(AlarmState {
                deadline: UNARMED,
                generation: 0,
            }),
            cond: Condvar::new(),
            serial: AtomicU64::new(0),
            clock,
            broadcast,
        });

        if settings.mode == AlarmMode::Threaded {
            coordinator::spawn(Arc::clone(&shared), &settings.thread_name)?;
        }

        info!(
            mode = ?settings.mode,
            clock = ?settings.clock,
            thread_name = %settings.thread_name,
            "Alarm initialised"
        );

        Ok(Self {
            shared,
            mode: settings.mode,
        })
    }

    /// Requests an alarm at `when` (seconds on this alarm's clock).
    ///
    /// If a deadline is still pending and is earlier than `when`, the request
    /// is dropped.  Otherwise `when` becomes the pending deadline and the
    /// coordinator is signalled.  A `when` that has already passed fires on
    /// the coordinator's next evaluation.
    pub fn set(&self, when: f64) {
        let mut state = self.shared.lock();
        let now = self.shared.clock.now();

        if is_pending(state.deadline, now) && state.deadline < when {
            trace!(
                now,
                pending = state.deadline,
                requested = when,
                "Earlier alarm already pending, request dropped"
            );
            return;
        }

        state.deadline = when;
        state.generation = state.generation.wrapping_add(1);
        debug!(
            now,
            deadline = when,
            generation = state.generation,
            "Alarm deadline set"
        );
        drop(state);

        self.shared.cond.notify_one();
    }

    /// Has an alarm fired since `seen` was last updated?
    ///
    /// Never blocks in threaded mode.  Returns `true` at most once per firing
    /// per caller and advances `seen` to the current serial when it does.
    ///
    /// In polling mode this is `deadline <= now`, evaluated on every call:
    /// it keeps returning `true` while no future deadline is pending and
    /// `seen` is left untouched.
    pub fn check(&self, seen: &mut CallerSerial) -> bool {
        match self.mode {
            AlarmMode::Threaded => {
                let current = self.shared.serial.load(Ordering::Acquire);
                if seen.0 == current {
                    return false;
                }
                seen.0 = current;
                true
            }
            AlarmMode::Polling => {
                let deadline = self.shared.lock().deadline;
                !is_pending(deadline, self.shared.clock.now())
            }
        }
    }

    /// Sleeps until the pending deadline, best effort.
    ///
    /// Intended for configurations without a coordinator.  The sleep is not
    /// cut short by a concurrent [`set`](Self::set).  Returns immediately if
    /// the deadline has already passed or is not finite.
    pub fn wait_for_next_alarm(&self) {
        let deadline = self.shared.lock().deadline;
        let remaining = deadline - self.shared.clock.now();

        match coordinator::wait_budget(remaining) {
            WaitBudget::For(duration) => {
                trace!(remaining, "Sleeping until next alarm");
                thread::sleep(duration);
            }
            WaitBudget::Elapsed => {}
            WaitBudget::Unbounded => {
                debug!(deadline, "No finite deadline to sleep towards");
            }
        }
    }

    /// Current time on this alarm's clock.
    pub fn now(&self) -> f64 {
        self.shared.clock.now()
    }

    /// The pending (or last stored) deadline.  `-inf` before the first `set`.
    pub fn deadline(&self) -> f64 {
        self.shared.lock().deadline
    }

    /// Number of firings so far.  Always `0` in polling mode.
    pub fn serial(&self) -> u64 {
        self.shared.serial.load(Ordering::Acquire)
    }

    pub fn mode(&self) -> AlarmMode {
        self.mode
    }
}

impl fmt::Debug for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alarm")
            .field("mode", &self.mode)
            .field("deadline", &self.deadline())
            .field("serial", &self.serial())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
