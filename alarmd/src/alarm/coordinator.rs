/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The coordinator thread: waits for the pending deadline and fires it.
//!
//! # State machine
//! ```text
//!            set(future)                    timed wait elapsed,
//!   Idle ─────────────────► Armed ─────────────────────────────► Firing
//!    ▲                       │  ▲   generation unchanged,            │
//!    │                       │  │   deadline <= now                  │
//!    │                       └──┘                                    │
//!    │          set(earlier) / spurious wake: re-arm                 │
//!    └───────────────── serial += 1, unlock, notify_all() ◄──────────┘
//! ```
//!
//! The loop never trusts the reason a wait returned.  After every wake it
//! re-reads the state and only fires when the current generation has not
//! fired yet **and** its deadline has passed.  A wake caused by `set` or by
//! the platform (spurious) simply goes round again with a freshly computed
//! wait.
//!
//! Requests are tracked by generation, not by deadline value.  Storing a
//! deadline equal to one that already fired is a new request and fires
//! again; only equal requests made before expiry coalesce.

use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

use super::{AlarmError, AlarmState, Shared};

/// How long the coordinator (or `wait_for_next_alarm`) should wait for a
/// deadline that is `remaining` seconds away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum WaitBudget {
    /// Already due.  Also covers NaN: a deadline that cannot be compared
    /// is never considered pending.
    Elapsed,
    /// Due in this much time.
    For(Duration),
    /// Too far away to represent (`+inf`); only a new `set` ends the wait.
    Unbounded,
}

/// Converts a signed remaining time into a wait.  Never yields a negative
/// sleep.  A positive remaining time below one nanosecond rounds up to a
/// 1 ns wait so nothing fires while `deadline > now`.
pub(super) fn wait_budget(remaining: f64) -> WaitBudget {
    if remaining.is_nan() || remaining <= 0.0 {
        return WaitBudget::Elapsed;
    }
    match Duration::try_from_secs_f64(remaining) {
        Ok(d) if d.is_zero() => WaitBudget::For(Duration::from_nanos(1)),
        Ok(d) => WaitBudget::For(d),
        Err(_) => WaitBudget::Unbounded,
    }
}

/// Starts the detached coordinator thread for `shared`.
pub(super) fn spawn(shared: Arc<Shared>, name: &str) -> Result<(), AlarmError> {
    if name.contains('\0') {
        return Err(AlarmError::InvalidThreadName {
            name: name.to_string(),
        });
    }

    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || run(&shared))
        .map_err(|source| AlarmError::Spawn {
            name: name.to_string(),
            source,
        })?;

    debug!(thread = name, "Alarm coordinator started");
    Ok(())
}

/// The coordinator loop.  Runs for the lifetime of the process.
fn run(shared: &Shared) {
    let mut state = shared.lock();

    // Generation whose deadline has already been fired.  Generation 0 is the
    // unarmed state built by `init`; a `set` that raced ahead of this thread
    // has already moved past it and is picked up on the first pass.
    let mut fired: u64 = 0;
    // Generation the current wait was armed for, for logging re-arms.
    let mut armed: Option<u64> = None;

    loop {
        if state.generation == fired {
            trace!("No alarm pending, waiting for a request");
            state = shared
                .cond
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
            continue;
        }

        let now = shared.clock.now();
        let deadline = state.deadline;
        let generation = state.generation;

        let budget = wait_budget(deadline - now);
        if budget != WaitBudget::Elapsed {
            match armed {
                Some(prev) if prev != generation => {
                    debug!(deadline, now, generation, "Deadline changed, re-arming")
                }
                None => debug!(deadline, now, generation, "Alarm armed"),
                Some(_) => {}
            }
            armed = Some(generation);

            let (guard, timed_out) = wait(shared, state, budget);
            state = guard;

            if state.generation != generation {
                trace!(generation = state.generation, "Woken by new deadline");
            } else if !timed_out {
                trace!("Spurious wakeup absorbed");
            }
            continue;
        }

        // Genuine timeout: this generation has not fired and its deadline
        // is due.  Publish the serial before anyone is told about it.
        fired = generation;
        armed = None;
        let serial = shared.serial.load(Ordering::Relaxed) + 1;
        shared.serial.store(serial, Ordering::Release);
        drop(state);

        debug!(serial, deadline, now, "Alarm fired, notifying threads");
        shared.broadcast.notify_all();

        state = shared.lock();
    }
}

/// Blocks on the condvar for `budget`.  Returns the re-acquired guard and
/// whether the wait ran out its full timeout.
fn wait<'a>(
    shared: &'a Shared,
    state: std::sync::MutexGuard<'a, AlarmState>,
    budget: WaitBudget,
) -> (std::sync::MutexGuard<'a, AlarmState>, bool) {
    match budget {
        WaitBudget::For(duration) => {
            let (guard, result) = shared
                .cond
                .wait_timeout(state, duration)
                .unwrap_or_else(PoisonError::into_inner);
            (guard, result.timed_out())
        }
        WaitBudget::Unbounded => {
            let guard = shared
                .cond
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
            (guard, false)
        }
        WaitBudget::Elapsed => (state, true),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
