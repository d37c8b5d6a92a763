/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Cross-thread wake-up capability invoked once per alarm firing.
//!
//! The coordinator does not know how the surrounding runtime parks its
//! threads.  It only calls [`Broadcast::notify_all`] after publishing a new
//! firing serial, and every woken thread is expected to re-evaluate its own
//! condition (typically by calling `Alarm::check`).
//!
//! ```text
//!  coordinator ──serial += 1──► notify_all() ──► WakeHub / Notify / closure
//!                                                   │
//!                     runtime threads ◄─────────────┘  wake, then check()
//! ```

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;

/// Wakes every runtime thread blocked in an interruptible wait.
///
/// Called by the coordinator thread, never while the alarm lock is held.
pub trait Broadcast: Send + Sync {
    fn notify_all(&self);
}

// ── NoBroadcast ───────────────────────────────────────────────────────────────

/// Does nothing.  For polling deployments where callers poll `check` anyway.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBroadcast;

impl Broadcast for NoBroadcast {
    fn notify_all(&self) {}
}

// ── FnBroadcast ───────────────────────────────────────────────────────────────

/// Adapts any `Fn()` closure into a [`Broadcast`].
pub struct FnBroadcast<F>(pub F);

impl<F> Broadcast for FnBroadcast<F>
where
    F: Fn() + Send + Sync,
{
    fn notify_all(&self) {
        (self.0)()
    }
}

impl<F> std::fmt::Debug for FnBroadcast<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnBroadcast(..)")
    }
}

// ── WakeHub ───────────────────────────────────────────────────────────────────

/// A condvar that runtime threads park on between alarm checks.
///
/// Each `notify_all` bumps an epoch.  A waiter passes in the last epoch it
/// saw; the wait returns as soon as the epoch differs, so a notification that
/// lands between the caller's `check` and its `wait` is never lost.
#[derive(Debug, Default)]
pub struct WakeHub {
    epoch: Mutex<u64>,
    cv: Condvar,
}

impl WakeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current epoch, i.e. the number of broadcasts delivered so far.
    pub fn epoch(&self) -> u64 {
        *self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until a broadcast newer than `*seen` arrives, then updates
    /// `*seen`.
    pub fn wait(&self, seen: &mut u64) {
        let guard = self.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        let guard = self
            .cv
            .wait_while(guard, |epoch| *epoch == *seen)
            .unwrap_or_else(PoisonError::into_inner);
        *seen = *guard;
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    ///
    /// Returns `true` if a new broadcast was observed.
    pub fn wait_timeout(&self, seen: &mut u64, timeout: Duration) -> bool {
        let guard = self.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .cv
            .wait_timeout_while(guard, timeout, |epoch| *epoch == *seen)
            .unwrap_or_else(PoisonError::into_inner);
        if *guard == *seen {
            return false;
        }
        *seen = *guard;
        true
    }
}

impl Broadcast for WakeHub {
    fn notify_all(&self) {
        let mut epoch = self.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        *epoch = epoch.wrapping_add(1);
        drop(epoch);
        self.cv.notify_all();
    }
}

// ── TokioBroadcast ────────────────────────────────────────────────────────────

/// Forwards firings to async tasks through a [`tokio::sync::Notify`].
///
/// `notify_waiters` only wakes futures that are already registered.  Async
/// consumers must `enable()` their `Notified` future before calling
/// `check`, then await it:
///
/// ```rust,ignore
/// let notified = notify.notified();
/// tokio::pin!(notified);
/// notified.as_mut().enable();
/// if !alarm.check(&mut seen) {
///     notified.await;
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TokioBroadcast {
    notify: Arc<Notify>,
}

impl TokioBroadcast {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared `Notify` async tasks wait on.
    pub fn handle(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }
}

impl Broadcast for TokioBroadcast {
    fn notify_all(&self) {
        self.notify.notify_waiters();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn fn_broadcast_invokes_closure() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let b = FnBroadcast(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        b.notify_all();
        b.notify_all();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn wake_hub_wait_timeout_without_broadcast_returns_false() {
        let hub = WakeHub::new();
        let mut seen = hub.epoch();
        assert!(!hub.wait_timeout(&mut seen, Duration::from_millis(10)));
        assert_eq!(seen, 0);
    }

    #[test]
    fn wake_hub_broadcast_before_wait_is_not_lost() {
        let hub = WakeHub::new();
        let mut seen = hub.epoch();
        hub.notify_all();
        assert!(hub.wait_timeout(&mut seen, Duration::from_millis(10)));
        assert_eq!(seen, 1);
    }

    #[test]
    fn wake_hub_wakes_every_waiter() {
        let hub = Arc::new(WakeHub::new());
        let woken = Arc::new(AtomicUsize::new(0));

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let hub = Arc::clone(&hub);
                let woken = Arc::clone(&woken);
                thread::spawn(move || {
                    let mut seen = 0;
                    if hub.wait_timeout(&mut seen, Duration::from_secs(5)) {
                        woken.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        hub.notify_all();
        for w in waiters {
            w.join().unwrap();
        }
        assert_eq!(woken.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn tokio_broadcast_wakes_enabled_waiter() {
        let b = TokioBroadcast::new();
        let notify = b.handle();
        let notified = notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        b.notify_all();
        tokio::time::timeout(Duration::from_secs(1), notified)
            .await
            .expect("enabled waiter must be woken");
    }
}
