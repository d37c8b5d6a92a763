/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the alarm subsystem.
//!
//! Only start-up can fail.  Once [`Alarm::init`](super::Alarm::init) has
//! returned, `set`, `check` and `wait_for_next_alarm` are infallible: they
//! are bounded, lock-protected memory operations and any anomaly inside the
//! coordinator (spurious wake, deadline change) is absorbed by re-evaluating
//! state.
//!
//! Callers are expected to treat every variant here as fatal to process
//! start-up; there is no retry path.

use thiserror::Error;

/// Error returned by [`Alarm::init`](super::Alarm::init).
#[derive(Debug, Error)]
pub enum AlarmError {
    /// The operating system refused to create the coordinator thread.
    #[error("failed to spawn alarm coordinator thread '{name}'")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The configured thread name cannot be used (it contains a NUL byte).
    #[error("invalid coordinator thread name {name:?}: names must not contain NUL bytes")]
    InvalidThreadName { name: String },
}
