/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! alarmd – process-wide alarm coordination for multi-threaded runtimes
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── alarm/          – shared alarm state, coordinator thread, set/check API
//! ├── broadcast       – wake-up capability invoked once per firing
//! ├── clock           – float-seconds time sources
//! └── config/         – YAML settings (mode, clock, thread name)
//! ```

pub mod alarm;
pub mod broadcast;
pub mod clock;
pub mod config;

pub use alarm::{Alarm, AlarmError, AlarmMode, CallerSerial};
pub use config::AlarmSettings;
