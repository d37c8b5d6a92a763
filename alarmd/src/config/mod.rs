//! Alarm settings loading.
//!
//! The expected YAML structure is:
//! ```yaml
//! alarm:
//!   mode: threaded          # threaded | polling
//!   clock: monotonic        # monotonic | wall
//!   thread_name: "alarm-coordinator"
//! ```
//!
//! Every field is optional.  A file without an `alarm:` section is accepted
//! and yields [`AlarmSettings::default`].

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::alarm::AlarmMode;
use crate::clock::ClockKind;

/// Name given to the coordinator thread when the file does not supply one.
pub const DEFAULT_THREAD_NAME: &str = "alarm-coordinator";

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
#[derive(Debug, Deserialize)]
struct SettingsFile {
    alarm: Option<SettingsEntry>,
}

#[derive(Debug, Deserialize)]
struct SettingsEntry {
    #[serde(default)]
    mode: AlarmMode,
    #[serde(default)]
    clock: ClockKind,
    thread_name: Option<String>,
}

// ── Public data structures ────────────────────────────────────────────────────

/// How the process-wide alarm should be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmSettings {
    /// `Threaded` runs a coordinator thread; `Polling` runs none and `check`
    /// compares the deadline against the clock on every call.
    pub mode: AlarmMode,
    /// Which clock deadlines are measured against.
    pub clock: ClockKind,
    /// OS-visible name of the coordinator thread.
    pub thread_name: String,
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            mode: AlarmMode::Threaded,
            clock: ClockKind::Monotonic,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl AlarmSettings {
    /// Settings for the degraded, coordinator-less configuration.
    pub fn polling() -> Self {
        Self {
            mode: AlarmMode::Polling,
            ..Self::default()
        }
    }

    /// Parses `path` into settings.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or if the YAML is
    /// structurally invalid (including unknown `mode` / `clock` values).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading alarm settings from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open settings file: {}", path.display()))?;

        let file: SettingsFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?;

        let Some(entry) = file.alarm else {
            warn!("No 'alarm' section in settings file, using defaults");
            return Ok(Self::default());
        };

        let settings = Self {
            mode: entry.mode,
            clock: entry.clock,
            thread_name: entry
                .thread_name
                .unwrap_or_else(|| DEFAULT_THREAD_NAME.to_string()),
        };

        debug!(
            mode = ?settings.mode,
            clock = ?settings.clock,
            thread_name = %settings.thread_name,
            "Alarm settings loaded"
        );

        Ok(settings)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper: write a YAML string to a temp file and return it.
    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn default_settings_are_threaded_monotonic() {
        let s = AlarmSettings::default();
        assert_eq!(s.mode, AlarmMode::Threaded);
        assert_eq!(s.clock, ClockKind::Monotonic);
        assert_eq!(s.thread_name, DEFAULT_THREAD_NAME);
    }

    #[test]
    fn load_full_yaml() {
        let yaml = r#"
alarm:
  mode: polling
  clock: wall
  thread_name: "vm-alarm"
"#;
        let f = yaml_tempfile(yaml);
        let s = AlarmSettings::load_from_file(f.path()).unwrap();
        assert_eq!(s.mode, AlarmMode::Polling);
        assert_eq!(s.clock, ClockKind::Wall);
        assert_eq!(s.thread_name, "vm-alarm");
    }

    #[test]
    fn optional_fields_use_defaults_when_absent() {
        let f = yaml_tempfile("alarm:\n  clock: wall\n");
        let s = AlarmSettings::load_from_file(f.path()).unwrap();
        assert_eq!(s.mode, AlarmMode::Threaded);
        assert_eq!(s.clock, ClockKind::Wall);
        assert_eq!(s.thread_name, DEFAULT_THREAD_NAME);
    }

    #[test]
    fn missing_alarm_section_yields_defaults() {
        let f = yaml_tempfile("unrelated: 1\n");
        let s = AlarmSettings::load_from_file(f.path()).unwrap();
        assert_eq!(s, AlarmSettings::default());
    }

    #[test]
    fn unknown_mode_returns_error() {
        let f = yaml_tempfile("alarm:\n  mode: interval_timer\n");
        assert!(AlarmSettings::load_from_file(f.path()).is_err());
    }

    #[test]
    fn missing_file_returns_error() {
        let err = AlarmSettings::load_from_file(Path::new("/nonexistent/path/alarmd.yaml"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("Cannot open settings file"));
    }

    #[test]
    fn malformed_yaml_returns_error() {
        let f = yaml_tempfile("this is: not: valid: yaml: content:::");
        assert!(AlarmSettings::load_from_file(f.path()).is_err());
    }
}
