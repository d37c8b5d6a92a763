/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use alarmd::broadcast::TokioBroadcast;
use alarmd::{Alarm, AlarmMode, AlarmSettings, CallerSerial};

// ── CLI argument definition ───────────────────────────────────────────────────

/// alarmd – arms a sequence of alarms and reports each firing.
///
/// Example:
///   alarmd -c demos/alarmd.yaml -a 0.05 -a 0.25 -a 1.0
#[derive(Debug, Parser)]
#[command(
    name = "alarmd",
    about = "Process-wide alarm coordinator – demo driver",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML alarm settings file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Alarm offset in seconds from start-up.  Repeatable; each alarm is
    /// armed once the previous one has fired.
    #[arg(short = 'a', long = "after", value_name = "SECS", default_value = "0.1")]
    after: Vec<f64>,

    /// Give up if the alarms have not all fired within this many seconds.
    #[arg(short = 't', long = "timeout", value_name = "SECS", default_value_t = 10.0)]
    timeout: f64,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Initialise structured logging.
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=alarmd=trace).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("alarmd starting up...");

    let cli = Cli::parse();

    info!(
        config  = ?cli.config,
        after   = ?cli.after,
        timeout = cli.timeout,
        "Configuration"
    );

    if let Err(e) = run(cli).await {
        error!("ERROR: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // ── Load settings ─────────────────────────────────────────────────────────
    let settings = match &cli.config {
        Some(path) => AlarmSettings::load_from_file(path)?,
        None => {
            warn!("No settings file provided, using default alarm settings");
            AlarmSettings::default()
        }
    };

    let offsets = sorted_offsets(&cli.after)?;
    let budget = timeout_budget(cli.timeout)?;

    // ── Start the coordinator ─────────────────────────────────────────────────
    let broadcast = TokioBroadcast::new();
    let notify = broadcast.handle();
    let alarm = Alarm::init(&settings, Arc::new(broadcast)).context("alarm start-up failed")?;

    tokio::time::timeout(budget, drive(&alarm, &notify, &offsets))
        .await
        .map_err(|_| {
            anyhow!(
                "timed out after {}s waiting for {} alarm(s)",
                cli.timeout,
                offsets.len()
            )
        })??;

    info!(fired = offsets.len(), "All alarms fired");
    Ok(())
}

/// Rejects negative or non-finite offsets and returns the rest in firing
/// order.
fn sorted_offsets(after: &[f64]) -> Result<Vec<f64>> {
    if let Some(bad) = after.iter().find(|s| !s.is_finite() || **s < 0.0) {
        bail!("alarm offset must be a non-negative number of seconds, got {bad}");
    }
    let mut offsets = after.to_vec();
    offsets.sort_by(f64::total_cmp);
    Ok(offsets)
}

fn timeout_budget(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).with_context(|| format!("invalid timeout: {secs}"))
}

/// Arms each offset in turn and waits until `check` reports the firing.
async fn drive(alarm: &Alarm, notify: &Notify, offsets: &[f64]) -> Result<()> {
    let origin = alarm.now();
    let mut seen = CallerSerial::new();

    for (i, offset) in offsets.iter().enumerate() {
        alarm.set(origin + offset);

        match alarm.mode() {
            AlarmMode::Threaded => loop {
                // Register before checking so a firing in between is not lost.
                let notified = notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if alarm.check(&mut seen) {
                    break;
                }
                notified.await;
            },
            AlarmMode::Polling => {
                while !alarm.check(&mut seen) {
                    let alarm = alarm.clone();
                    tokio::task::spawn_blocking(move || alarm.wait_for_next_alarm()).await?;
                }
            }
        }

        info!(
            alarm = i + 1,
            offset,
            elapsed = alarm.now() - origin,
            serial = alarm.serial(),
            "Alarm fired"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alarmd::broadcast::NoBroadcast;

    #[test]
    fn offsets_are_sorted_into_firing_order() {
        assert_eq!(sorted_offsets(&[0.5, 0.0, 0.1]).unwrap(), vec![0.0, 0.1, 0.5]);
    }

    #[test]
    fn negative_offset_is_rejected() {
        let err = sorted_offsets(&[0.1, -2.0]).unwrap_err();
        assert!(format!("{err:#}").contains("got -2"));
    }

    #[test]
    fn non_finite_offsets_are_rejected() {
        assert!(sorted_offsets(&[f64::NAN]).is_err());
        assert!(sorted_offsets(&[f64::INFINITY]).is_err());
    }

    #[test]
    fn timeout_must_be_a_valid_duration() {
        assert_eq!(timeout_budget(1.5).unwrap(), Duration::from_millis(1500));
        assert!(timeout_budget(-1.0).is_err());
        assert!(timeout_budget(f64::NAN).is_err());
    }

    #[test]
    fn cli_accepts_repeated_offsets() {
        let cli = Cli::parse_from(["alarmd", "-a", "0.2", "-a", "0.05", "-t", "3"]);
        assert_eq!(cli.after, vec![0.2, 0.05]);
        assert_eq!(cli.timeout, 3.0);
        assert!(cli.config.is_none());
    }

    #[tokio::test]
    async fn drive_sees_every_threaded_firing() {
        let broadcast = TokioBroadcast::new();
        let notify = broadcast.handle();
        let alarm = Alarm::init(&AlarmSettings::default(), Arc::new(broadcast)).unwrap();

        tokio::time::timeout(
            Duration::from_secs(5),
            drive(&alarm, &notify, &[0.01, 0.02, 0.02]),
        )
        .await
        .expect("alarms must fire before the timeout")
        .unwrap();
        assert_eq!(alarm.serial(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drive_polls_without_coordinator() {
        let alarm = Alarm::init(&AlarmSettings::polling(), Arc::new(NoBroadcast)).unwrap();
        let notify = Notify::new();

        tokio::time::timeout(Duration::from_secs(5), drive(&alarm, &notify, &[0.01, 0.03]))
            .await
            .expect("polling driver must finish before the timeout")
            .unwrap();
        assert!(alarm.now() >= 0.03);
        assert_eq!(alarm.serial(), 0);
    }
}
