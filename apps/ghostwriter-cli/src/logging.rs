//! Logging initialization and log file management.
//!
//! Provides dual-output tracing: stderr (human-readable) and an optional
//! JSON log file at `.ghostwriter/logs/<command>/<timestamp>.log`. File
//! logging is enabled for commands that call the providers; the interactive
//! screen disables the stderr layer so log lines don't tear the display.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Maximum age of log files before cleanup, in days.
const LOG_RETENTION_DAYS: i64 = 3;

/// Filter used for the log file when `RUST_LOG` is unset.
const DEFAULT_FILE_FILTER: &str = "info";

/// Initialize the tracing subscriber.
///
/// When `command` is `Some`, a JSON file layer is added that writes to
/// `.ghostwriter/logs/<command>/<timestamp>.log` under `work_dir`.
///
/// Returns an optional [`WorkerGuard`] that must be held for the
/// lifetime of the program to ensure all buffered logs are flushed.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created, the
/// log file cannot be opened, or a subscriber is already installed.
pub fn init_tracing(
    work_dir: &Path,
    command: Option<&str>,
    stderr: bool,
) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match command {
        Some(command) => {
            let (non_blocking, guard) = open_log_writer(work_dir, command)?;
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILE_FILTER)),
                );
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(EnvFilter::from_default_env())
    });

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

/// Open a fresh log file for `command` behind a non-blocking writer.
fn open_log_writer(
    work_dir: &Path,
    command: &str,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let path = build_log_path(work_dir, command, Utc::now());
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create log directory {}", dir.display()))?;
    }
    let file = fs::File::create(&path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    Ok(tracing_appender::non_blocking(file))
}

/// Delete `.log` files older than [`LOG_RETENTION_DAYS`] and prune the
/// command directories they leave empty.
///
/// Runs before tracing is installed, so failures are printed to stderr and
/// otherwise ignored.
pub fn cleanup_old_logs(work_dir: &Path) {
    let root = logs_dir(work_dir);
    if !root.is_dir() {
        return;
    }

    let cutoff: SystemTime = (Utc::now() - chrono::Duration::days(LOG_RETENTION_DAYS)).into();
    for path in stale_logs(&root, cutoff) {
        if let Err(e) = fs::remove_file(&path) {
            eprintln!("warning: could not remove {}: {e}", path.display());
        }
    }
    prune_empty_dirs(&root);
}

fn logs_dir(work_dir: &Path) -> PathBuf {
    work_dir.join(".ghostwriter").join("logs")
}

/// Build the log file path: `.ghostwriter/logs/<command>/<YYYYMMDD_HHMMSS>.log`.
fn build_log_path(work_dir: &Path, command: &str, now: DateTime<Utc>) -> PathBuf {
    logs_dir(work_dir)
        .join(command)
        .join(format!("{}.log", now.format("%Y%m%d_%H%M%S")))
}

/// Walk `root` and collect `.log` files last modified before `cutoff`.
fn stale_logs(root: &Path, cutoff: SystemTime) -> Vec<PathBuf> {
    let mut stale = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                eprintln!("warning: could not read {}: {e}", dir.display());
                continue;
            }
        };
        for path in entries.flatten().map(|entry| entry.path()) {
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "log")
                && fs::metadata(&path)
                    .and_then(|meta| meta.modified())
                    .is_ok_and(|modified| modified < cutoff)
            {
                stale.push(path);
            }
        }
    }
    stale
}

/// Remove empty directories below `root`, keeping `root` itself.
fn prune_empty_dirs(root: &Path) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };
    for dir in entries.flatten().map(|entry| entry.path()).filter(|p| p.is_dir()) {
        prune_empty_dirs(&dir);
        // Non-empty directories stay.
        let _ = fs::remove_dir(&dir);
    }
}
