//! Tracing setup: stdout plus an optional daily-rotated log file.
//!
//! Verbosity follows `RUST_LOG`, e.g. `RUST_LOG=overlay_engine=debug`.

use camino::Utf8Path;
use std::time::{Duration, SystemTime};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "overlay_tool=info,overlay_engine=info,overlay_installer=info";
const LOG_PREFIX: &str = "overlay-tool";
const MAX_LOG_AGE_DAYS: u64 = 7;

/// Install the global subscriber. Keep the returned guard alive until exit so
/// buffered file output is flushed.
pub fn init_logging(log_dir: Option<&Utf8Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    let (guard, file_layer) = match log_dir.map(file_writer) {
        Some(Ok((writer, guard))) => {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(guard), Some(layer))
        }
        Some(Err(e)) => {
            eprintln!("File logging disabled: {}", e);
            (None, None)
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);
    if let Some(layer) = file_layer {
        registry.with(layer).init();
    } else {
        registry.init();
    }

    if let Some(dir) = log_dir.filter(|_| guard.is_some()) {
        tracing::debug!("Log directory: {}", dir);
        cleanup_old_logs(dir, MAX_LOG_AGE_DAYS);
    }
    guard
}

fn file_writer(
    log_dir: &Utf8Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), String> {
    std::fs::create_dir_all(log_dir.as_std_path())
        .map_err(|e| format!("cannot create {}: {}", log_dir, e))?;
    let appender = rolling::RollingFileAppender::builder()
        .rotation(rolling::Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix("log")
        .build(log_dir.as_std_path())
        .map_err(|e| e.to_string())?;
    Ok(tracing_appender::non_blocking(appender))
}

fn is_rotated_log(file_name: &str) -> bool {
    file_name.starts_with(&format!("{}.", LOG_PREFIX)) && file_name.ends_with(".log")
}

/// Delete rotated log files older than `max_age_days`.
pub fn cleanup_old_logs(log_dir: &Utf8Path, max_age_days: u64) -> usize {
    let max_age = Duration::from_secs(max_age_days * 24 * 60 * 60);

    let entries = match std::fs::read_dir(log_dir.as_std_path()) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Failed to read log directory for cleanup: {}", e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !is_rotated_log(file_name) {
            continue;
        }

        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        let Ok(age) = SystemTime::now().duration_since(modified) else {
            continue;
        };

        if age > max_age {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!("Deleted old log file: {}", path.display());
                    removed += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to delete old log file {}: {}", path.display(), e)
                }
            }
        }
    }
    removed
}
