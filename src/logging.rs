//! Tracing configuration and log routing.
//!
//! Logs go to stdout through a compact formatter and, when a log file can be
//! opened, to that file as well. `SKILLSCOPE_LOG_FILE` overrides the default
//! location of `logs/skillscope.log`. File writes go through a non-blocking
//! worker so request handling never waits on disk.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_LOG_FILE: &str = "logs/skillscope.log";

// Keeps the non-blocking writer's worker alive for the process lifetime.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Configure tracing subscribers for stdout and optional file logging.
///
/// `RUST_LOG` controls filtering and defaults to `info`. When the log file
/// cannot be opened the file layer is skipped rather than failing startup.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    match open_log_writer() {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).init();
        }
        None => registry.init(),
    }
}

fn log_file_path() -> PathBuf {
    std::env::var("SKILLSCOPE_LOG_FILE")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_LOG_FILE), PathBuf::from)
}

/// Open the log file for appending behind a non-blocking writer.
///
/// Returns `None` when the parent directory cannot be created or the file
/// cannot be opened; the caller then runs with the stdout layer alone.
fn open_log_writer() -> Option<NonBlocking> {
    let path = log_file_path();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(err) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create log directory {}: {err}", parent.display());
        return None;
    }

    match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}
