//! Tracing initialization: bounded stdout plus rotated file logs.
//!
//! stdout gets the configured level in a compact human format; the file
//! layer writes full metadata with daily rotation into `logs/<mode>/` and
//! honors `RUST_LOG` for debugging.

use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Hold the returned guard for the lifetime of the process or buffered
/// file logs are lost.
pub fn init(log_dir: &Path, level: &str) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(log_dir, "seqtape.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stdout_layer = fmt::layer()
        .compact()
        .without_time()
        .with_filter(EnvFilter::new(level.to_string()));

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(file_filter);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .ok(); // A second init in tests is harmless.

    Ok(guard)
}
