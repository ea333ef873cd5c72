//! Tracing bootstrap shared by every binary in the workspace.

use std::fs;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

/// Installs the global subscriber: a daily rolling file layer, plus a
/// coloured stderr layer when `LOG_TO_CONSOLE=true`.
///
/// The returned guard flushes the non-blocking file writer on drop, so keep it
/// alive in `main` for as long as the process runs.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    fs::create_dir_all(&config.log_dir).ok();

    let file_appender = rolling::daily(&config.log_dir, &config.log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true);

    let env_filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    if config.log_to_console {
        registry.with(console_layer).init();
    } else {
        registry.init();
    }

    guard
}
