//! Logging setup for one-shot commands and the long-running watcher

use everywhere_core::LogConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

const LOG_FILE_NAME: &str = "everywhere.log";

/// Parse log level from config string
fn parse_log_level(level: &str) -> LevelFilter {
  match level.to_lowercase().as_str() {
    "off" => LevelFilter::OFF,
    "error" => LevelFilter::ERROR,
    "warn" => LevelFilter::WARN,
    "info" => LevelFilter::INFO,
    "debug" => LevelFilter::DEBUG,
    "trace" => LevelFilter::TRACE,
    _ => LevelFilter::INFO,
  }
}

/// Config-driven filter; `RUST_LOG` still wins
fn env_filter(config: &LogConfig) -> EnvFilter {
  EnvFilter::builder()
    .with_default_directive(parse_log_level(&config.level).into())
    .from_env_lossy()
}

/// Console logging for one-shot commands
///
/// Logs go to stderr so `list --json` output stays machine-readable.
pub fn init_cli_logging(config: &LogConfig) {
  tracing_subscriber::fmt()
    .with_env_filter(env_filter(config))
    .with_writer(std::io::stderr)
    .init();
}

/// Logging for `watch`.
///
/// In foreground mode: Logs to console with colors
/// In background mode: Logs to a rolling file under the data directory (no ANSI)
///
/// Returns the guard that must be kept alive for the duration of the program
pub fn init_watch_logging(config: &LogConfig, foreground: bool) -> Option<WorkerGuard> {
  if foreground {
    tracing_subscriber::fmt()
      .with_env_filter(env_filter(config))
      .with_target(true)
      .with_ansi(true)
      .init();
    return None;
  }

  let log_dir = index::default_data_dir();
  if std::fs::create_dir_all(&log_dir).is_err() {
    // Fall back to console-only logging
    init_cli_logging(config);
    return None;
  }

  let file_appender = match config.rotation.as_str() {
    "hourly" => tracing_appender::rolling::hourly(&log_dir, LOG_FILE_NAME),
    "never" => tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME),
    _ => tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME),
  };
  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::fmt()
    .with_env_filter(env_filter(config))
    .with_target(true)
    .with_ansi(false)
    .with_writer(file_writer)
    .init();

  Some(guard)
}
