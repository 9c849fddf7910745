//! Logging initialization for the command-line tool
//!
//! The library only emits `tracing` events. The binary calls
//! [`init_logging`] once to send them to stderr and to `backup.log` in the
//! archive directory.
//!
//! # Environment Variables
//! - `USAGE_BACKUP_LOG`: filter override (e.g. "usage_backup=debug")

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::paths::LOG_FILE;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "USAGE_BACKUP_LOG";

/// Filter used when the environment does not set one
pub const DEFAULT_FILTER: &str = "info";

/// Build the event filter from the environment, falling back to `info`
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber
///
/// Scheduled runs already append stderr to the log file, so they pass
/// `console = false`. File output is skipped with a warning on stderr when
/// the log directory cannot be created. Keep the returned guard alive until
/// exit so buffered file output is flushed.
pub fn init_logging(log_dir: &Path, console: bool) -> Option<WorkerGuard> {
    let console_layer = console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .boxed()
    });

    let (file_layer, guard) = match std::fs::create_dir_all(log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .boxed();
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!(
                "Warning: Failed to create log directory {}: {}",
                log_dir.display(),
                e
            );
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::debug!(log_dir = %log_dir.display(), "Logging initialized");

    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_default_filter_level() {
        let filter = EnvFilter::new(DEFAULT_FILTER);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }
}
