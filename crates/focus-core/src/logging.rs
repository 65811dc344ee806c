//! Log file setup.
//!
//! Logs go to `focus.log` (`focus_<env>.log` under `FOCUS_ENV`) in the data
//! directory, never to the terminal the timer draws on. `RUST_LOG` overrides
//! the default `info` level.

use std::path::PathBuf;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Paths;
use crate::error::Result;

/// Keeps the background log writer alive; flushes on drop.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Install the global subscriber. Hold the guard for the life of the
/// process.
pub fn init(paths: &Paths) -> Result<LoggingGuard> {
    std::fs::create_dir_all(paths.root())?;

    let file_appender = tracing_appender::rolling::never(paths.root(), paths.log_file_name());
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init();

    tracing::debug!(log_file = %log_file_path(paths).display(), "logging initialized");

    Ok(LoggingGuard { _guard: guard })
}

/// Log to the test harness writer.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn log_file_path(paths: &Paths) -> PathBuf {
    paths.root().join(paths.log_file_name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_follows_env_suffix() {
        let paths = Paths::at("/tmp/focus-test").with_env("dev");
        assert!(log_file_path(&paths).ends_with("focus_dev.log"));
        assert!(log_file_path(&Paths::at("/tmp/focus-test")).ends_with("focus.log"));
    }
}
