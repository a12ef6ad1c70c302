//! Logging setup.
//!
//! Logs go to `$XDG_STATE_HOME/parentshield/parentshield.log` with daily rotation.
//! `RUST_LOG` overrides the configured level.

use crate::config::{state_dir, LoggingConfig};
use crate::error::ClientError;
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_NAME: &str = "parentshield.log";

/// Initialize the global subscriber. Keep the returned guard alive for the process
/// lifetime; dropping it flushes pending writes.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, ClientError> {
    let log_dir = state_dir();

    std::fs::create_dir_all(&log_dir).map_err(|e| {
        ClientError::Validation(format!("Failed to create log dir {}: {}", log_dir.display(), e))
    })?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| ClientError::Validation(format!("Logging already initialized: {}", e)))?;

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Initialize logging for tests (captured test writer)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Keeps the non-blocking writer alive
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

pub fn log_file_path() -> PathBuf {
    state_dir().join(LOG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path() {
        assert!(log_file_path().ends_with("parentshield/parentshield.log"));
    }
}
