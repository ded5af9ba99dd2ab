//! File logging setup using tracing
//!
//! Stdout belongs to the NDJSON replay output, so all diagnostics go to a
//! daily rolling file instead.

use std::path::{Path, PathBuf};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Environment variable controlling the log filter
pub const LOG_ENV_VAR: &str = "LIVEPOLLS_LOG";

/// Environment variable overriding the log directory
pub const LOG_DIR_ENV_VAR: &str = "LIVEPOLLS_LOG_DIR";

/// Filter used when `LIVEPOLLS_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "live_polls=info,polls_app=info,warn";

const LOG_FILE_NAME: &str = "livepolls.log";

/// Install the global subscriber, logging to [`log_directory()`]
///
/// # Examples
/// ```bash
/// LIVEPOLLS_LOG=debug livepolls replay script.ndjson
/// LIVEPOLLS_LOG=polls_app=trace,polls_realtime=debug livepolls replay script.ndjson
/// ```
pub fn init() -> Result<()> {
    let log_dir = log_directory();
    init_in(&log_dir)
}

/// Install the global subscriber, logging into `log_dir`
pub fn init_in(log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_NAME);
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::info!("LivePolls logging to {}", log_dir.display());
    Ok(())
}

/// Log directory: `LIVEPOLLS_LOG_DIR` if set, else
/// `<data_local_dir>/live-polls/logs`
pub fn log_directory() -> PathBuf {
    if let Some(dir) = std::env::var_os(LOG_DIR_ENV_VAR).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("live-polls")
        .join("logs")
}

/// Base path of the log file; the appender adds a date suffix
pub fn current_log_file() -> PathBuf {
    log_directory().join(LOG_FILE_NAME)
}
