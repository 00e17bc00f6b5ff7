//! Logging setup for pipeline diagnostics.
//!
//! Routes `tracing` events to a session log file and to the terminal. The
//! session file is truncated at startup so each run reads from the top,
//! and the `RUST_LOG` environment variable narrows or widens what gets
//! recorded (default `info`).
//!
//! # Example
//!
//! ```no_run
//! use tilestream::logging;
//!
//! let _guard = logging::init_logging("logs", "session.log")?;
//! tracing::info!("pipeline starting");
//! # Ok::<(), std::io::Error>(())
//! ```

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default directory for session logs.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Default session log file name.
pub const DEFAULT_LOG_FILE: &str = "tilestream.log";

/// Keeps the background log writer alive.
///
/// The file layer writes through a non-blocking channel; dropping the
/// guard flushes buffered records and closes the file. Hold it for as
/// long as the process logs anything.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initializes `tracing` with a file writer and a terminal writer.
///
/// Creates `log_dir` when missing and truncates any previous session
/// file. Filtering follows `RUST_LOG` with an `info` fallback. When a
/// subscriber is already installed the existing one is kept and only the
/// file preparation takes effect.
///
/// # Errors
///
/// Returns an error when the log directory cannot be created or the old
/// session file cannot be truncated.
pub fn init_logging(log_dir: &str, log_file: &str) -> Result<LoggingGuard, io::Error> {
    fs::create_dir_all(log_dir)?;
    fs::write(Path::new(log_dir).join(log_file), "")?;

    let appender = tracing_appender::rolling::never(log_dir, log_file);
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false);
    let console_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .ok();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Console-only initialization for tests and short-lived tools.
///
/// Safe to call more than once; later calls keep the first subscriber.
pub fn init_console_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .ok();
}
