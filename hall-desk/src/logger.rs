//! Logging Infrastructure
//!
//! Logs go to stderr, or to a daily rolling file when a log directory is
//! configured so the interactive console stays readable.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "hall_desk={level},hall_client={level}";

/// Initialize the logger
///
/// `RUST_LOG` takes precedence over `level`. The returned guard flushes the
/// file writer and must be held until exit.
pub fn init_logger(level: &str, log_dir: Option<&str>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES.replace("{level}", level)));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    if let Some(dir) = log_dir {
        let log_path = Path::new(dir);
        if log_path.is_dir() {
            let file_appender = tracing_appender::rolling::daily(log_path, "hall-desk");
            let (writer, guard) = tracing_appender::non_blocking(file_appender);
            subscriber.with_ansi(false).with_writer(writer).init();
            return Some(guard);
        }
        eprintln!("LOG_DIR {dir} is not a directory, logging to stderr");
    }

    subscriber.with_writer(std::io::stderr).init();
    None
}
