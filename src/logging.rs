use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "ticket_dash.log";

/// Install the global subscriber: JSON lines to a daily file under
/// `config.directory`, plain text to stdout.
///
/// The returned guard flushes the file writer when dropped, so hold it for as
/// long as the process should keep logging.
pub fn init_logging(config: &LoggingConfig) -> WorkerGuard {
    let directory = Path::new(&config.directory);
    if let Err(e) = fs::create_dir_all(directory) {
        eprintln!("cannot create log directory {}: {}", directory.display(), e);
    }

    let file_appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter(&config.filter))
        .with(fmt::layer().json().with_writer(file_writer))
        .with(fmt::layer().with_writer(std::io::stdout))
        .init();

    guard
}

/// `RUST_LOG` when set and valid, else `fallback`, else plain `info`
fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_fallback_filter_still_builds() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        assert_eq!(env_filter("ticket_dash=debug").to_string(), "ticket_dash=debug");
        assert_eq!(env_filter("ticket_dash=loud").to_string(), "info");
    }
}
