//! Logging initialization for the lens binary.
//!
//! Two modes are supported:
//! - Cli mode: logs to STDERR so command output on STDOUT stays parseable.
//! - Server mode: logs to STDERR and to a rolling file in the data directory,
//!   keeping STDOUT free for the JSON-lines protocol.
//!
//! The log file is rolled over when it reaches 5 MB. Rotated logs are
//! compressed and at most 20 of them are kept.

use anyhow::Result;
use file_rotate::{ContentLimit, FileRotate, compression::Compression, suffix::AppendCount};
use lens_config::DataDirectory;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt::writer::MakeWriterExt};

const MAX_LOG_FILE_BYTES: usize = 5 * 1024 * 1024;
const MAX_ROTATED_FILES: usize = 20;

pub enum LogMode<'a> {
    Cli,
    Server(&'a DataDirectory),
}

/// Guard that keeps background logging workers alive.
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

pub fn init(mode: LogMode<'_>, verbose: bool) -> Result<Option<LoggingGuards>> {
    let filter = env_filter(verbose);

    match mode {
        LogMode::Cli => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;
            Ok(None)
        }
        LogMode::Server(data_directory) => {
            let writer = FileRotate::new(
                data_directory.log_file_path(),
                AppendCount::new(MAX_ROTATED_FILES),
                ContentLimit::Bytes(MAX_LOG_FILE_BYTES),
                Compression::OnRotate(1),
                None,
            );

            let (file_non_blocking, file_guard) = tracing_appender::non_blocking(writer);
            // The editor host may not drain stderr; bound the buffer and drop
            // lines beyond it rather than blocking analysis.
            let (stderr_non_blocking, stderr_guard) = NonBlockingBuilder::default()
                .lossy(true)
                .buffered_lines_limit(10_000)
                .finish(std::io::stderr());

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(
                    file_non_blocking
                        .with_max_level(tracing::Level::INFO)
                        .and(stderr_non_blocking),
                )
                .with_ansi(false)
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

            Ok(Some(LoggingGuards {
                _guards: vec![file_guard, stderr_guard],
            }))
        }
    }
}
