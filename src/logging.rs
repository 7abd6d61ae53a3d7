//! Tracing setup: stdout, or a daily rolling file when a log dir is configured.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

const LOG_FILE: &str = "minna-hiraizumi.log";

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// life of the process.
pub fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    match log_dir.and_then(rolling_file_writer) {
        Some((writer, guard)) => {
            let _ = builder.with_ansi(false).with_writer(writer).try_init();
            Some(guard)
        }
        None => {
            let _ = builder.try_init();
            None
        }
    }
}

fn rolling_file_writer(dir: &Path) -> Option<(BoxMakeWriter, WorkerGuard)> {
    if let Err(err) = std::fs::create_dir_all(dir) {
        eprintln!(
            "Warning: could not create log dir {}: {err}; logging to stdout",
            dir.display()
        );
        return None;
    }
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    Some((BoxMakeWriter::new(non_blocking), guard))
}
