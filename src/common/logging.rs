//! Logging and tracing configuration
//!
//! Logs go to stderr so that `--json` output on stdout stays machine-readable.
//! An optional log file receives the full, non-coloured stream.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default filter when `RUST_LOG` is unset
fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("smoke=debug,info")
        } else {
            EnvFilter::new("smoke=info,warn")
        }
    })
}

/// Initialize tracing for the CLI
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate (DEBUG with `verbose`), WARN for
/// dependencies. When `log_file` is given, a second layer appends to it; keep
/// the returned guard alive until exit so buffered lines are flushed.
pub fn init_cli(verbose: bool, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let (file_layer, guard) = match log_file.and_then(file_writer) {
        Some((writer, guard)) => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            (Some(layer.boxed()), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

fn file_writer(
    path: &Path,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let file_name = path.file_name()?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if std::fs::create_dir_all(directory).is_err() {
        return None;
    }
    let appender = tracing_appender::rolling::never(directory, file_name);
    Some(tracing_appender::non_blocking(appender))
}

/// Default log file location when `--log-file` is given without a path
pub fn default_log_file() -> Option<std::path::PathBuf> {
    super::paths::log_dir().map(|dir| dir.join("smoke.log"))
}
