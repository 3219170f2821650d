//! Tracing bootstrap for the installer binary
//!
//! Console output goes to stderr so stdout carries only the run summary.
//! File output is non-blocking; the returned guard must outlive the run.

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::Layered;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};

type FilteredRegistry = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// Install the global subscriber described by `config`
///
/// `RUST_LOG` wins over `config.level`. A second call in the same process
/// leaves the first subscriber in place.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if config.target.writes_console() {
        layers.push(format_layer(&config.format, std::io::stderr, true));
    }

    let guard = if config.target.writes_file() {
        let (writer, guard) = file_writer(config);
        layers.push(format_layer(&config.format, writer, false));
        Some(guard)
    } else {
        None
    };

    if let Err(e) = tracing_subscriber::registry().with(filter).with(layers).try_init() {
        eprintln!("Warning: logging already initialized: {}", e);
    }

    guard
}

/// One fmt layer in the configured format
fn format_layer<W>(format: &LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_ansi(ansi);
    match format {
        LogFormat::Json => layer.json().with_target(true).boxed(),
        LogFormat::Compact => layer.compact().with_target(false).boxed(),
        LogFormat::Pretty => layer.with_target(true).with_thread_ids(false).boxed(),
    }
}

/// Non-blocking file writer, rotated daily when configured
fn file_writer(config: &LoggingConfig) -> (NonBlocking, WorkerGuard) {
    if let Err(e) = std::fs::create_dir_all(&config.log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            config.log_dir, e
        );
    }

    let appender = if config.daily_rotation {
        tracing_appender::rolling::daily(&config.log_dir, &config.log_prefix)
    } else {
        tracing_appender::rolling::never(&config.log_dir, &config.log_prefix)
    };

    tracing_appender::non_blocking(appender)
}
