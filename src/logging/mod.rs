//! Logging setup
//!
//! Builds one `tracing-subscriber` fmt layer per configured output. Each
//! layer has its own writer, format and inclusive level range, so e.g.
//! info..warn can go to stdout while errors go to a JSON file. `RUST_LOG`
//! narrows all outputs further when set.

use crate::config::{LogFormat, LogOutputConfig, LogTarget, LoggingConfig};
use anyhow::Context;
use std::path::Path;
use tracing::{Level, Metadata};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{filter_fn, FilterFn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Type-erased output layer
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the background writer threads alive. Dropping it flushes pending
/// events and stops the writers.
#[must_use = "logs stop being written once the guard is dropped"]
pub struct LogGuard {
    _workers: Vec<WorkerGuard>,
}

/// Install the global subscriber for `config`
pub fn init(config: &LoggingConfig) -> anyhow::Result<LogGuard> {
    let (layers, guard) = build_layers(config)?;
    tracing_subscriber::registry()
        .with(layers)
        .with(EnvFilter::try_from_default_env().ok())
        .try_init()?;
    Ok(guard)
}

/// Build the layers for every effective output
pub fn build_layers(config: &LoggingConfig) -> anyhow::Result<(Vec<BoxedLayer>, LogGuard)> {
    let mut layers = Vec::new();
    let mut workers = Vec::new();
    for output in config.effective_outputs().iter() {
        let (layer, worker) = output_layer(output)?;
        layers.push(layer);
        workers.push(worker);
    }
    Ok((layers, LogGuard { _workers: workers }))
}

fn output_layer(output: &LogOutputConfig) -> anyhow::Result<(BoxedLayer, WorkerGuard)> {
    output.validate()?;

    // Events are handed to a writer thread so request tasks never block on I/O
    let (writer, worker) = match output.target {
        LogTarget::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogTarget::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogTarget::File => {
            let path = output.path.as_deref().unwrap_or_default();
            tracing_appender::non_blocking(file_appender(path)?)
        }
    };
    let ansi = output.target != LogTarget::File;
    let min = Level::from(output.min_level);
    let max = Level::from(output.max_level);

    let layer = fmt::layer().with_writer(writer).with_ansi(ansi);
    let layer = match output.format {
        LogFormat::Plain => layer.with_filter(level_range(min, max)).boxed(),
        LogFormat::Json => layer.json().with_filter(level_range(min, max)).boxed(),
    };
    Ok((layer, worker))
}

/// Append-only appender for `path`; creates missing parent directories
fn file_appender(path: &str) -> anyhow::Result<RollingFileAppender> {
    let path = Path::new(path);
    let file_name = path
        .file_name()
        .with_context(|| format!("log path has no file name: {}", path.display()))?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

type RangeFilter = FilterFn<Box<dyn Fn(&Metadata<'_>) -> bool + Send + Sync>>;

fn level_range(min: Level, max: Level) -> RangeFilter {
    let check: Box<dyn Fn(&Metadata<'_>) -> bool + Send + Sync> =
        Box::new(move |meta| level_in_range(*meta.level(), min, max));
    filter_fn(check)
}

/// `min` is the most verbose level written, `max` the most severe.
///
/// tracing orders levels by verbosity, so ERROR is the smallest.
fn level_in_range(level: Level, min: Level, max: Level) -> bool {
    level <= min && level >= max
}
