//! Logging sink selection.
//!
//! The destination is read from the configuration store after the
//! configuration has been loaded:
//!
//! - `log_stream` - `1` stdout, `2` stderr, `3` file. Bootstrap always sets
//!   it (`2`, or `1` when running as `debug_proxy`), so a config file cannot
//!   change it.
//! - `logs` - log file path (`-l`, `PROXY_LOG_PATH` or the config file);
//!   selects the file sink unless `log_stream` is `1`
//! - `log_level` - default filter directive, overridden by `RUST_LOG`
//!
//! A file sink without a `logs` path, or an unknown `log_stream` code, falls
//! back to stderr. In debug mode logs share stdout with command output.

use crate::config::{ConfigStore, keys};
use crate::{Error, Result};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Filter directive used when neither `RUST_LOG` nor `log_level` is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Output stream codes stored in `log_stream`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
    File,
}

impl LogStream {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            3 => Some(Self::File),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Stdout => 1,
            Self::Stderr => 2,
            Self::File => 3,
        }
    }
}

/// Resolved logging destination and filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogSettings {
    pub stream: LogStream,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            stream: LogStream::Stderr,
            file: None,
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl LogSettings {
    /// Resolve the settings from the configuration store.
    pub fn from_store(store: &ConfigStore) -> Result<Self> {
        let requested = store
            .get_integer(keys::LOG_STREAM)?
            .and_then(LogStream::from_code)
            .unwrap_or(LogStream::Stderr);
        let file = store.get_string(keys::LOGS)?.map(PathBuf::from);
        let level = store
            .get_string(keys::LOG_LEVEL)?
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let stream = match (requested, &file) {
            (LogStream::Stdout, _) => LogStream::Stdout,
            (_, Some(_)) => LogStream::File,
            (LogStream::File, None) => LogStream::Stderr,
            (other, None) => other,
        };
        let file = if stream == LogStream::File { file } else { None };

        Ok(Self {
            stream,
            file,
            level,
        })
    }
}

/// Keeps the file writer flushing until dropped.
pub struct LogGuard {
    _worker: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed or the log file cannot be
/// opened.
pub fn init(settings: &LogSettings) -> Result<LogGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let mut worker = None;
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match (&settings.stream, &settings.file) {
        (LogStream::File, Some(path)) => {
            let file_name = path
                .file_name()
                .ok_or_else(|| Error::Logging(format!("not a file path: {}", path.display())))?;
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::never(&dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            worker = Some(guard);
            fmt::layer().with_ansi(false).with_writer(writer).boxed()
        }
        (LogStream::Stdout, _) => fmt::layer().with_writer(std::io::stdout).boxed(),
        _ => fmt::layer().with_writer(std::io::stderr).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    Ok(LogGuard { _worker: worker })
}
