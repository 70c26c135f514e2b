//! Process bootstrap: fills the configuration store before anything else runs.
//!
//! Order of writes (later steps win, except the file):
//!
//! 1. Built-in defaults (`config`, `log_stream`)
//! 2. Program mode derived from `argv[0]`
//! 3. Command-line flags and environment variables (`set`)
//! 4. The configuration file (`define`, never overwrites 1-3)

use crate::config::{self, ConfigStore, LoadReport, Variable, keys};
use crate::logging::LogStream;
use crate::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default config file, relative to the directory holding the executable.
pub const DEFAULT_CONFIG_RELATIVE: &str = "../proxy.conf";

/// Executable name that switches the host into debug mode.
pub const DEBUG_PROGRAM_NAME: &str = "debug_proxy";

/// Environment variable overriding the config file path.
pub const CONFIG_PATH_ENV: &str = "PROXY_CONFIG_PATH";

/// Environment variable overriding the log file path.
pub const LOG_PATH_ENV: &str = "PROXY_LOG_PATH";

/// Environment variable listing plugins, comma separated.
pub const PLUGINS_ENV: &str = "PROXY_MASTER_PLUGINS";

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub logs: Option<PathBuf>,
    pub plugins: Vec<String>,
}

/// How the host was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramMode {
    Normal,
    Debug,
}

impl ProgramMode {
    pub fn code(self) -> i64 {
        match self {
            Self::Normal => 0,
            Self::Debug => 1,
        }
    }
}

/// Directory part of `arg0`, keeping the trailing separator; `./` when
/// `arg0` has no directory part.
pub fn exec_dir(arg0: &str) -> PathBuf {
    match arg0.rfind('/') {
        Some(pos) => PathBuf::from(&arg0[..=pos]),
        None => PathBuf::from("./"),
    }
}

/// Write the built-in defaults.
pub fn apply_defaults(store: &ConfigStore, arg0: &str) -> Result<()> {
    let config_path = exec_dir(arg0).join(DEFAULT_CONFIG_RELATIVE);
    store.set(&Variable::string(
        keys::CONFIG,
        config_path.to_string_lossy(),
    ))?;
    store.set(&Variable::integer(
        keys::LOG_STREAM,
        LogStream::Stderr.code(),
    ))?;
    Ok(())
}

/// Derive the program mode from the executable name and record it.
pub fn apply_program_mode(store: &ConfigStore, arg0: &str) -> Result<ProgramMode> {
    let program = Path::new(arg0)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mode = if program == DEBUG_PROGRAM_NAME {
        store.set(&Variable::integer(
            keys::LOG_STREAM,
            LogStream::Stdout.code(),
        ))?;
        ProgramMode::Debug
    } else {
        ProgramMode::Normal
    };
    store.set(&Variable::integer(keys::PROGRAM_MODE, mode.code()))?;
    debug!(?mode, "program mode set");
    Ok(mode)
}

/// Write command-line and environment overrides.
pub fn apply_overrides(store: &ConfigStore, overrides: &Overrides) -> Result<()> {
    if let Some(path) = &overrides.config {
        store.set(&Variable::string(keys::CONFIG, path.to_string_lossy()))?;
    }
    if let Some(path) = &overrides.logs {
        store.set(&Variable::string(keys::LOGS, path.to_string_lossy()))?;
    }
    let plugins: Vec<&str> = overrides
        .plugins
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if !plugins.is_empty() {
        store.set(&Variable::strings(keys::PLUGINS, plugins))?;
    }
    Ok(())
}

/// An initialized store together with what happened while filling it.
pub struct Boot {
    pub store: ConfigStore,
    pub mode: ProgramMode,
    pub config_path: PathBuf,
    /// `None` when the default config file does not exist
    pub load: Option<LoadReport>,
}

impl Boot {
    /// Tear the store down.
    pub fn shutdown(self) -> Result<()> {
        self.store.teardown()
    }
}

/// Run the whole bootstrap sequence.
///
/// A missing config file is only an error when its path was given
/// explicitly; a missing default file means running without configuration.
/// Syntax and permission errors are always returned.
pub fn boot(arg0: &str, overrides: &Overrides) -> Result<Boot> {
    let store = ConfigStore::new();
    store.init()?;

    apply_defaults(&store, arg0)?;
    let mode = apply_program_mode(&store, arg0)?;
    apply_overrides(&store, overrides)?;

    let config_path = store
        .get_string(keys::CONFIG)?
        .map(PathBuf::from)
        .ok_or_else(|| Error::Undefined(keys::CONFIG.to_string()))?;

    let load = match config::load(&store, &config_path) {
        Ok(report) => Some(report),
        Err(Error::NotFound(_)) if overrides.config.is_none() => {
            debug!(path = %config_path.display(), "default config file absent");
            None
        }
        Err(e) => return Err(e),
    };

    Ok(Boot {
        store,
        mode,
        config_path,
        load,
    })
}
