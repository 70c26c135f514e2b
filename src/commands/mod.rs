//! Command implementations for the proxy CLI.
//!
//! - `run` - boot the host, load plugins, run the executor
//! - `config show` / `config get` - inspect the booted configuration
//! - `config check` - parse a file into a scratch store

use crate::bootstrap::{self, Boot, Overrides, ProgramMode};
use crate::config::{self, ConfigStore, DuplicateSkip, LoadReport, Variable};
use crate::logging::{self, LogSettings};
use crate::plugins::{PluginRegistry, PluginStack};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing::{info, warn};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait CommandResult {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
}

// === run ===

/// What happened during a host run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub version: String,
    pub commit: String,
    pub mode: ProgramMode,
    pub config_path: PathBuf,
    pub config_loaded: bool,
    pub variables: usize,
    pub skipped: Vec<DuplicateSkip>,
    pub plugins: Vec<String>,
    pub log: LogSettings,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
}

impl CommandResult for RunSummary {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "proxy {} ({}) ran in {} mode",
            self.version,
            self.commit,
            match self.mode {
                ProgramMode::Normal => "normal",
                ProgramMode::Debug => "debug",
            }
        )];
        if self.config_loaded {
            lines.push(format!(
                "  config: {} ({} variables)",
                self.config_path.display(),
                self.variables
            ));
        } else {
            lines.push(format!(
                "  config: {} (not found, defaults only)",
                self.config_path.display()
            ));
        }
        for skip in &self.skipped {
            lines.push(format!(
                "  skipped duplicate '{}' at line {}",
                skip.name, skip.line
            ));
        }
        if self.plugins.is_empty() {
            lines.push("  plugins: none".to_string());
        } else {
            lines.push(format!("  plugins: {}", self.plugins.join(", ")));
        }
        lines.push(format!(
            "  started {} / stopped {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.stopped_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        lines.join("\n")
    }
}

/// Boot the host with logging installed and run it.
///
/// With `foreground` the executor keeps running until Ctrl-C.
pub fn run(arg0: &str, overrides: &Overrides, foreground: bool) -> Result<RunSummary> {
    let boot = bootstrap::boot(arg0, overrides)?;
    let settings = LogSettings::from_store(&boot.store)?;
    let _guard = logging::init(&settings)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("PROXY_GIT_COMMIT"),
        built = env!("PROXY_BUILD_TIMESTAMP"),
        mode = ?boot.mode,
        "proxy host starting"
    );

    let registry = PluginRegistry::with_builtins();
    let result = execute(&boot, settings, &registry, || {
        if foreground {
            wait_for_interrupt()
        } else {
            Ok(())
        }
    });
    let teardown = boot.shutdown();
    let summary = result?;
    teardown?;
    info!("proxy host stopped");
    Ok(summary)
}

/// Load plugins, run the executor until `wait` returns, then close the
/// plugins. The plugins are closed whether or not the run succeeded; tearing
/// down the store is left to the owner of `boot`.
pub fn execute<W>(
    boot: &Boot,
    log: LogSettings,
    registry: &PluginRegistry,
    wait: W,
) -> Result<RunSummary>
where
    W: FnOnce() -> Result<()>,
{
    let skipped = boot
        .load
        .as_ref()
        .map(|report| report.skipped.clone())
        .unwrap_or_default();
    for skip in &skipped {
        warn!(name = %skip.name, line = skip.line, "variable already defined, file value ignored");
    }

    let mut plugins = PluginStack::from_config(registry, &boot.store)?;
    info!(plugins = plugins.len(), "plugins loaded");

    let started_at = Utc::now();
    let outcome = plugins
        .start_executor(&boot.store)
        .and_then(|()| wait())
        .and_then(|()| plugins.stop_executor(&boot.store));
    let stopped_at = Utc::now();
    let loaded = plugins.names();
    plugins.close();
    outcome?;

    Ok(RunSummary {
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("PROXY_GIT_COMMIT").to_string(),
        mode: boot.mode,
        config_path: boot.config_path.clone(),
        config_loaded: boot.load.is_some(),
        variables: boot.store.len()?,
        skipped,
        plugins: loaded,
        log,
        started_at,
        stopped_at,
    })
}

fn wait_for_interrupt() -> Result<()> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| Error::Other(format!("failed to set Ctrl+C handler: {}", e)))?;
    info!("running in foreground, press Ctrl-C to stop");
    rx.recv()
        .map_err(|e| Error::Other(format!("interrupt channel closed: {}", e)))?;
    info!("interrupt received");
    Ok(())
}

// === config show ===

/// Every variable after bootstrap.
#[derive(Debug, Serialize)]
pub struct ConfigShow {
    pub config_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadReport>,
    pub variables: Vec<Variable>,
}

impl CommandResult for ConfigShow {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = Vec::with_capacity(self.variables.len() + 1);
        let origin = if self.load.is_some() {
            "loaded"
        } else {
            "not found"
        };
        lines.push(format!("# {} ({})", self.config_path.display(), origin));
        lines.extend(self.variables.iter().map(ToString::to_string));
        lines.join("\n")
    }
}

pub fn config_show(arg0: &str, overrides: &Overrides) -> Result<ConfigShow> {
    let boot = bootstrap::boot(arg0, overrides)?;
    let variables = boot.store.snapshot()?;
    let result = ConfigShow {
        config_path: boot.config_path.clone(),
        load: boot.load.clone(),
        variables,
    };
    boot.shutdown()?;
    Ok(result)
}

// === config get ===

/// A single variable.
#[derive(Debug, Serialize)]
pub struct ConfigGet {
    pub variable: Variable,
}

impl CommandResult for ConfigGet {
    fn to_json(&self) -> String {
        json(&self.variable)
    }

    fn to_human(&self) -> String {
        self.variable.to_string()
    }
}

/// Look up `name` after bootstrap. A name nobody set is an error.
pub fn config_get(arg0: &str, overrides: &Overrides, name: &str) -> Result<ConfigGet> {
    if !config::is_valid_name(name) {
        return Err(Error::InvalidName(name.to_string()));
    }
    let boot = bootstrap::boot(arg0, overrides)?;
    let variable = boot
        .store
        .get(name)?
        .ok_or_else(|| Error::Undefined(name.to_string()))?;
    boot.shutdown()?;
    Ok(ConfigGet { variable })
}

// === config check ===

/// Result of parsing a file into a scratch store.
#[derive(Debug, Serialize)]
pub struct ConfigCheck {
    pub report: LoadReport,
    pub variables: Vec<Variable>,
}

impl CommandResult for ConfigCheck {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let path = self
            .report
            .path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let mut lines = vec![if self.report.is_empty() {
            format!("{}: OK (empty)", path)
        } else {
            format!(
                "{}: OK ({} lines, {} variables)",
                path,
                self.report.lines,
                self.variables.len()
            )
        }];
        for skip in &self.report.skipped {
            lines.push(format!(
                "  line {}: duplicate '{}' ignored",
                skip.line, skip.name
            ));
        }
        lines.join("\n")
    }
}

/// Parse `path` without booting: no defaults, no overrides.
pub fn config_check(path: &Path) -> Result<ConfigCheck> {
    let store = ConfigStore::new();
    store.init()?;
    let report = config::load(&store, path)?;
    let variables = store.snapshot()?;
    store.teardown()?;
    Ok(ConfigCheck { report, variables })
}
