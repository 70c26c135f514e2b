//! CLI argument definitions for the proxy host.

use crate::bootstrap::{CONFIG_PATH_ENV, LOG_PATH_ENV, Overrides, PLUGINS_ENV};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Proxy host - loads its configuration, then its plugins, then runs.
///
/// Without a subcommand the host runs once and exits. Use `proxy run
/// --foreground` to keep it alive until interrupted.
#[derive(Parser, Debug)]
#[command(name = "proxy")]
#[command(author, version, about = "Plugin-driven proxy host", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Configuration file to load instead of <exe dir>/../proxy.conf.
    /// A missing file is an error when given explicitly.
    #[arg(short = 'c', long = "config", global = true, env = CONFIG_PATH_ENV)]
    pub config: Option<PathBuf>,

    /// Write logs to this file
    #[arg(short = 'l', long = "logs", global = true, env = LOG_PATH_ENV)]
    pub logs: Option<PathBuf>,

    /// Plugins to load, in order (comma separated)
    #[arg(
        short = 'p',
        long = "plugins",
        global = true,
        env = PLUGINS_ENV,
        value_delimiter = ','
    )]
    pub plugins: Vec<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Overrides to write into the store before the config file is read.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            config: self.config.clone(),
            logs: self.logs.clone(),
            plugins: self.plugins.clone(),
        }
    }
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Boot the host: load configuration and plugins, run the executor
    ///
    /// Prints a one-line JSON summary on exit. When invoked as `debug_proxy`
    /// log lines precede it on stdout.
    Run {
        /// Keep running until interrupted (Ctrl-C)
        #[arg(long)]
        foreground: bool,
    },

    /// Configuration inspection commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show every variable after defaults, overrides and the config file
    Show,

    /// Get a single variable
    Get {
        /// Variable name (e.g. `system.max_size`)
        name: String,
    },

    /// Parse a configuration file without booting the host
    Check {
        /// File to check
        path: PathBuf,
    },
}
