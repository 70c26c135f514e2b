//! proxyhost - bootstrap configuration core for a plugin-extensible proxy host.
//!
//! The library provides the configuration language front end and the
//! configuration store consumed by the rest of the process, together with the
//! bootstrap collaborators that feed it (defaults, command-line and
//! environment overrides), the logging sink selection, and the plugin stack.

pub mod bootstrap;
pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod plugins;

use std::path::PathBuf;

/// Library-level error type for proxyhost operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("No permission to read config file: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("Config syntax error in line {line}, column {column}: {reason}: \"{text}\"")]
    Syntax {
        line: usize,
        column: usize,
        reason: String,
        text: String,
    },

    #[error("Invalid directive in line {line}: {reason}: \"{text}\"")]
    InvalidDirective {
        line: usize,
        reason: String,
        text: String,
    },

    #[error("Variable already defined: {0}")]
    DuplicateKey(String),

    #[error("Config table is already initialized")]
    AlreadyInitialized,

    #[error("Config table is not initialized")]
    NotInitialized,

    #[error("Variable has no value: {0}")]
    Undefined(String),

    #[error("Variable {name} has type {found}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: config::VarType,
        found: config::VarType,
    },

    #[error("Invalid variable name: '{0}'")]
    InvalidName(String),

    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("Plugin {name} failed: {message}")]
    Plugin { name: String, message: String },

    #[error("Logging error: {0}")]
    Logging(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for proxyhost operations.
pub type Result<T> = std::result::Result<T, Error>;
