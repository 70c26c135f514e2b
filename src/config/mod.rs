//! Configuration core for the proxy host.
//!
//! This module implements the configuration language and the store that holds
//! its results:
//!
//! - [`value`] - typed values (`Integer`, `Real`, `String`, scalar or array)
//! - [`lexer`] - the line parser, one statement per line
//! - [`store`] - the hash-table store with copy-in/copy-out access
//! - [`loader`] - the file driver that feeds parsed lines into the store
//!
//! ## File format
//!
//! ```text
//! max_size = 42
//! min_level = 0.054            # trailing comment
//! group. = "system"            # subsequent keys become system.<key>
//! the_best_subjects = ["math", "programming"]
//! ```
//!
//! ## Precedence
//!
//! Command-line and environment overrides are written with
//! [`ConfigStore::set`] before the file is read. The file driver only uses
//! [`ConfigStore::define`], so it never replaces a value that is already set.

pub mod lexer;
pub mod loader;
pub mod store;
pub mod value;

pub use lexer::{LineOutcome, ParsedLine, SyntaxError, parse_line};
pub use loader::{DuplicateSkip, LoadReport, LoadStatus, load, load_str};
pub use store::{ConfigStore, DEFAULT_BUCKETS, hash_name, is_valid_name};
pub use value::{Value, Values, VarType, Variable};

/// Well-known variable names written by the bootstrap collaborators.
pub mod keys {
    /// Path to the configuration file (string)
    pub const CONFIG: &str = "config";
    /// Log file path (string)
    pub const LOGS: &str = "logs";
    /// Plugins to load, in order (string array)
    pub const PLUGINS: &str = "plugins";
    /// Log destination (integer, see [`crate::logging::LogStream`])
    pub const LOG_STREAM: &str = "log_stream";
    /// Default log filter directive (string)
    pub const LOG_LEVEL: &str = "log_level";
    /// 1 when running as `debug_proxy`, otherwise 0 (integer)
    pub const PROGRAM_MODE: &str = "program_mode";
}
