//! Configuration file driver.
//!
//! Reads a file line by line, runs each line through the lexer, and defines
//! every parsed variable in the [`ConfigStore`].
//!
//! ## Groups
//!
//! A key ending in `.` is a directive: its value, a single string, becomes the
//! group that qualifies every following key in the same file. With group
//! `sys`, `level = 5` is stored as `sys.level`. An empty string returns to
//! the unqualified namespace. Group state belongs to one load call and never
//! reaches the store.
//!
//! ## Failure
//!
//! Loading is not transactional. A syntax error aborts the load at the
//! offending line, but everything defined by earlier lines stays in the store.
//! Duplicate names are not errors: the first definition wins and the skip is
//! recorded in the [`LoadReport`].

use super::lexer::{LineOutcome, ParsedLine, parse_line};
use super::store::ConfigStore;
use super::value::{Values, Variable};
use crate::{Error, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Whether a load produced any statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    /// At least one `key = value` line was read
    Loaded,
    /// Only blank lines and comments
    Empty,
}

/// A definition skipped because the name was already present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateSkip {
    pub line: usize,
    pub name: String,
}

/// Outcome of a successful load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub status: LoadStatus,
    /// Number of lines read
    pub lines: usize,
    /// Qualified names defined, in file order
    pub defined: Vec<String>,
    pub skipped: Vec<DuplicateSkip>,
}

impl LoadReport {
    pub fn is_empty(&self) -> bool {
        self.status == LoadStatus::Empty
    }
}

/// Load the configuration file at `path` into `store`.
pub fn load(store: &ConfigStore, path: &Path) -> Result<LoadReport> {
    let file = open_config(path)?;
    let mut report = load_reader(store, BufReader::new(file))?;
    report.path = Some(path.to_path_buf());
    info!(
        path = %path.display(),
        defined = report.defined.len(),
        skipped = report.skipped.len(),
        "config file loaded"
    );
    Ok(report)
}

/// Load configuration text held in memory.
pub fn load_str(store: &ConfigStore, text: &str) -> Result<LoadReport> {
    load_reader(store, text.as_bytes())
}

fn open_config(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => Error::PermissionDenied(path.to_path_buf()),
        _ => Error::Io(e),
    })
}

fn load_reader<R: BufRead>(store: &ConfigStore, mut reader: R) -> Result<LoadReport> {
    let mut report = LoadReport {
        path: None,
        status: LoadStatus::Empty,
        lines: 0,
        defined: Vec::new(),
        skipped: Vec::new(),
    };
    let mut group = GroupScope::default();
    let mut buf = String::new();

    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        report.lines += 1;
        let line_no = report.lines;
        let line = strip_newline(&buf);

        let parsed = match parse_line(line) {
            LineOutcome::Blank | LineOutcome::Comment => continue,
            LineOutcome::SyntaxError(e) => {
                return Err(Error::Syntax {
                    line: line_no,
                    column: e.column,
                    reason: e.reason.to_string(),
                    text: line.to_string(),
                });
            }
            LineOutcome::Parsed(parsed) => parsed,
        };
        report.status = LoadStatus::Loaded;

        if parsed.is_directive() {
            group.apply(parsed, line_no, line)?;
            continue;
        }

        let name = group.qualify(&parsed.key);
        let var = Variable::new(name.as_str(), parsed.values);
        match store.define(&var) {
            Ok(()) => {
                debug!(line = line_no, name = %name, "variable defined");
                report.defined.push(name);
            }
            Err(Error::DuplicateKey(_)) => {
                debug!(line = line_no, name = %name, "duplicate variable skipped");
                report.skipped.push(DuplicateSkip {
                    line: line_no,
                    name,
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

/// Strip one trailing line terminator (`\n` or `\r\n`).
fn strip_newline(line: &str) -> &str {
    match line.strip_suffix('\n') {
        Some(rest) => rest.strip_suffix('\r').unwrap_or(rest),
        None => line,
    }
}

/// Current group prefix while reading one file.
#[derive(Debug, Default)]
struct GroupScope {
    current: Option<String>,
}

impl GroupScope {
    fn qualify(&self, key: &str) -> String {
        match &self.current {
            Some(group) => format!("{}.{}", group, key),
            None => key.to_string(),
        }
    }

    fn apply(&mut self, directive: ParsedLine, line: usize, text: &str) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidDirective {
            line,
            reason: reason.to_string(),
            text: text.to_string(),
        };
        let name = match directive.values {
            Values::String(mut names) if names.len() == 1 => names.remove(0),
            _ => return Err(invalid("group directive takes a single string")),
        };
        if name.is_empty() {
            self.current = None;
        } else if name.chars().all(|c| c.is_ascii_alphabetic() || c == '_') {
            debug!(line, group = %name, "group changed");
            self.current = Some(name);
        } else {
            return Err(invalid("group name may contain only letters and '_'"));
        }
        Ok(())
    }
}
