//! Common test utilities for proxy integration tests.
//!
//! Provides `TestEnv`, a scratch directory plus a `proxy` command that does
//! not inherit `PROXY_*` overrides from the caller's environment.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// Environment variables read by the binary.
pub const PROXY_ENV_VARS: [&str; 4] = [
    "PROXY_CONFIG_PATH",
    "PROXY_LOG_PATH",
    "PROXY_MASTER_PLUGINS",
    "RUST_LOG",
];

pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `text` to `name` inside the scratch directory.
    pub fn write(&self, name: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, text).unwrap();
        path
    }

    /// Get a Command for the proxy binary with a clean environment.
    pub fn proxy(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_proxy"));
        self.isolate(&mut cmd);
        cmd
    }

    /// Same binary, invoked through a symlink called `name` in `bin/`.
    #[cfg(unix)]
    pub fn proxy_as(&self, name: &str) -> Command {
        let bin = self.dir.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let link = bin.join(name);
        if !link.exists() {
            std::os::unix::fs::symlink(env!("CARGO_BIN_EXE_proxy"), &link).unwrap();
        }
        let mut cmd = Command::new(link);
        self.isolate(&mut cmd);
        cmd
    }

    fn isolate(&self, cmd: &mut Command) {
        cmd.current_dir(self.dir.path());
        for var in PROXY_ENV_VARS {
            cmd.env_remove(var);
        }
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse stdout as JSON.
pub fn parse_json(stdout: &[u8]) -> serde_json::Value {
    serde_json::from_slice(stdout).unwrap()
}
