//! Smoke tests for the proxy CLI.
//!
//! These tests verify basic CLI functionality:
//! - `proxy --version` outputs version info
//! - `proxy --help` outputs help text
//! - `proxy` (no args) runs once and outputs valid JSON

mod common;

use common::{TestEnv, parse_json};
use predicates::prelude::*;

#[test]
fn test_version_flag() {
    let env = TestEnv::new();
    env.proxy()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("proxy"))
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_help_flag() {
    let env = TestEnv::new();
    env.proxy()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn test_no_args_outputs_json() {
    let env = TestEnv::new();
    let config = env.write("proxy.conf", "");
    let output = env
        .proxy()
        .arg("-c")
        .arg(&config)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json = parse_json(&output);
    assert_eq!(json["mode"], "normal");
    assert_eq!(json["config_loaded"], true);
}

#[test]
fn test_human_readable_flag() {
    let env = TestEnv::new();
    let config = env.write("proxy.conf", "");
    env.proxy()
        .arg("-H")
        .arg("-c")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("ran in normal mode"))
        .stdout(predicate::str::contains("plugins: none"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let env = TestEnv::new();
    env.proxy().arg("frobnicate").assert().failure();
}
