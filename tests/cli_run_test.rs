//! Integration tests for `proxy run`.
//!
//! The foreground mode waits for Ctrl-C and is not exercised here; these
//! tests cover the single-shot run: logging sinks, plugin loading and the
//! summary printed on exit.

mod common;

use common::{TestEnv, parse_json};
use predicates::prelude::*;
use std::fs;

#[test]
fn test_run_loads_status_plugin() {
    let env = TestEnv::new();
    let config = env.write("proxy.conf", "plugins = [\"status\"]\nworkers = 4\n");
    let stdout = env
        .proxy()
        .arg("run")
        .arg("-c")
        .arg(&config)
        .assert()
        .success()
        .stderr(predicate::str::contains("executor started"))
        .stderr(predicate::str::contains("executor stopped"))
        .get_output()
        .stdout
        .clone();
    let json = parse_json(&stdout);
    assert_eq!(json["plugins"], serde_json::json!(["status"]));
    assert_eq!(json["log"]["stream"], "stderr");
    assert!(json["variables"].as_u64().unwrap() >= 5);
    assert!(json["started_at"].is_string());
}

#[test]
fn test_plugins_flag_overrides_file() {
    let env = TestEnv::new();
    let config = env.write("proxy.conf", "plugins = [\"missing\"]\n");
    env.proxy()
        .args(["-H", "run", "-p", "status", "-c"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("plugins: status"));
}

#[test]
fn test_unknown_plugin_fails() {
    let env = TestEnv::new();
    let config = env.write("proxy.conf", "");
    env.proxy()
        .args(["run", "-p", "status,nope", "-c"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown plugin: nope"));
}

#[test]
fn test_duplicate_definitions_are_logged() {
    let env = TestEnv::new();
    let config = env.write("proxy.conf", "a = 1\na = 2\n");
    env.proxy()
        .args(["-H", "run", "-c"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped duplicate 'a' at line 2"))
        .stderr(predicate::str::contains("variable already defined"));
}

#[test]
fn test_logs_flag_writes_file() {
    let env = TestEnv::new();
    let config = env.write("proxy.conf", "plugins = \"status\"\n");
    let log = env.path().join("logs").join("proxy.log");
    let stdout = env
        .proxy()
        .arg("run")
        .arg("-c")
        .arg(&config)
        .arg("-l")
        .arg(&log)
        .assert()
        .success()
        .stderr(predicate::str::contains("executor started").not())
        .get_output()
        .stdout
        .clone();
    assert_eq!(parse_json(&stdout)["log"]["stream"], "file");

    let written = fs::read_to_string(&log).unwrap();
    assert!(written.contains("proxy host starting"));
    assert!(written.contains("executor started"));
}

#[test]
fn test_log_level_from_config() {
    let env = TestEnv::new();
    let config = env.write("proxy.conf", "log_level = \"warn\"\nplugins = \"status\"\n");
    env.proxy()
        .args(["run", "-c"])
        .arg(&config)
        .assert()
        .success()
        .stderr(predicate::str::contains("executor started").not());
}

#[test]
fn test_syntax_error_aborts_run() {
    let env = TestEnv::new();
    let config = env.write("proxy.conf", "a = 1\nb = \"unterminated\n");
    env.proxy()
        .args(["-H", "run", "-c"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config syntax error in line 2"));
}

#[test]
fn test_log_stream_in_file_is_ignored() {
    let env = TestEnv::new();
    let config = env.write("proxy.conf", "log_stream = 3\nplugins = \"status\"\n");
    let stdout = env
        .proxy()
        .arg("run")
        .arg("-c")
        .arg(&config)
        .assert()
        .success()
        .stderr(predicate::str::contains("executor started"))
        .get_output()
        .stdout
        .clone();
    let json = parse_json(&stdout);
    assert_eq!(json["log"]["stream"], "stderr");
    assert_eq!(json["skipped"][0]["name"], "log_stream");
}

#[cfg(unix)]
#[test]
fn test_debug_mode_logs_share_stdout() {
    let env = TestEnv::new();
    let config = env.write("proxy.conf", "plugins = \"status\"\n");
    let stdout = env
        .proxy_as("debug_proxy")
        .arg("run")
        .arg("-c")
        .arg(&config)
        .assert()
        .success()
        .stderr(predicate::str::contains("executor started").not())
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(stdout).unwrap();
    assert!(text.contains("proxy host starting"));

    let summary = text.lines().last().unwrap();
    let json = parse_json(summary.as_bytes());
    assert_eq!(json["mode"], "debug");
    assert_eq!(json["log"]["stream"], "stdout");
}
