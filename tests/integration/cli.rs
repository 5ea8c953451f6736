//! Argument handling and error output.

use assert_cmd::Command;
use predicates::prelude::*;

use crate::common::{TestHost, run_spu_raw};

#[test]
fn test_help_lists_command_families() {
    let mut cmd = Command::cargo_bin("spu").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("node"))
        .stdout(predicate::str::contains("cncli"))
        .stdout(predicate::str::contains("gliveview"))
        .stdout(predicate::str::contains("node-config"))
        .stdout(predicate::str::contains("--yes"));
}

#[test]
fn test_node_upgrade_help_shows_methods() {
    let mut cmd = Command::cargo_bin("spu").unwrap();
    cmd.args(["node", "upgrade", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--method"))
        .stdout(predicate::str::contains("prebuilt"))
        .stdout(predicate::str::contains("--force"));
}

#[test]
fn test_unknown_method_is_rejected_by_parser() {
    let mut cmd = Command::cargo_bin("spu").unwrap();
    cmd.args(["node", "upgrade", "--method", "nix"]).assert().failure().code(2);
}

#[test]
fn test_missing_explicit_config_fails_cleanly() {
    let output = run_spu_raw(&["--config", "/nonexistent/spu/config.toml", "node", "status"]);
    output.assert_failure().assert_stderr_contains("does not exist");
    assert_eq!(output.code, Some(1));
}

#[test]
fn test_unknown_library_is_a_config_error() {
    let host = TestHost::new();
    let output = host.run_spu(&["libs", "reinstall", "libfoo", "--ref", "v1"]);
    output.assert_failure().assert_stderr_contains("Unknown library 'libfoo'");
}
