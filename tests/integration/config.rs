//! `spu config` against real files.

use crate::common::{TestHost, run_spu_raw};

#[test]
fn test_init_writes_defaults_once() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("fresh").join("config.toml");
    let path_arg = path.to_str().unwrap();

    run_spu_raw(&["--config", path_arg, "config", "init"])
        .assert_success()
        .assert_stdout_contains("Created config");
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("service_name = \"cardano-node\""));

    std::fs::write(&path, "use_sudo = false\n").unwrap();
    run_spu_raw(&["--config", path_arg, "config", "init"])
        .assert_success()
        .assert_stdout_contains("Use --force to overwrite");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "use_sudo = false\n");

    run_spu_raw(&["--config", path_arg, "config", "init", "--force"]).assert_success();
    assert!(std::fs::read_to_string(&path).unwrap().contains("[node]"));
}

#[test]
fn test_show_prints_effective_config() {
    let mut host = TestHost::new();
    host.config.node_config.network = "preview".to_string();
    host.run_spu(&["config", "show"])
        .assert_success()
        .assert_stdout_contains("[node_config]")
        .assert_stdout_contains("network = \"preview\"");
}

#[test]
fn test_check_passes_for_prepared_host() {
    let host = TestHost::new();
    host.run_spu(&["config", "check"]).assert_success().assert_stdout_contains("Configuration is valid");
}

#[test]
fn test_check_reports_every_problem() {
    let mut host = TestHost::new();
    host.config.node.install_dir = host.root().join("missing-bin");
    host.config.node.release_api = "not a url".to_string();

    let output = host.run_spu(&["config", "check"]);
    output
        .assert_failure()
        .assert_stdout_contains("node.install_dir")
        .assert_stdout_contains("node.release_api")
        .assert_stderr_contains("2 problem(s) found");
}
