//! Status and upgrade runs against mocked GitHub releases.

use mockito::Server;
use spu_cli::test_utils::{fake_node_binary, tar_gz, write_script};

use crate::common::TestHost;

const CNCLI_ARCHIVE: &str = "/download/v6.5.1/cncli-6.5.1-ubuntu22-x86_64-unknown-linux-gnu.tar.gz";

fn cncli_host(server: &Server) -> TestHost {
    let mut host = TestHost::new();
    host.config.cncli.release_api = format!("{}/cncli/latest", server.url());
    host.config.cncli.download_base = format!("{}/download", server.url());
    host
}

#[test]
fn test_node_status_reports_available_upgrade() {
    let mut server = Server::new();
    let _release = server
        .mock("GET", "/node/latest")
        .with_status(200)
        .with_body(r#"{"tag_name": "10.1.4", "name": "Node 10.1.4"}"#)
        .create();

    let mut host = TestHost::new();
    host.config.node.release_api = format!("{}/node/latest", server.url());
    fake_node_binary(&host.bin_dir(), "10.1.2");

    host.run_spu(&["node", "status"])
        .assert_success()
        .assert_stdout_contains("10.1.2")
        .assert_stdout_contains("10.1.4")
        .assert_stdout_contains("upgrade available")
        .assert_stdout_contains("spu-integration-test.service");
}

#[test]
fn test_release_outage_changes_nothing() {
    let mut server = Server::new();
    let _release = server.mock("GET", "/node/latest").with_status(503).create();

    let mut host = TestHost::new();
    host.config.node.release_api = format!("{}/node/latest", server.url());
    let node = fake_node_binary(&host.bin_dir(), "10.1.2");
    let before = std::fs::read(&node).unwrap();

    let output = host.run_spu(&["--yes", "node", "upgrade"]);
    output.assert_failure().assert_stderr_contains("unavailable");
    assert_eq!(std::fs::read(&node).unwrap(), before);
    assert!(!host.root().join("backup").exists());
}

#[test]
fn test_cncli_upgrade_with_yes() {
    let mut server = Server::new();
    let _release = server.mock("GET", "/cncli/latest").with_status(200).with_body(r#"{"tag_name": "v6.5.1"}"#).create();
    let archive = server
        .mock("GET", CNCLI_ARCHIVE)
        .with_status(200)
        .with_body(tar_gz(&[("cncli", "#!/bin/sh\necho 'cncli 6.5.1'\n")]))
        .create();

    let host = cncli_host(&server);
    write_script(&host.bin_dir(), "cncli", "echo 'cncli 6.4.0'");

    host.run_spu(&["--yes", "cncli", "upgrade"]).assert_success().assert_stdout_contains("6.5.1");
    archive.assert();

    let installed = std::fs::read_to_string(host.bin_dir().join("cncli")).unwrap();
    assert!(installed.contains("cncli 6.5.1"));
    let backup = std::fs::read_to_string(host.root().join("backup/cncli/cncli.bak")).unwrap();
    assert!(backup.contains("cncli 6.4.0"));
}

#[test]
fn test_cncli_upgrade_declined_without_terminal() {
    let mut server = Server::new();
    let _release = server.mock("GET", "/cncli/latest").with_status(200).with_body(r#"{"tag_name": "v6.5.1"}"#).create();
    let archive = server.mock("GET", CNCLI_ARCHIVE).expect(0).create();

    let host = cncli_host(&server);
    write_script(&host.bin_dir(), "cncli", "echo 'cncli 6.4.0'");

    // stdin is not a terminal, so the confirmation is declined
    host.run_spu(&["cncli", "upgrade"]).assert_success().assert_stdout_contains("cancelled");
    archive.assert();
    assert!(std::fs::read_to_string(host.bin_dir().join("cncli")).unwrap().contains("6.4.0"));
}

#[test]
fn test_cncli_up_to_date_downloads_nothing() {
    let mut server = Server::new();
    let _release = server.mock("GET", "/cncli/latest").with_status(200).with_body(r#"{"tag_name": "v6.5.1"}"#).create();
    let archive = server.mock("GET", CNCLI_ARCHIVE).expect(0).create();

    let host = cncli_host(&server);
    write_script(&host.bin_dir(), "cncli", "echo 'cncli 6.5.1'");

    host.run_spu(&["--yes", "cncli", "upgrade"]).assert_success().assert_stdout_contains("up to date");
    archive.assert();
}

#[test]
fn test_node_rollback_without_backups_fails() {
    let host = TestHost::new();
    fake_node_binary(&host.bin_dir(), "10.1.2");

    host.run_spu(&["--yes", "node", "rollback"]).assert_failure().assert_stderr_contains("cardano-node.bak");
}
