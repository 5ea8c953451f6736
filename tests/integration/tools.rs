//! gLiveView, node configuration files and native libraries.

use mockito::Server;
use spu_cli::test_utils::write_script;

use crate::common::TestHost;

const STOCK_ENV: &str = "#!/usr/bin/env bash\n#CONFIG=\"${CNODE_HOME}/files/config.json\"\n#SOCKET=\"${CNODE_HOME}/sockets/node.socket\"\n";

#[test]
fn test_gliveview_update_with_yes() {
    let mut server = Server::new();
    let _script = server
        .mock("GET", "/gLiveView.sh")
        .with_status(200)
        .with_body("#!/usr/bin/env bash\nGLV_VERSION=v1.30.4\n[ \"$1\" = -v ] && echo \"gLiveView v1.30.4\"\nexit 0\n")
        .create();
    let _env = server.mock("GET", "/env").with_status(200).with_body(STOCK_ENV).create();

    let mut host = TestHost::new();
    host.config.gliveview.script_url = format!("{}/gLiveView.sh", server.url());
    host.config.gliveview.env_url = format!("{}/env", server.url());
    let glv_dir = host.config.gliveview.dir.clone();
    write_script(&glv_dir, "gLiveView.sh", "echo 'gLiveView v1.29.0'");
    std::fs::write(glv_dir.join("env"), "local edits").unwrap();

    host.run_spu(&["--yes", "gliveview", "update"])
        .assert_success()
        .assert_stdout_contains("gLiveView updated to v1.30.4");

    assert_eq!(std::fs::read_to_string(glv_dir.join("env.bak")).unwrap(), "local edits");
    assert!(std::fs::read_to_string(glv_dir.join("gLiveView.sh.bak")).unwrap().contains("v1.29.0"));
    let env = std::fs::read_to_string(glv_dir.join("env")).unwrap();
    assert!(env.contains("\nCONFIG=\"${NODE_HOME}/config.json\""));
    assert!(env.contains("\nSOCKET=\"${NODE_HOME}/db/socket\""));
}

#[test]
fn test_node_config_update_keeps_backups() {
    let mut server = Server::new();
    let _config = server.mock("GET", "/preview/config.json").with_status(200).with_body("{\"new\": true}").create();
    let _genesis = server.mock("GET", "/preview/shelley-genesis.json").with_status(200).with_body("{}").create();

    let mut host = TestHost::new();
    host.config.node_config.base_url = server.url();
    host.config.node_config.network = "preview".to_string();
    host.config.node_config.files = vec!["shelley-genesis.json".to_string()];
    // Answer the compare prompt with a harmless tool
    host.config.node_config.diff_tool = "true".to_string();
    // A stand-in systemctl so no real unit is touched
    let systemctl_dir = host.root().join("fake-bin");
    write_script(&systemctl_dir, "systemctl", "exit 0");
    let dir = host.config.node_config.dir.clone();
    std::fs::write(dir.join("config.json"), "{\"old\": true}").unwrap();

    let path = format!("{}:{}", systemctl_dir.display(), std::env::var("PATH").unwrap_or_default());
    host.write_config();
    let output = assert_cmd::Command::cargo_bin("spu")
        .unwrap()
        .args(["--config", host.config_path().to_str().unwrap(), "--yes", "node-config", "update"])
        .env("PATH", path)
        .env("SPU_NO_PROGRESS", "1")
        .env("NO_COLOR", "1")
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    assert_eq!(std::fs::read_to_string(dir.join("config.json.bak")).unwrap(), "{\"old\": true}");
    assert_eq!(std::fs::read_to_string(dir.join("config.json")).unwrap(), "{\"new\": true}");
    assert_eq!(std::fs::read_to_string(dir.join("shelley-genesis.json")).unwrap(), "{}");
}

#[test]
fn test_libs_check_reports_missing_libraries() {
    let host = TestHost::new();
    host.run_spu(&["libs", "check"])
        .assert_success()
        .assert_stdout_contains("libsodium")
        .assert_stdout_contains("secp256k1")
        .assert_stdout_contains("blst")
        .assert_stdout_contains("missing")
        .assert_stdout_contains("pinned v0.3.14");
}

#[test]
fn test_libs_check_sees_installed_prefix() {
    let host = TestHost::new();
    let prefix = &host.config.libs.prefix;
    std::fs::create_dir_all(prefix.join("lib")).unwrap();
    std::fs::create_dir_all(prefix.join("include")).unwrap();
    std::fs::write(prefix.join("lib/libblst.a"), "").unwrap();
    std::fs::write(prefix.join("include/blst.h"), "").unwrap();

    let output = host.run_spu(&["libs", "check"]);
    output.assert_success();
    let blst_line = output.stdout.lines().find(|l| l.trim_start().starts_with("blst")).unwrap();
    assert!(!blst_line.contains("missing"), "blst line: {blst_line}");
}
