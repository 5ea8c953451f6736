//! Shared fixtures for the SPU integration suite.
//!
//! A [`TestHost`] is a throwaway node host: every directory SPU touches lives
//! in one temp dir, and the config file written there is passed to `spu` with
//! `--config`.

// Not every test file uses every helper
#![allow(dead_code)]

use spu_cli::config::Config;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Captured result of one `spu` invocation.
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn assert_success(&self) -> &Self {
        assert!(self.success, "Command failed with code {:?}\nStdout: {}\nStderr: {}", self.code, self.stdout, self.stderr);
        self
    }

    pub fn assert_failure(&self) -> &Self {
        assert!(!self.success, "Command unexpectedly succeeded\nStdout: {}", self.stdout);
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(self.stdout.contains(text), "Expected stdout to contain '{}'\nActual stdout: {}", text, self.stdout);
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(self.stderr.contains(text), "Expected stderr to contain '{}'\nActual stderr: {}", text, self.stderr);
        self
    }
}

/// An isolated host layout with its own config file.
pub struct TestHost {
    temp: TempDir,
    pub config: Config,
}

impl TestHost {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("create temp dir");
        let root = temp.path();
        let bin = root.join("bin");
        let node_home = root.join("node-home");
        std::fs::create_dir_all(&bin).expect("create bin dir");
        std::fs::create_dir_all(&node_home).expect("create node home");

        let mut config = Config::default();
        config.use_sudo = false;
        config.node.service_name = "spu-integration-test".to_string();
        config.node.install_dir = bin.clone();
        config.node.cli_install_dir = bin.clone();
        config.node.backup_dir = root.join("backup/cardano-node");
        config.node.source_dir = root.join("git/cardano-node");
        config.node.terminate_timeout_secs = 5;
        config.cncli.install_dir = bin;
        config.cncli.backup_dir = root.join("backup/cncli");
        config.gliveview.dir = node_home.clone();
        config.node_config.dir = node_home;
        config.libs.git_dir = root.join("git");
        config.libs.prefix = root.join("prefix");

        Self { temp, config }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root().join("bin")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root().join("spu.toml")
    }

    /// Serialize the current config to [`config_path`](Self::config_path).
    pub fn write_config(&self) {
        let content = toml::to_string_pretty(&self.config).expect("serialize config");
        std::fs::write(self.config_path(), content).expect("write config");
    }

    /// Write the config and run `spu --config <path> <args>`.
    pub fn run_spu(&self, args: &[&str]) -> CommandOutput {
        self.write_config();
        let config_path = self.config_path();
        let mut full_args = vec!["--config", config_path.to_str().expect("utf-8 temp path")];
        full_args.extend_from_slice(args);
        run_spu_raw(&full_args)
    }
}

/// Run `spu` with exactly `args`, no config flag added.
pub fn run_spu_raw(args: &[&str]) -> CommandOutput {
    let output = assert_cmd::Command::cargo_bin("spu")
        .expect("spu binary")
        .args(args)
        .env("SPU_NO_PROGRESS", "1")
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("SPU_CONFIG_PATH")
        .output()
        .expect("run spu");

    CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        success: output.status.success(),
        code: output.status.code(),
    }
}
