//! Configuration for SPU
//!
//! A single user-wide TOML file describes the host: where binaries live, where
//! backups go, which systemd unit runs the node, and where upstream releases are
//! published. It replaces the `.env` file the shell-era tooling relied on.
//!
//! # Location
//!
//! - `--config <PATH>` on the command line
//! - `SPU_CONFIG_PATH` environment variable
//! - `~/.spu/config.toml`
//!
//! A missing default file is not an error; every field has a default that
//! matches a CoinCashew-style node host.
//!
//! # Example
//!
//! ```toml
//! use_sudo = true
//!
//! [node]
//! service_name = "cardano-node"
//! install_dir = "/usr/local/bin"
//! backup_dir = "~/backup/cardano-node"
//! source_dir = "~/git/cardano-node"
//! default_method = "prebuilt"
//!
//! [cncli]
//! install_dir = "/usr/local/bin"
//!
//! [gliveview]
//! dir = "$NODE_HOME"
//!
//! [node_config]
//! dir = "$NODE_HOME"
//! network = "preprod"
//! is_block_producer = true
//! ```
//!
//! Paths may use `~` and `$VAR`; they are expanded once at load time so every
//! component sees absolute paths.

mod global;

pub use global::{
    CONFIG_PATH_ENV, CncliConfig, Config, ConfigIssue, DEFAULT_GLV_VERSION_PATTERN, GliveviewConfig, InstallMethod, LibsConfig,
    NodeConfig, NodeConfigFiles, Severity,
};
