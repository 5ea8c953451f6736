//! SPU - Stake Pool Updater
//!
//! Guarded upgrades for a Cardano stake pool host. SPU finds the latest
//! `cardano-node`, `cardano-cli` and `cncli` releases, compares them with what
//! is installed, and replaces the binaries. It stops the node service and any
//! running instance first, and keeps a backup of every binary it overwrites.
//!
//! # Architecture Overview
//!
//! Every upgrade runs through one state machine:
//!
//! ```text
//! Idle -> VersionCheck -> Confirm -> StrategySelect -> Prebuilt | SourceBuild
//!      -> ProcessGuard -> Backup -> Install -> Verify -> Done
//! ```
//!
//! Any failure ends in `Aborted` with an error naming the step. Backups are
//! never deleted, and `spu node rollback` restores them.
//!
//! # Core Modules
//!
//! ## Upgrade Pipeline
//! - [`version`] - installed and remote version discovery and comparison
//! - [`upgrade`] - the orchestrator, backups and the prebuilt and source strategies
//! - [`process`] - finding and terminating running instances
//! - [`service`] - systemd unit control
//!
//! ## Source Builds
//! - [`git`] - working-copy management through the system `git` binary
//! - [`libs`] - libsodium, secp256k1, blst and liblmdb
//!
//! ## Host Tools
//! - [`tools`] - cncli, gLiveView and node configuration files
//!
//! ## Supporting Modules
//! - [`cli`] - the `spu` command line
//! - [`config`] - the host config file (`~/.spu/config.toml`)
//! - [`core`] - error types and user-facing error rendering
//! - [`prompt`] - operator confirmations
//! - [`utils`] - commands, downloads, file operations and progress bars
//!
//! # Example
//!
//! ```rust,no_run
//! use spu_cli::config::Config;
//! use spu_cli::prompt::TerminalPrompter;
//! use spu_cli::upgrade::{ArtifactSpec, UpgradeOptions, UpgradeOrchestrator};
//! use spu_cli::utils::download::http_client;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load().await?;
//! let prompter = TerminalPrompter;
//! let mut orchestrator = UpgradeOrchestrator::new(ArtifactSpec::cardano_node(&config), http_client()?, &prompter)
//!     .with_options(UpgradeOptions::from_config(&config));
//! let outcome = orchestrator.run().await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod git;
pub mod libs;
pub mod process;
pub mod prompt;
pub mod service;
pub mod tools;
pub mod upgrade;
pub mod utils;
pub mod version;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
