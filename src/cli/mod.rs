//! Command-line interface for SPU (Stake Pool Updater).
//!
//! Each command family lives in its own module with its clap argument structs
//! and an `execute` method. Commands load the host [`Config`](crate::config::Config)
//! once, build a [`CommandContext`](common::CommandContext) and hand it to the
//! library components.
//!
//! # Commands
//!
//! - `node` - status, upgrade and rollback of `cardano-node` and `cardano-cli`
//! - `cncli` - status and upgrade of cncli
//! - `libs` - check and install the native libraries a source build links against
//! - `gliveview` - refresh gLiveView and its `env` file
//! - `node-config` - refresh the node configuration and genesis files
//! - `config` - show, check and initialize the SPU config file
//!
//! # Global Options
//!
//! - `--verbose` / `--quiet` - log level (`RUST_LOG` still wins when set)
//! - `--yes` - accept every confirmation, for unattended runs
//! - `--config` - path to the config file
//! - `--no-progress` - disable progress bars and spinners
//!
//! ```bash
//! spu node status
//! spu node upgrade --method prebuilt
//! spu --yes cncli upgrade
//! spu libs check
//! spu config init
//! ```

mod cncli;
pub mod common;
mod config;
mod gliveview;
mod libs;
mod node;
mod node_config;


use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::utils::progress::NO_PROGRESS_ENV;

/// Default filter: SPU at info, everything it depends on at warn.
pub const DEFAULT_LOG_FILTER: &str = "warn,spu_cli=info,git=info,cmd=warn";

/// Runtime settings derived from the global flags.
///
/// Kept apart from [`Cli`] so tests and embedders can run commands without
/// touching argument parsing.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Filter for the tracing subscriber. `RUST_LOG` overrides it.
    pub log_level: Option<String>,

    /// Sets `SPU_NO_PROGRESS`, which hides every bar and spinner.
    pub no_progress: bool,

    /// Answer yes to every confirmation.
    pub assume_yes: bool,

    /// Explicit config file, otherwise `SPU_CONFIG_PATH` or `~/.spu/config.toml`.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Export the settings other modules read from the environment.
    ///
    /// Call once, before any task is spawned.
    pub fn apply_to_env(&self) {
        if self.no_progress {
            // SAFETY: called from main before the runtime spawns tasks that read the environment
            unsafe {
                std::env::set_var(NO_PROGRESS_ENV, "1");
            }
        }
    }
}

/// Guarded upgrades for a Cardano stake pool host.
#[derive(Parser)]
#[command(
    name = "spu",
    about = "Stake Pool Updater - guarded upgrades for Cardano node hosts",
    version,
    long_about = "SPU upgrades cardano-node, cardano-cli and cncli, keeps the native libraries, \
                  gLiveView and node configuration files current, and backs up every binary it replaces."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug output, including every external command
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Answer yes to every confirmation
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable progress bars and spinners
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show, upgrade or roll back cardano-node and cardano-cli
    Node(node::NodeCommand),

    /// Show or upgrade cncli
    Cncli(cncli::CncliCommand),

    /// Check and install the native libraries needed for source builds
    Libs(libs::LibsCommand),

    /// Update gLiveView and its env file
    Gliveview(gliveview::GliveviewCommand),

    /// Update the node configuration and genesis files
    NodeConfig(node_config::NodeConfigCommand),

    /// Manage the SPU config file
    Config(config::ConfigCommand),
}

impl Cli {
    /// Run with settings built from the parsed flags.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Translate the global flags into a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            DEFAULT_LOG_FILTER
        };

        CliConfig {
            log_level: Some(log_level.to_string()),
            no_progress: self.no_progress,
            assume_yes: self.yes,
            config_path: self.config.clone(),
        }
    }

    /// Run the selected command with `config`.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.apply_to_env();

        match self.command {
            Commands::Node(cmd) => cmd.execute(&config).await,
            Commands::Cncli(cmd) => cmd.execute(&config).await,
            Commands::Libs(cmd) => cmd.execute(&config).await,
            Commands::Gliveview(cmd) => cmd.execute(&config).await,
            Commands::NodeConfig(cmd) => cmd.execute(&config).await,
            Commands::Config(cmd) => cmd.execute(config.config_path).await,
        }
    }
}
