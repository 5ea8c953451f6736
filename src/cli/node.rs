//! `spu node`: cardano-node and cardano-cli.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use super::CliConfig;
use super::common::{CommandContext, print_outcome, print_status};
use crate::config::InstallMethod;
use crate::service::ServiceControl;
use crate::upgrade::{ArtifactSpec, UpgradeOptions, UpgradeOrchestrator};

#[derive(Args)]
pub struct NodeCommand {
    #[command(subcommand)]
    command: NodeSubcommands,
}

#[derive(Subcommand)]
enum NodeSubcommands {
    /// Show installed and latest versions and the service state
    Status,

    /// Upgrade cardano-node and cardano-cli to the latest release
    Upgrade {
        /// Installation method, asked interactively when not given or configured
        #[arg(long, value_enum)]
        method: Option<InstallMethod>,

        /// Reinstall even when the installed version is current
        #[arg(long)]
        force: bool,
    },

    /// Restore the binaries saved by the last upgrade
    Rollback,
}

impl NodeCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::load(cli).await?;
        match self.command {
            NodeSubcommands::Status => Self::status(&ctx).await,
            NodeSubcommands::Upgrade {
                method,
                force,
            } => Self::upgrade(&ctx, method, force).await,
            NodeSubcommands::Rollback => Self::rollback(&ctx).await,
        }
    }

    fn service(ctx: &CommandContext) -> ServiceControl {
        ServiceControl::new(&ctx.config.node.service_name, ctx.config.use_sudo)
    }

    async fn status(ctx: &CommandContext) -> Result<()> {
        let status = ArtifactSpec::cardano_node(&ctx.config).status(&ctx.client).await?;
        print_status(&status);

        let service = Self::service(ctx);
        let state = if service.is_active().await { "active".green() } else { "inactive".yellow() };
        println!("  service:   {} ({})", service.unit(), state);
        Ok(())
    }

    async fn upgrade(ctx: &CommandContext, method: Option<InstallMethod>, force: bool) -> Result<()> {
        let options = UpgradeOptions {
            force,
            method: method.or(ctx.config.node.default_method),
            ..UpgradeOptions::from_config(&ctx.config)
        };
        let mut orchestrator =
            UpgradeOrchestrator::new(ArtifactSpec::cardano_node(&ctx.config), ctx.client.clone(), ctx.prompter())
                .with_options(options)
                .with_service(Self::service(ctx));
        let outcome = orchestrator.run().await?;
        print_outcome(&outcome);
        Ok(())
    }

    async fn rollback(ctx: &CommandContext) -> Result<()> {
        let mut orchestrator =
            UpgradeOrchestrator::new(ArtifactSpec::cardano_node(&ctx.config), ctx.client.clone(), ctx.prompter())
                .with_options(UpgradeOptions::from_config(&ctx.config))
                .with_service(Self::service(ctx));
        let restored = orchestrator.rollback().await?;
        if !restored.is_empty() {
            println!("{} Restored {} binaries", "✓".green().bold(), restored.len());
        }
        Ok(())
    }
}
