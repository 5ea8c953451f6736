//! `spu cncli`.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::CliConfig;
use super::common::{CommandContext, print_outcome, print_status};
use crate::tools::cncli;
use crate::upgrade::ArtifactSpec;

#[derive(Args)]
pub struct CncliCommand {
    #[command(subcommand)]
    command: CncliSubcommands,
}

#[derive(Subcommand)]
enum CncliSubcommands {
    /// Show installed and latest cncli versions
    Status,

    /// Install the latest cncli release
    Upgrade {
        /// Reinstall even when the installed version is current
        #[arg(long)]
        force: bool,
    },
}

impl CncliCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::load(cli).await?;
        match self.command {
            CncliSubcommands::Status => {
                let status = ArtifactSpec::cncli(&ctx.config).status(&ctx.client).await?;
                print_status(&status);
                Ok(())
            }
            CncliSubcommands::Upgrade {
                force,
            } => {
                let mut orchestrator = cncli::orchestrator(&ctx.config, ctx.client.clone(), ctx.prompter(), force);
                let outcome = orchestrator.run().await?;
                print_outcome(&outcome);
                Ok(())
            }
        }
    }
}
