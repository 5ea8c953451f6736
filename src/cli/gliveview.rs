//! `spu gliveview`.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::CliConfig;
use super::common::CommandContext;
use crate::tools::gliveview::GliveviewUpdater;

#[derive(Args)]
pub struct GliveviewCommand {
    #[command(subcommand)]
    command: GliveviewSubcommands,
}

#[derive(Subcommand)]
enum GliveviewSubcommands {
    /// Download the latest gLiveView.sh and env, keeping .bak copies
    Update {
        /// Update even when the installed version is current
        #[arg(long)]
        force: bool,
    },
}

impl GliveviewCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::load(cli).await?;
        match self.command {
            GliveviewSubcommands::Update {
                force,
            } => {
                let updater =
                    GliveviewUpdater::new(ctx.config.gliveview.clone(), ctx.client.clone(), ctx.prompter());
                updater.run(force).await?;
                Ok(())
            }
        }
    }
}
