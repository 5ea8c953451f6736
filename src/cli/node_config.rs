//! `spu node-config`.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use super::CliConfig;
use super::common::CommandContext;
use crate::core::SpuError;
use crate::service::ServiceControl;
use crate::tools::node_config::NodeConfigUpdater;

#[derive(Args)]
pub struct NodeConfigCommand {
    #[command(subcommand)]
    command: NodeConfigSubcommands,
}

#[derive(Subcommand)]
enum NodeConfigSubcommands {
    /// Stop the node, back up and download its configuration and genesis files
    Update,
}

impl NodeConfigCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::load(cli).await?;
        match self.command {
            NodeConfigSubcommands::Update => {
                let service = ServiceControl::new(&ctx.config.node.service_name, ctx.config.use_sudo);
                let updater =
                    NodeConfigUpdater::new(ctx.config.node_config.clone(), ctx.client.clone(), ctx.prompter())
                        .with_service(service);
                let Some(report) = updater.run().await? else {
                    return Ok(());
                };

                println!(
                    "{} {} backed up, {} downloaded",
                    "Summary:".bold(),
                    report.backed_up.len(),
                    report.downloaded.len()
                );
                if report.failed.is_empty() {
                    return Ok(());
                }
                let files: Vec<&str> = report.failed.iter().map(|(file, _)| file.as_str()).collect();
                Err(SpuError::DownloadFailed {
                    url: ctx.config.node_config.url_for(files[0]),
                    reason: format!("{} of the files could not be downloaded: {}", files.len(), files.join(", ")),
                }
                .into())
            }
        }
    }
}
