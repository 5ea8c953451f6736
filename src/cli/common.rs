//! Shared plumbing for command implementations.

use anyhow::Result;
use colored::Colorize;

use super::CliConfig;
use crate::config::Config;
use crate::prompt::{AssumeYes, Prompter, TerminalPrompter};
use crate::upgrade::{ArtifactStatus, BackupOutcome, UpgradeOutcome};
use crate::utils::download::http_client;

/// Everything a command needs: host config, HTTP client and a prompter.
pub struct CommandContext {
    pub config: Config,
    pub client: reqwest::Client,
    pub prompter: Box<dyn Prompter>,
}

impl CommandContext {
    /// Load the config named by `cli` and pick the prompter for `--yes`.
    pub async fn load(cli: &CliConfig) -> Result<Self> {
        let config = Config::load_with_optional(cli.config_path.clone()).await?;
        Self::new(config, cli.assume_yes)
    }

    pub fn new(config: Config, assume_yes: bool) -> Result<Self> {
        let prompter: Box<dyn Prompter> = if assume_yes { Box::new(AssumeYes) } else { Box::new(TerminalPrompter) };
        Ok(Self {
            config,
            client: http_client()?,
            prompter,
        })
    }

    #[must_use]
    pub fn prompter(&self) -> &dyn Prompter {
        self.prompter.as_ref()
    }
}

/// Print one artifact's installed and latest versions.
pub fn print_status(status: &ArtifactStatus) {
    let installed = status.installed.as_ref().map_or_else(|| "not installed".dimmed().to_string(), ToString::to_string);
    println!("{}", status.name.bold());
    println!("  installed: {installed}");
    println!("  latest:    {}", status.latest);
    if status.needs_upgrade() {
        println!("  {}", "upgrade available".yellow());
    } else {
        println!("  {}", "up to date".green());
    }
}

/// Print what an upgrade left behind. Up-to-date and cancelled runs were
/// already reported by the orchestrator.
pub fn print_outcome(outcome: &UpgradeOutcome) {
    let UpgradeOutcome::Upgraded {
        previous,
        verified,
        backups,
        ..
    } = outcome
    else {
        return;
    };

    let from = previous.as_ref().map_or_else(|| "not installed".to_string(), ToString::to_string);
    println!("  previous:  {from}");
    match verified {
        Some(version) => println!("  reports:   {version}"),
        None => println!("  {}", "could not read the new binary's version".yellow()),
    }
    for backup in backups {
        if let BackupOutcome::Created(path) = backup {
            println!("  backup:    {}", path.display());
        }
    }
}
