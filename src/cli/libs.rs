//! `spu libs`: native libraries for source builds.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use super::CliConfig;
use super::common::CommandContext;
use crate::libs::{LibraryInstall, LibraryManager, LibraryRecord};

#[derive(Args)]
pub struct LibsCommand {
    #[command(subcommand)]
    command: LibsSubcommands,
}

#[derive(Subcommand)]
enum LibsSubcommands {
    /// Show which libraries are installed and at which version
    Check,

    /// Install every missing library at its pinned ref
    Install,

    /// Rebuild one library, optionally at another tag or commit
    Reinstall {
        /// Library name, e.g. libsodium
        name: String,

        /// Tag or commit to build, asked interactively when omitted
        #[arg(long = "ref")]
        reference: Option<String>,
    },
}

impl LibsCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::load(cli).await?;
        let manager = LibraryManager::from_config(&ctx.config);
        match self.command {
            LibsSubcommands::Check => {
                print_records(&manager.check().await);
                Ok(())
            }
            LibsSubcommands::Install => Self::install_missing(&ctx, &manager).await,
            LibsSubcommands::Reinstall {
                name,
                reference,
            } => Self::reinstall(&ctx, &manager, &name, reference).await,
        }
    }

    async fn install_missing(ctx: &CommandContext, manager: &LibraryManager) -> Result<()> {
        let records = manager.check().await;
        print_records(&records);

        let missing: Vec<&str> = records.iter().filter(|r| !r.installed).map(|r| r.name.as_str()).collect();
        if missing.is_empty() {
            println!("{} All libraries are installed", "✓".green());
            return Ok(());
        }
        let question = format!("Install {}?", missing.join(", "));
        if !ctx.prompter().confirm(&question, true)? {
            println!("{}", "Library install cancelled".yellow());
            return Ok(());
        }

        let mut failures = Vec::new();
        for name in missing {
            match manager.install(name, ctx.prompter()).await {
                Ok(LibraryInstall::Installed) => println!("{} {} installed", "✓".green(), name),
                Ok(LibraryInstall::Skipped) => println!("{} {} skipped", "-".dimmed(), name),
                Err(e) => {
                    eprintln!("{} {}: {:#}", "✗".red(), name, e);
                    failures.push((name, e));
                }
            }
        }

        let count = failures.len();
        match failures.into_iter().next() {
            None => Ok(()),
            Some((name, error)) => Err(error).with_context(|| format!("{count} libraries failed to install, first was {name}")),
        }
    }

    async fn reinstall(
        ctx: &CommandContext,
        manager: &LibraryManager,
        name: &str,
        reference: Option<String>,
    ) -> Result<()> {
        let library = manager.library(name)?;
        let reference = match reference {
            Some(reference) => reference,
            None => ctx
                .prompter()
                .input(&format!("Tag or commit to build for {name}"), library.pinned_ref().unwrap_or_default())?,
        };
        match manager.reinstall(name, Some(&reference), ctx.prompter()).await? {
            LibraryInstall::Installed => println!("{} {} reinstalled", "✓".green().bold(), name),
            LibraryInstall::Skipped => println!("{} left unchanged", name),
        }
        Ok(())
    }
}

fn print_records(records: &[LibraryRecord]) {
    println!("{}", "Native libraries".bold());
    for record in records {
        let state = if record.installed {
            record.version.as_deref().unwrap_or("installed").green()
        } else {
            "missing".red()
        };
        let pinned = record.pinned_ref.as_deref().map(|r| format!(" (pinned {r})")).unwrap_or_default();
        println!("  {:<12} {}{}", record.name, state, pinned.dimmed());
    }
}
