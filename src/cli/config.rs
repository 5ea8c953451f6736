//! `spu config`: the host config file.
//!
//! ```bash
//! spu config init            # write a config with every default
//! spu config show            # print the effective config
//! spu config check           # validate paths and URLs
//! spu --config ./host.toml config check
//! ```

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use crate::config::{Config, Severity};
use crate::core::SpuError;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: Option<ConfigSubcommands>,
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Write a config file with every default filled in
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Check directories and URLs in the configuration
    Check,

    /// Print the config file location
    Path,
}

impl ConfigCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        match self.command {
            Some(ConfigSubcommands::Init {
                force,
            }) => Self::init(force, config_path).await,
            Some(ConfigSubcommands::Show) | None => Self::show(config_path).await,
            Some(ConfigSubcommands::Check) => Self::check(config_path).await,
            Some(ConfigSubcommands::Path) => Self::show_path(config_path),
        }
    }

    fn location(config_path: Option<PathBuf>) -> Result<PathBuf> {
        match config_path {
            Some(path) => Ok(path),
            None => Config::default_path(),
        }
    }

    async fn init(force: bool, config_path: Option<PathBuf>) -> Result<()> {
        let config_path = Self::location(config_path)?;

        if config_path.exists() && !force {
            println!("❌ Config already exists at: {}", config_path.display());
            println!("   Use --force to overwrite");
            return Ok(());
        }

        Config::default().save_to(&config_path).await?;

        println!("✅ Created config at: {}", config_path.display());
        println!("\n{}", "Next steps:".yellow());
        println!("  1. Set the install, backup and NODE_HOME directories for this host");
        println!("  2. Set node_config.network and is_block_producer");
        println!("  3. Run 'spu config check'");
        Ok(())
    }

    async fn show(config_path: Option<PathBuf>) -> Result<()> {
        let config = Config::load_with_optional(config_path.clone()).await?;
        let config_path = Self::location(config_path)?;

        println!("{}", "SPU Configuration".bold());
        if config_path.exists() {
            println!("Location: {}\n", config_path.display());
        } else {
            println!("Location: {} {}\n", config_path.display(), "(not created, showing defaults)".dimmed());
        }
        println!("{}", toml::to_string_pretty(&config)?);
        Ok(())
    }

    async fn check(config_path: Option<PathBuf>) -> Result<()> {
        let config = Config::load_with_optional(config_path).await?;
        let issues = config.check();

        let mut errors = 0;
        for issue in &issues {
            match issue.severity {
                Severity::Error => {
                    errors += 1;
                    println!("{} {}: {}", "error".red().bold(), issue.field, issue.message);
                }
                Severity::Warning => println!("{} {}: {}", "warning".yellow(), issue.field, issue.message),
            }
        }

        if errors > 0 {
            return Err(SpuError::ConfigError {
                message: format!("{errors} problem(s) found, see above"),
            }
            .into());
        }
        println!("{} Configuration is valid", "✓".green());
        Ok(())
    }

    fn show_path(config_path: Option<PathBuf>) -> Result<()> {
        println!("{}", Self::location(config_path)?.display());
        Ok(())
    }
}
