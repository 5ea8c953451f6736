//! Guild LiveView updates.
//!
//! gLiveView has no release feed; the latest version is read from the
//! `GLV_VERSION` variable of the published script. An update backs up
//! `gLiveView.sh` and `env` next to themselves, downloads both, and points the
//! `CONFIG=` and `SOCKET=` lines of `env` at this host's node directory.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use crate::config::GliveviewConfig;
use crate::prompt::Prompter;
use crate::upgrade::{BackupManager, BackupOutcome};
use crate::utils::command::ToolCommand;
use crate::utils::download::{download_to_file, staging_path};
use crate::version::{ArtifactVersion, ScriptVersionSource, VersionProbe, needs_upgrade};

pub const SCRIPT_NAME: &str = "gLiveView.sh";
pub const ENV_NAME: &str = "env";

const CONFIG_LINE: &str = "#CONFIG=\"${CNODE_HOME}/files/config.json\"";
const SOCKET_LINE: &str = "#SOCKET=\"${CNODE_HOME}/sockets/node.socket\"";
const SOCKET_REPLACEMENT: &str = "SOCKET=\"${NODE_HOME}/db/socket\"";

/// How an update run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GliveviewOutcome {
    UpToDate(ArtifactVersion),
    Cancelled,
    Updated {
        previous: Option<ArtifactVersion>,
        latest: ArtifactVersion,
        backups: Vec<BackupOutcome>,
    },
}

pub struct GliveviewUpdater<'a> {
    config: GliveviewConfig,
    client: reqwest::Client,
    prompter: &'a dyn Prompter,
}

impl<'a> GliveviewUpdater<'a> {
    pub fn new(config: GliveviewConfig, client: reqwest::Client, prompter: &'a dyn Prompter) -> Self {
        Self {
            config,
            client,
            prompter,
        }
    }

    #[must_use]
    pub fn script_path(&self) -> PathBuf {
        self.config.dir.join(SCRIPT_NAME)
    }

    #[must_use]
    pub fn env_path(&self) -> PathBuf {
        self.config.dir.join(ENV_NAME)
    }

    /// `gLiveView.sh -v`, `None` when the script is missing or silent.
    pub async fn installed_version(&self) -> Option<ArtifactVersion> {
        VersionProbe::new(SCRIPT_NAME, ["-v"]).with_install_dir(&self.config.dir).resolve_installed().await
    }

    pub async fn latest_version(&self) -> Result<ArtifactVersion> {
        ScriptVersionSource::new(self.client.clone(), "gLiveView", &self.config.script_url, &self.config.version_pattern)?
            .resolve_remote()
            .await
    }

    /// Check, confirm, and replace the script and its `env`.
    pub async fn run(&self, force: bool) -> Result<GliveviewOutcome> {
        let installed = self.installed_version().await;
        let latest = self.latest_version().await?;
        println!(
            "{} installed: {}",
            "gLiveView".bold(),
            installed.as_ref().map_or_else(|| "not installed".dimmed().to_string(), ToString::to_string)
        );
        println!("{} latest:    {}", "gLiveView".bold(), latest);

        if !needs_upgrade(installed.as_ref(), &latest) && !force {
            println!("{} gLiveView is up to date", "✓".green());
            return Ok(GliveviewOutcome::UpToDate(latest));
        }
        if !self.prompter.confirm("Update gLiveView?", true)? {
            println!("{}", "Skipping gLiveView update".yellow());
            return Ok(GliveviewOutcome::Cancelled);
        }

        let backups = BackupManager::new(&self.config.dir);
        let mut outcomes = Vec::new();
        for path in [self.script_path(), self.env_path()] {
            let outcome = backups.backup(&path).await?;
            if let BackupOutcome::Created(backup) = &outcome {
                println!("{} Backed up {}", "✓".green(), backup.display());
            }
            outcomes.push(outcome);
        }

        self.download_both().await?;
        crate::utils::fs::set_mode(&self.script_path(), 0o755)?;
        self.configure_env().await?;
        println!("{} gLiveView updated to {}", "✓".green().bold(), latest);

        if self.prompter.confirm("Launch gLiveView now?", false)? {
            self.launch().await?;
        }

        Ok(GliveviewOutcome::Updated {
            previous: installed,
            latest,
            backups: outcomes,
        })
    }

    /// Stage the script and `env` next to the installed copies, then move both
    /// into place. Nothing installed changes unless both transfers succeed.
    async fn download_both(&self) -> Result<()> {
        let files = [(&self.config.script_url, self.script_path()), (&self.config.env_url, self.env_path())];
        let mut staged = Vec::new();
        for (url, dest) in &files {
            let partial = staging_path(dest);
            if let Err(e) = download_to_file(&self.client, url, &partial).await {
                for leftover in &staged {
                    let _ = tokio::fs::remove_file(leftover).await;
                }
                return Err(e);
            }
            staged.push(partial);
        }
        for ((_, dest), partial) in files.iter().zip(&staged) {
            tokio::fs::rename(partial, dest)
                .await
                .with_context(|| format!("Failed to move {} into place", dest.display()))?;
        }
        Ok(())
    }

    /// Point `env` at this host's node config and socket.
    async fn configure_env(&self) -> Result<()> {
        let path = self.env_path();
        let content = tokio::fs::read_to_string(&path).await?;
        let (updated, replaced) = configure_env(&content, &self.config.config_file_name);
        if replaced < 2 {
            tracing::warn!("Only {} of the CONFIG/SOCKET lines were found in {}", replaced, path.display());
        }
        crate::utils::fs::safe_write(&path, &updated)
    }

    async fn launch(&self) -> Result<()> {
        ToolCommand::new(self.script_path().display().to_string())
            .current_dir(&self.config.dir)
            .inherit_stdio()
            .output()
            .await?;
        Ok(())
    }
}

/// Uncomment and rewrite the `CONFIG=` and `SOCKET=` lines of a stock `env`.
///
/// Returns the new content and how many of the two lines were found.
#[must_use]
pub fn configure_env(content: &str, config_file_name: &str) -> (String, usize) {
    let config_replacement = format!("CONFIG=\"${{NODE_HOME}}/{config_file_name}\"");
    let replaced = [CONFIG_LINE, SOCKET_LINE].iter().filter(|line| content.contains(*line)).count();
    let updated = content.replace(CONFIG_LINE, &config_replacement).replace(SOCKET_LINE, SOCKET_REPLACEMENT);
    (updated, replaced)
}
