//! Node configuration and genesis file updates.
//!
//! Files come from the Cardano operations book
//! (`https://book.play.dev.cardano.org/environments/<network>/`). The node is
//! stopped first and every file is kept as `<file>.bak` beside the new one, so
//! the operator can diff and merge local changes before starting the node again.

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use crate::config::NodeConfigFiles;
use crate::prompt::Prompter;
use crate::service::ServiceControl;
use crate::upgrade::{BackupManager, BackupOutcome};
use crate::utils::command::ToolCommand;
use crate::utils::download::download_replacing;

const GUIDE_URL: &str = "https://www.coincashew.com/coins/overview-ada/guide-how-to-build-a-haskell-stakepool-node/part-iv-administration/upgrading-a-node#downloading-new-configuration-files";

/// What an update did. Download failures do not stop the remaining files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeConfigReport {
    pub backed_up: Vec<PathBuf>,
    pub downloaded: Vec<PathBuf>,
    /// `(file, reason)` for every file that could not be downloaded
    pub failed: Vec<(String, String)>,
    pub compared: bool,
}

pub struct NodeConfigUpdater<'a> {
    files: NodeConfigFiles,
    client: reqwest::Client,
    prompter: &'a dyn Prompter,
    service: Option<ServiceControl>,
}

impl<'a> NodeConfigUpdater<'a> {
    pub fn new(files: NodeConfigFiles, client: reqwest::Client, prompter: &'a dyn Prompter) -> Self {
        Self {
            files,
            client,
            prompter,
            service: None,
        }
    }

    /// Stop this unit before touching any file.
    #[must_use]
    pub fn with_service(mut self, service: ServiceControl) -> Self {
        self.service = Some(service);
        self
    }

    fn path_of(&self, file: &str) -> PathBuf {
        self.files.dir.join(file)
    }

    /// Run the update. `None` when the operator stopped before any download.
    pub async fn run(&self) -> Result<Option<NodeConfigReport>> {
        println!("{}", "Read the upgrade notes before replacing configuration files:".yellow());
        println!("  {GUIDE_URL}");
        println!("  https://book.play.dev.cardano.org/env-{}.html\n", self.files.network);

        let question = match &self.service {
            Some(service) => format!("Stop {} and update its configuration files?", service.unit()),
            None => "Update the node configuration files?".to_string(),
        };
        if !self.prompter.confirm(&question, false)? {
            println!("{}", "Configuration update cancelled".yellow());
            return Ok(None);
        }

        if let Some(service) = &self.service
            && let Err(e) = service.stop().await
        {
            tracing::warn!("Failed to stop {}: {:#}", service.unit(), e);
            println!("{} could not stop {}", "Warning:".yellow(), service.unit());
        }

        if !self.prompter.confirm("Back up the current files as .bak?", true)? {
            println!("Skipping backup, nothing was changed");
            return Ok(None);
        }
        let mut report = NodeConfigReport::default();
        let backups = BackupManager::new(&self.files.dir);
        for file in self.files.managed_files() {
            if let BackupOutcome::Created(backup) = backups.backup(&self.path_of(&file)).await? {
                println!("{} Backed up {}", "✓".green(), backup.display());
                report.backed_up.push(backup);
            }
        }

        if !self.prompter.confirm(&format!("Download the latest {} files?", self.files.network), true)? {
            println!("Skipping download");
            return Ok(Some(report));
        }
        for file in self.files.managed_files() {
            match self.download(&file).await {
                Ok(path) => {
                    println!("{} Saved {}", "✓".green(), path.display());
                    report.downloaded.push(path);
                }
                Err(e) => {
                    eprintln!("{} {}: {:#}", "Download failed:".red(), file, e);
                    report.failed.push((file, format!("{e:#}")));
                }
            }
        }

        let question = format!("Compare the new files with their backups using {}?", self.files.diff_tool);
        if self.prompter.confirm(&question, false)? {
            self.compare_all().await;
            report.compared = true;
        }

        println!("Review the changes, then start the node when ready.");
        Ok(Some(report))
    }

    async fn download(&self, file: &str) -> Result<PathBuf> {
        let dest = self.path_of(file);
        download_replacing(&self.client, &self.files.url_for(file), &dest).await?;
        Ok(dest)
    }

    async fn compare_all(&self) {
        for file in self.files.managed_files() {
            let updated = self.path_of(&file);
            let backup = self.path_of(&format!("{file}.bak"));
            if !updated.is_file() || !backup.is_file() {
                println!("{} {} or its backup is missing, skipping diff", "!".yellow(), file);
                continue;
            }
            // Diff tools exit non-zero when the files differ
            let result = ToolCommand::new(&self.files.diff_tool)
                .arg(backup.display().to_string())
                .arg(updated.display().to_string())
                .inherit_stdio()
                .output()
                .await;
            if let Err(e) = result {
                tracing::warn!("Could not run {}: {:#}", self.files.diff_tool, e);
                eprintln!("{} could not run {}", "Warning:".yellow(), self.files.diff_tool);
                return;
            }
        }
    }
}
