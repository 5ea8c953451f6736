use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::core::SpuError;

/// Result of backing up one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// A copy was written to the contained path
    Created(PathBuf),
    /// Nothing to back up, the source does not exist
    Skipped,
}

/// Copies installed binaries into a backup directory before they are replaced.
///
/// A backup of `/usr/local/bin/cardano-node` lands at
/// `<backup_dir>/cardano-node.bak`, replacing any earlier backup of the same
/// file. Unix permissions are carried over so a restored binary is executable.
///
/// # Examples
///
/// ```rust,no_run
/// use spu_cli::upgrade::{BackupManager, BackupOutcome};
/// use std::path::Path;
///
/// # async fn example() -> anyhow::Result<()> {
/// let manager = BackupManager::new("/home/cardano/backup/cardano-node");
/// match manager.backup(Path::new("/usr/local/bin/cardano-node")).await? {
///     BackupOutcome::Created(path) => println!("saved {}", path.display()),
///     BackupOutcome::Skipped => println!("nothing installed yet"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_dir: PathBuf,
}

impl BackupManager {
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
        }
    }

    #[must_use]
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Where the backup of `original` is kept.
    #[must_use]
    pub fn backup_path(&self, original: &Path) -> PathBuf {
        let name = original.file_name().unwrap_or_default().to_string_lossy();
        self.backup_dir.join(format!("{name}.bak"))
    }

    #[must_use]
    pub fn has_backup(&self, original: &Path) -> bool {
        self.backup_path(original).is_file()
    }

    /// Copy `original` into the backup directory.
    ///
    /// A missing `original` is [`BackupOutcome::Skipped`] and creates nothing.
    /// Failures are [`SpuError::BackupFailed`].
    pub async fn backup(&self, original: &Path) -> Result<BackupOutcome> {
        if !original.exists() {
            debug!("Nothing to back up at {}", original.display());
            return Ok(BackupOutcome::Skipped);
        }

        let backup_path = self.backup_path(original);
        self.copy_with_permissions(original, &backup_path).await.map_err(|e| SpuError::BackupFailed {
            path: original.display().to_string(),
            reason: format!("{e:#}"),
        })?;

        info!("Backed up {} to {}", original.display(), backup_path.display());
        Ok(BackupOutcome::Created(backup_path))
    }

    async fn copy_with_permissions(&self, original: &Path, backup_path: &Path) -> Result<()> {
        fs::create_dir_all(&self.backup_dir)
            .await
            .with_context(|| format!("Failed to create backup directory {}", self.backup_dir.display()))?;

        if backup_path.exists() {
            debug!("Replacing old backup at {}", backup_path.display());
            fs::remove_file(backup_path).await.context("Failed to remove old backup")?;
        }

        fs::copy(original, backup_path).await.context("Failed to copy file")?;

        #[cfg(unix)]
        {
            let permissions = fs::metadata(original)
                .await
                .context("Failed to read original file metadata")?
                .permissions();
            fs::set_permissions(backup_path, permissions).await.context("Failed to set backup permissions")?;
        }
        Ok(())
    }

    /// Put the backup of `original` back in place.
    ///
    /// Returns the backup that was restored.
    pub async fn restore(&self, original: &Path, use_sudo: bool) -> Result<PathBuf> {
        let backup_path = self.backup_path(original);
        if !backup_path.is_file() {
            return Err(SpuError::BinaryNotFound {
                name: format!("{}.bak", original.file_name().unwrap_or_default().to_string_lossy()),
                location: self.backup_dir.display().to_string(),
            }
            .into());
        }

        warn!("Restoring {} from {}", original.display(), backup_path.display());
        super::install_binary(&backup_path, original, use_sudo).await?;
        Ok(backup_path)
    }
}
