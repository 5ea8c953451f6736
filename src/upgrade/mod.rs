//! Guarded binary upgrades for node-host artifacts.
//!
//! An upgrade run replaces one artifact family (`cardano-node` with
//! `cardano-cli`, or `cncli`) with the latest published release:
//!
//! ```text
//! Idle → VersionCheck ─┬─ UpToDate → Done
//!                      └─ UpgradeNeeded → Confirm → StrategySelect
//!                            → Prebuilt | SourceBuild
//!                            → ProcessGuard → Backup → Install → Done
//! ```
//!
//! Any failure moves the run to `Aborted` and reports the step it failed in
//! through [`UpgradeError`]. There is no automatic rollback: binaries already
//! replaced stay replaced, the previous ones sit in the backup directory, and
//! `spu node rollback` restores them on request.
//!
//! # Components
//!
//! - [`backup::BackupManager`] copies installed binaries aside before install
//! - [`strategy::InstallStrategy`] produces new binaries, either from a release
//!   archive ([`prebuilt`]) or from a cabal build ([`source_build`])
//! - [`orchestrator::UpgradeOrchestrator`] owns the state machine

pub mod backup;
pub mod orchestrator;
pub mod prebuilt;
pub mod source_build;
pub mod strategy;

#[cfg(test)]
mod tests;

pub use backup::{BackupManager, BackupOutcome};
pub use orchestrator::{UpgradeOptions, UpgradeOrchestrator, UpgradeOutcome};
pub use strategy::{BuiltArtifacts, InstallStrategy};

use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{Config, InstallMethod};
use crate::core::SpuError;
use crate::utils::command::ToolCommand;
use crate::version::{ArtifactVersion, ReleaseClient, VersionProbe, needs_upgrade};

/// One installed executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub name: String,
    pub install_dir: PathBuf,
    pub backup_dir: PathBuf,
}

impl InstallTarget {
    pub fn new(name: impl Into<String>, install_dir: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            install_dir: install_dir.into(),
            backup_dir: backup_dir.into(),
        }
    }

    /// Where the executable lives once installed.
    #[must_use]
    pub fn installed_path(&self) -> PathBuf {
        self.install_dir.join(&self.name)
    }
}

/// Where releases of an artifact are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSource {
    /// GitHub `releases/latest` endpoint
    pub api_url: String,
    /// Prefix of release asset URLs, without the tag
    pub download_base: String,
    /// Asset file name with `{tag}` / `{version}` placeholders
    pub archive: String,
}

impl ReleaseSource {
    /// Asset file name for `version`.
    ///
    /// `{tag}` is the tag as published, `{version}` the tag without its `v`.
    #[must_use]
    pub fn archive_name(&self, version: &ArtifactVersion) -> String {
        self.archive.replace("{tag}", version.raw()).replace("{version}", version.normalized())
    }

    /// `{download_base}/{tag}/{archive}`.
    #[must_use]
    pub fn archive_url(&self, version: &ArtifactVersion) -> String {
        format!("{}/{}/{}", self.download_base.trim_end_matches('/'), version.raw(), self.archive_name(version))
    }
}

/// Working copy and build settings for source builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub repo_url: String,
    pub source_dir: PathBuf,
    /// apt packages removed before building
    pub conflicting_packages: Vec<String>,
}

/// Everything the orchestrator needs to know about one artifact family.
#[derive(Debug, Clone)]
pub struct ArtifactSpec {
    /// Display name, also used in error messages
    pub name: String,
    pub probe: VersionProbe,
    pub release: ReleaseSource,
    /// Substring matched against running process names
    pub process_name: String,
    pub targets: Vec<InstallTarget>,
    /// `None` when only prebuilt releases are supported
    pub source: Option<SourceSpec>,
}

impl ArtifactSpec {
    /// `cardano-node` and `cardano-cli`.
    #[must_use]
    pub fn cardano_node(config: &Config) -> Self {
        let node = &config.node;
        Self {
            name: "cardano-node".to_string(),
            probe: VersionProbe::new("cardano-node", ["version"])
                .with_line_prefix("cardano-node")
                .with_install_dir(&node.install_dir),
            release: ReleaseSource {
                api_url: node.release_api.clone(),
                download_base: node.download_base.clone(),
                archive: node.archive.clone(),
            },
            process_name: "cardano-node".to_string(),
            targets: vec![
                InstallTarget::new("cardano-node", &node.install_dir, &node.backup_dir),
                InstallTarget::new("cardano-cli", &node.cli_install_dir, &node.backup_dir),
            ],
            source: Some(SourceSpec {
                repo_url: node.repo_url.clone(),
                source_dir: node.source_dir.clone(),
                conflicting_packages: node.conflicting_packages.clone(),
            }),
        }
    }

    /// The `cncli` leader-log tool. Prebuilt only.
    #[must_use]
    pub fn cncli(config: &Config) -> Self {
        let cncli = &config.cncli;
        Self {
            name: "cncli".to_string(),
            probe: VersionProbe::new("cncli", ["-V"]).with_install_dir(&cncli.install_dir),
            release: ReleaseSource {
                api_url: cncli.release_api.clone(),
                download_base: cncli.download_base.clone(),
                archive: cncli.archive.clone(),
            },
            process_name: "cncli".to_string(),
            targets: vec![InstallTarget::new("cncli", &cncli.install_dir, &cncli.backup_dir)],
            source: None,
        }
    }

    /// Install methods this artifact supports, preferred first.
    #[must_use]
    pub fn methods(&self) -> Vec<InstallMethod> {
        if self.source.is_some() {
            vec![InstallMethod::Prebuilt, InstallMethod::Source]
        } else {
            vec![InstallMethod::Prebuilt]
        }
    }

    /// Executable names, in install order.
    #[must_use]
    pub fn target_names(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.name.clone()).collect()
    }
}

/// Installed and latest versions of one artifact family, for status output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStatus {
    pub name: String,
    pub installed: Option<ArtifactVersion>,
    pub latest: ArtifactVersion,
}

impl ArtifactStatus {
    #[must_use]
    pub fn needs_upgrade(&self) -> bool {
        needs_upgrade(self.installed.as_ref(), &self.latest)
    }
}

impl ArtifactSpec {
    /// Probe the installed version and ask the release feed for the latest.
    pub async fn status(&self, client: &reqwest::Client) -> Result<ArtifactStatus> {
        let installed = self.probe.resolve_installed().await;
        let latest = ReleaseClient::new(client.clone(), &self.name, &self.release.api_url).resolve_remote().await?;
        Ok(ArtifactStatus {
            name: self.name.clone(),
            installed,
            latest,
        })
    }
}

/// What one run will do, fixed once the operator has confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradePlan {
    pub method: InstallMethod,
    pub target_version: ArtifactVersion,
    /// Ref spellings for source builds, most preferred first
    pub candidate_refs: Vec<String>,
}

impl UpgradePlan {
    #[must_use]
    pub fn new(method: InstallMethod, target_version: ArtifactVersion) -> Self {
        let candidate_refs = target_version.candidates();
        Self {
            method,
            target_version,
            candidate_refs,
        }
    }
}

/// States of an upgrade run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeState {
    Idle,
    VersionCheck,
    UpToDate,
    UpgradeNeeded,
    Confirm,
    StrategySelect,
    Prebuilt,
    SourceBuild,
    ProcessGuard,
    Backup,
    Install,
    Done,
    Aborted,
}

impl UpgradeState {
    /// Whether the run has ended.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

impl fmt::Display for UpgradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::VersionCheck => "version check",
            Self::UpToDate => "up to date",
            Self::UpgradeNeeded => "upgrade needed",
            Self::Confirm => "confirmation",
            Self::StrategySelect => "method selection",
            Self::Prebuilt => "prebuilt download",
            Self::SourceBuild => "source build",
            Self::ProcessGuard => "process guard",
            Self::Backup => "backup",
            Self::Install => "install",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Context attached to every error that aborts a run, naming the failed step.
///
/// The underlying [`SpuError`] stays reachable through `downcast_ref`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Upgrade aborted during {step}")]
pub struct UpgradeError {
    pub step: UpgradeState,
}

impl UpgradeError {
    /// The step an aborted run failed in, if `error` came from a run.
    #[must_use]
    pub fn step_of(error: &anyhow::Error) -> Option<UpgradeState> {
        error.downcast_ref::<Self>().map(|e| e.step)
    }
}

/// Put `src` in place at `dest` with mode 0755.
///
/// With `use_sudo` this runs `sudo install`, otherwise the file is copied next
/// to `dest` and renamed over it.
pub async fn install_binary(src: &Path, dest: &Path, use_sudo: bool) -> Result<()> {
    let fail = |reason: String| SpuError::InstallFailed {
        path: dest.display().to_string(),
        reason,
    };

    tracing::info!("Installing {} -> {}", src.display(), dest.display());
    if use_sudo {
        let output = ToolCommand::privileged("install", true)
            .args(["-m", "0755"])
            .arg(src.display().to_string())
            .arg(dest.display().to_string())
            .output()
            .await?;
        if !output.success {
            return Err(fail(output.stderr.trim().to_string()).into());
        }
        return Ok(());
    }

    crate::utils::fs::install_file(src, dest, 0o755).map_err(|e| fail(format!("{e:#}")))?;
    Ok(())
}
