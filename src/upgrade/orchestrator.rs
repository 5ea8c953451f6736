//! The upgrade state machine.

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use super::backup::{BackupManager, BackupOutcome};
use super::prebuilt::PrebuiltInstall;
use super::source_build::SourceBuildInstall;
use super::strategy::InstallStrategy;
use super::{ArtifactSpec, UpgradeError, UpgradePlan, UpgradeState, install_binary};
use crate::config::{Config, InstallMethod};
use crate::core::SpuError;
use crate::libs::packages::PackageManager;
use crate::process::ProcessGuard;
use crate::prompt::Prompter;
use crate::service::ServiceControl;
use crate::version::{ArtifactVersion, ReleaseClient, needs_upgrade};

/// Operator choices for one run.
#[derive(Debug, Clone)]
pub struct UpgradeOptions {
    /// Reinstall even when the installed version matches the release
    pub force: bool,
    /// Skip the method prompt
    pub method: Option<InstallMethod>,
    pub use_sudo: bool,
    /// Bounded wait after `SIGTERM`
    pub terminate_timeout: Duration,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            force: false,
            method: None,
            use_sudo: false,
            terminate_timeout: Duration::from_secs(30),
        }
    }
}

impl UpgradeOptions {
    /// Sudo and termination timeout from the configuration, no method preset.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            use_sudo: config.use_sudo,
            terminate_timeout: Duration::from_secs(config.node.terminate_timeout_secs),
            ..Self::default()
        }
    }
}

/// How a run ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// Installed version already matches the release
    UpToDate { installed: ArtifactVersion },
    /// The operator declined the upgrade
    Cancelled,
    Upgraded {
        previous: Option<ArtifactVersion>,
        installed: ArtifactVersion,
        /// What the new binary reports, `None` if it could not be probed
        verified: Option<ArtifactVersion>,
        backups: Vec<BackupOutcome>,
    },
}

/// Drives one artifact family through version check, build, and install.
///
/// Each run starts at [`UpgradeState::Idle`] and ends in `Done` or `Aborted`.
/// Errors carry an [`UpgradeError`] naming the step that failed.
pub struct UpgradeOrchestrator<'a> {
    spec: ArtifactSpec,
    client: reqwest::Client,
    prompter: &'a dyn Prompter,
    options: UpgradeOptions,
    guard: ProcessGuard,
    service: Option<ServiceControl>,
    packages: PackageManager,
    strategy_override: Option<InstallStrategy>,
    state: UpgradeState,
    history: Vec<UpgradeState>,
}

impl<'a> UpgradeOrchestrator<'a> {
    pub fn new(spec: ArtifactSpec, client: reqwest::Client, prompter: &'a dyn Prompter) -> Self {
        Self {
            spec,
            client,
            prompter,
            options: UpgradeOptions::default(),
            guard: ProcessGuard::new(),
            service: None,
            packages: PackageManager::new(false),
            strategy_override: None,
            state: UpgradeState::Idle,
            history: vec![UpgradeState::Idle],
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: UpgradeOptions) -> Self {
        self.packages = PackageManager::new(options.use_sudo);
        self.options = options;
        self
    }

    /// Stop this unit before install and offer to start it afterwards.
    #[must_use]
    pub fn with_service(mut self, service: ServiceControl) -> Self {
        self.service = Some(service);
        self
    }

    #[must_use]
    pub fn with_process_guard(mut self, guard: ProcessGuard) -> Self {
        self.guard = guard;
        self
    }

    #[must_use]
    pub fn with_package_manager(mut self, packages: PackageManager) -> Self {
        self.packages = packages;
        self
    }

    /// Use `strategy` whenever its method is selected.
    #[must_use]
    pub fn with_strategy(mut self, strategy: InstallStrategy) -> Self {
        self.strategy_override = Some(strategy);
        self
    }

    #[must_use]
    pub const fn state(&self) -> UpgradeState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`.
    #[must_use]
    pub fn history(&self) -> &[UpgradeState] {
        &self.history
    }

    fn transition(&mut self, next: UpgradeState) {
        tracing::info!("{}: {} -> {}", self.spec.name, self.state, next);
        self.state = next;
        self.history.push(next);
    }

    /// Wrap a failure with the step it happened in and end the run.
    fn abort(&mut self, error: anyhow::Error) -> anyhow::Error {
        let step = self.state;
        if step != UpgradeState::Aborted {
            self.transition(UpgradeState::Aborted);
        }
        error.context(UpgradeError { step })
    }

    /// Run the upgrade to completion.
    pub async fn run(&mut self) -> Result<UpgradeOutcome> {
        match self.run_steps().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(self.abort(e)),
        }
    }

    async fn run_steps(&mut self) -> Result<UpgradeOutcome> {
        self.transition(UpgradeState::VersionCheck);
        let installed = self.spec.probe.resolve_installed().await;
        let remote = ReleaseClient::new(self.client.clone(), &self.spec.name, &self.spec.release.api_url)
            .resolve_remote()
            .await?;
        self.print_versions(installed.as_ref(), &remote);

        if !needs_upgrade(installed.as_ref(), &remote) && !self.options.force {
            println!("{} {} is up to date", "✓".green(), self.spec.name);
            self.transition(UpgradeState::UpToDate);
            self.transition(UpgradeState::Done);
            return Ok(UpgradeOutcome::UpToDate { installed: remote });
        }
        self.transition(UpgradeState::UpgradeNeeded);

        self.transition(UpgradeState::Confirm);
        if !self.prompter.confirm(&self.confirm_question(installed.as_ref(), &remote), true)? {
            println!("{}", "Upgrade cancelled".yellow());
            self.transition(UpgradeState::Aborted);
            return Ok(UpgradeOutcome::Cancelled);
        }

        self.transition(UpgradeState::StrategySelect);
        let method = self.select_method()?;
        let plan = UpgradePlan::new(method, remote.clone());
        let strategy = self.strategy_for(method)?;

        self.transition(match method {
            InstallMethod::Prebuilt => UpgradeState::Prebuilt,
            InstallMethod::Source => UpgradeState::SourceBuild,
        });
        let built = strategy.run(&plan, &self.spec.target_names(), self.prompter).await?;

        self.transition(UpgradeState::ProcessGuard);
        self.stop_service().await;
        self.clear_running_processes().await?;

        self.transition(UpgradeState::Backup);
        let backups = self.backup_targets().await;

        self.transition(UpgradeState::Install);
        for target in &self.spec.targets {
            let dest = target.installed_path();
            install_binary(built.get(&target.name)?, &dest, self.options.use_sudo).await?;
            println!("{} Installed {}", "✓".green(), dest.display());
        }
        drop(built);

        let verified = self.spec.probe.resolve_installed().await;
        match &verified {
            Some(v) if *v == remote => {}
            Some(v) => tracing::warn!("{} reports {} after installing {}", self.spec.name, v, remote),
            None => tracing::warn!("Could not read the version of the installed {}", self.spec.name),
        }

        self.transition(UpgradeState::Done);
        println!("{} {} {} installed", "✓".green().bold(), self.spec.name, remote);
        self.offer_restart().await?;

        Ok(UpgradeOutcome::Upgraded {
            previous: installed,
            installed: remote,
            verified,
            backups,
        })
    }

    /// Put every backed-up binary of this family back in place.
    ///
    /// All backups must exist before anything is touched. Returns the restored
    /// paths, empty when the operator declined.
    pub async fn rollback(&mut self) -> Result<Vec<PathBuf>> {
        match self.rollback_steps().await {
            Ok(restored) => Ok(restored),
            Err(e) => Err(self.abort(e)),
        }
    }

    async fn rollback_steps(&mut self) -> Result<Vec<PathBuf>> {
        self.transition(UpgradeState::Confirm);
        for target in &self.spec.targets {
            let manager = BackupManager::new(&target.backup_dir);
            if !manager.has_backup(&target.installed_path()) {
                return Err(SpuError::BinaryNotFound {
                    name: format!("{}.bak", target.name),
                    location: target.backup_dir.display().to_string(),
                }
                .into());
            }
        }

        let question = format!("Restore {} from backup?", self.spec.target_names().join(", "));
        if !self.prompter.confirm(&question, false)? {
            println!("{}", "Rollback cancelled".yellow());
            self.transition(UpgradeState::Aborted);
            return Ok(Vec::new());
        }

        self.transition(UpgradeState::ProcessGuard);
        self.stop_service().await;
        self.clear_running_processes().await?;

        self.transition(UpgradeState::Install);
        let mut restored = Vec::new();
        for target in &self.spec.targets {
            let dest = target.installed_path();
            BackupManager::new(&target.backup_dir).restore(&dest, self.options.use_sudo).await?;
            println!("{} Restored {}", "✓".green(), dest.display());
            restored.push(dest);
        }

        self.transition(UpgradeState::Done);
        self.offer_restart().await?;
        Ok(restored)
    }

    fn print_versions(&self, installed: Option<&ArtifactVersion>, remote: &ArtifactVersion) {
        let installed_label = installed.map_or_else(|| "not installed".dimmed().to_string(), ToString::to_string);
        println!("{} installed: {}", self.spec.name.bold(), installed_label);
        println!("{} latest:    {}", self.spec.name.bold(), remote);
        if let Some(installed) = installed
            && installed.compare(remote) == Some(std::cmp::Ordering::Greater)
        {
            println!("{}", "Installed build is newer than the latest release".yellow());
        }
    }

    fn confirm_question(&self, installed: Option<&ArtifactVersion>, remote: &ArtifactVersion) -> String {
        let mut question = match installed {
            Some(v) if v == remote => format!("Reinstall {} {}?", self.spec.name, remote),
            Some(v) => format!("Upgrade {} from {} to {}?", self.spec.name, v, remote),
            None => format!("Install {} {}?", self.spec.name, remote),
        };
        if let Some(service) = &self.service {
            question = format!("{question} ({} will be stopped)", service.unit());
        }
        question
    }

    fn select_method(&self) -> Result<InstallMethod> {
        let supported = self.spec.methods();
        if let [only] = supported.as_slice() {
            return Ok(*only);
        }

        if let Some(method) = self.options.method {
            if !supported.contains(&method) {
                return Err(SpuError::ConfigError {
                    message: format!("{} cannot be installed with method '{method}'", self.spec.name),
                }
                .into());
            }
            return Ok(method);
        }

        let answer = self.prompter.input("Installation method: 1) prebuilt  2) source", "1")?;
        match answer.trim().to_lowercase().as_str() {
            "1" | "prebuilt" => Ok(InstallMethod::Prebuilt),
            "2" | "source" => Ok(InstallMethod::Source),
            other => Err(SpuError::Aborted {
                step: UpgradeState::StrategySelect.to_string(),
                reason: format!("invalid choice '{other}'"),
            }
            .into()),
        }
    }

    fn strategy_for(&self, method: InstallMethod) -> Result<InstallStrategy> {
        if let Some(strategy) = &self.strategy_override
            && strategy.method() == method
        {
            return Ok(strategy.clone());
        }
        match method {
            InstallMethod::Prebuilt => Ok(InstallStrategy::Prebuilt(PrebuiltInstall::new(
                self.client.clone(),
                self.spec.release.clone(),
            ))),
            InstallMethod::Source => {
                let source = self.spec.source.clone().ok_or_else(|| SpuError::ConfigError {
                    message: format!("{} has no source build", self.spec.name),
                })?;
                Ok(InstallStrategy::SourceBuild(SourceBuildInstall::new(source, self.packages.clone())))
            }
        }
    }

    /// Failing to stop the unit is not fatal; the process guard still runs.
    async fn stop_service(&self) {
        if let Some(service) = &self.service
            && let Err(e) = service.stop().await
        {
            tracing::warn!("Failed to stop {}: {:#}", service.unit(), e);
            println!("{} could not stop {}", "Warning:".yellow(), service.unit());
        }
    }

    async fn clear_running_processes(&self) -> Result<()> {
        let pids = self.guard.find_running(&self.spec.process_name)?;
        if pids.is_empty() {
            return Ok(());
        }

        println!("{} {} is still running (pids {:?})", "!".yellow().bold(), self.spec.process_name, pids);
        if !self.prompter.confirm("Terminate these processes?", false)? {
            return Err(SpuError::Aborted {
                step: UpgradeState::ProcessGuard.to_string(),
                reason: format!("{} must not be running while its binary is replaced", self.spec.process_name),
            }
            .into());
        }

        let report = self.guard.terminate(&pids, self.options.terminate_timeout).await;
        if !report.is_complete() {
            return Err(SpuError::ProcessHeld {
                pids: report.still_running.into_iter().collect(),
            }
            .into());
        }
        println!("{} Terminated {:?}", "✓".green(), report.terminated);
        Ok(())
    }

    /// Back up every target. Failures are reported and skipped.
    async fn backup_targets(&self) -> Vec<BackupOutcome> {
        let mut outcomes = Vec::with_capacity(self.spec.targets.len());
        for target in &self.spec.targets {
            let path = target.installed_path();
            match BackupManager::new(&target.backup_dir).backup(&path).await {
                Ok(outcome) => {
                    if let BackupOutcome::Created(backup) = &outcome {
                        println!("{} Backed up {} to {}", "✓".green(), path.display(), backup.display());
                    }
                    outcomes.push(outcome);
                }
                Err(e) => {
                    tracing::warn!("Backup of {} failed: {:#}", path.display(), e);
                    eprintln!("{} {:#}", "Backup failed:".red().bold(), e);
                }
            }
        }
        outcomes
    }

    async fn offer_restart(&self) -> Result<()> {
        let Some(service) = &self.service else {
            return Ok(());
        };
        if !self.prompter.confirm(&format!("Start {} now?", service.unit()), true)? {
            println!("{} not started", service.unit());
            return Ok(());
        }
        match service.start().await {
            Ok(()) => println!("{} Started {}", "✓".green(), service.unit()),
            Err(e) => {
                tracing::warn!("Failed to start {}: {:#}", service.unit(), e);
                eprintln!("{} could not start {}: {:#}", "Warning:".yellow(), service.unit(), e);
            }
        }
        Ok(())
    }
}
