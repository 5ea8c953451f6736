//! Debian package database access through `dpkg` and `apt`.

use anyhow::Result;

use crate::core::SpuError;
use crate::utils::command::ToolCommand;

/// Queries and changes system packages.
#[derive(Debug, Clone)]
pub struct PackageManager {
    use_sudo: bool,
    dpkg_query: String,
    apt: String,
}

impl PackageManager {
    #[must_use]
    pub fn new(use_sudo: bool) -> Self {
        Self {
            use_sudo,
            dpkg_query: "dpkg-query".to_string(),
            apt: "apt-get".to_string(),
        }
    }

    /// Use other `dpkg-query` and `apt-get` executables.
    #[must_use]
    pub fn with_programs(mut self, dpkg_query: impl Into<String>, apt: impl Into<String>) -> Self {
        self.dpkg_query = dpkg_query.into();
        self.apt = apt.into();
        self
    }

    /// Installed version of `package`, `None` when not installed.
    pub async fn installed_version(&self, package: &str) -> Option<String> {
        let output = ToolCommand::new(&self.dpkg_query)
            .args(["-W", "-f=${Status}|${Version}", package])
            .output()
            .await
            .ok()?;
        if !output.success {
            return None;
        }
        parse_status_line(&output.stdout)
    }

    pub async fn is_installed(&self, package: &str) -> bool {
        self.installed_version(package).await.is_some()
    }

    /// Refresh the package index, then install `package`.
    pub async fn install(&self, package: &str) -> Result<()> {
        tracing::info!("Installing package {}", package);
        ToolCommand::privileged(&self.apt, self.use_sudo)
            .arg("update")
            .env("DEBIAN_FRONTEND", "noninteractive")
            .execute_success()
            .await
            .map_err(|e| install_failed(package, "apt-get update", &e))?;
        self.apt_get("install", package).await
    }

    pub async fn remove(&self, package: &str) -> Result<()> {
        tracing::info!("Removing package {}", package);
        self.apt_get("remove", package).await
    }

    async fn apt_get(&self, action: &str, package: &str) -> Result<()> {
        ToolCommand::privileged(&self.apt, self.use_sudo)
            .args([action, "-y", package])
            .env("DEBIAN_FRONTEND", "noninteractive")
            .execute_success()
            .await
            .map_err(|e| install_failed(package, &format!("apt-get {action}"), &e))
    }
}

fn install_failed(package: &str, step: &str, error: &anyhow::Error) -> anyhow::Error {
    SpuError::LibraryInstallFailed {
        name: package.to_string(),
        step: step.to_string(),
        reason: format!("{error:#}"),
    }
    .into()
}

/// Version from `install ok installed|1.2.3`; other states are not installed.
fn parse_status_line(line: &str) -> Option<String> {
    let (status, version) = line.trim().split_once('|')?;
    let installed = status.split_whitespace().last() == Some("installed");
    (installed && !version.is_empty()).then(|| version.to_string())
}
