//! Installed and remote version lookup.
//!
//! - [`VersionProbe`] runs an executable's version command and picks a token from
//!   its output. A missing executable or unparsable output is `None`, which the
//!   orchestrator treats as "nothing installed".
//! - [`ReleaseClient`] reads `tag_name` from a GitHub `releases/latest` endpoint.
//! - [`ScriptVersionSource`] downloads a script and extracts its version variable,
//!   for artifacts (gLiveView) that have no release feed.
//!
//! Remote failures are [`SpuError::ReleaseUnavailable`] and abort a run before
//! anything on disk changes.

use anyhow::Result;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::ArtifactVersion;
use crate::core::SpuError;
use crate::utils::command::ToolCommand;
use crate::utils::platform::find_executable;

/// Default bound for a version command; a hung binary counts as not installed.
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// How to ask an installed executable for its version.
#[derive(Debug, Clone)]
pub struct VersionProbe {
    executable: String,
    install_dir: Option<PathBuf>,
    args: Vec<String>,
    line_prefix: Option<String>,
    token_index: usize,
    timeout: Duration,
}

impl VersionProbe {
    /// Probe `executable args...`, reading the second token of the first line.
    pub fn new<I, S>(executable: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            executable: executable.into(),
            install_dir: None,
            args: args.into_iter().map(Into::into).collect(),
            line_prefix: None,
            token_index: 1,
            timeout: PROBE_TIMEOUT,
        }
    }

    /// Only consider the first line starting with `prefix`.
    ///
    /// `cardano-node version` prints a git revision line after the version line.
    pub fn with_line_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.line_prefix = Some(prefix.into());
        self
    }

    /// Look in `dir` before `PATH`.
    pub fn with_install_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.install_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Installed version, or `None` when the executable is absent or its output
    /// has no version token.
    pub async fn resolve_installed(&self) -> Option<ArtifactVersion> {
        let Some(path) = find_executable(&self.executable, self.install_dir.as_deref()) else {
            tracing::debug!("{} not found", self.executable);
            return None;
        };
        let output = match ToolCommand::new(path.display().to_string())
            .args(self.args.iter().cloned())
            .with_timeout(Some(self.timeout))
            .output()
            .await
        {
            Ok(output) if output.success => output,
            Ok(output) => {
                tracing::debug!("{} exited with {:?}", self.executable, output.code);
                return None;
            }
            Err(e) => {
                tracing::debug!("Failed to run {}: {:#}", self.executable, e);
                return None;
            }
        };
        let version = self.parse_output(&output.stdout);
        tracing::debug!("Installed {}: {:?}", self.executable, version.as_ref().map(ArtifactVersion::raw));
        version
    }

    /// Pick the version token out of version-command output.
    #[must_use]
    pub fn parse_output(&self, stdout: &str) -> Option<ArtifactVersion> {
        let line = match &self.line_prefix {
            Some(prefix) => stdout.lines().map(str::trim).find(|l| l.starts_with(prefix.as_str()))?,
            None => stdout.lines().map(str::trim).find(|l| !l.is_empty())?,
        };
        line.split_whitespace().nth(self.token_index).map(ArtifactVersion::parse)
    }
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

/// Reads the latest release tag from a GitHub-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    client: reqwest::Client,
    artifact: String,
    api_url: String,
}

impl ReleaseClient {
    /// `api_url` is the full `.../releases/latest` URL.
    pub fn new(client: reqwest::Client, artifact: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            client,
            artifact: artifact.into(),
            api_url: api_url.into(),
        }
    }

    /// Latest published release tag.
    pub async fn resolve_remote(&self) -> Result<ArtifactVersion> {
        let unavailable = |reason: String| SpuError::ReleaseUnavailable {
            artifact: self.artifact.clone(),
            reason,
        };

        tracing::debug!("Fetching latest {} release from {}", self.artifact, self.api_url);
        let response = self
            .client
            .get(&self.api_url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Release endpoint returned {}: {}", status, self.api_url);
            return Err(unavailable(format!("endpoint returned {status}")).into());
        }

        let body = response.text().await.map_err(|e| unavailable(e.to_string()))?;
        let release: Release =
            serde_json::from_str(&body).map_err(|e| unavailable(format!("invalid release JSON: {e}")))?;
        if release.tag_name.trim().is_empty() {
            return Err(unavailable("release has an empty tag_name".to_string()).into());
        }
        Ok(ArtifactVersion::parse(&release.tag_name))
    }
}

/// Reads a version variable out of a published script.
#[derive(Debug, Clone)]
pub struct ScriptVersionSource {
    client: reqwest::Client,
    artifact: String,
    url: String,
    pattern: Regex,
}

impl ScriptVersionSource {
    /// `pattern` must have one capture group holding the version token.
    pub fn new(
        client: reqwest::Client,
        artifact: impl Into<String>,
        url: impl Into<String>,
        pattern: &str,
    ) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| SpuError::ConfigError {
            message: format!("invalid version pattern '{pattern}': {e}"),
        })?;
        Ok(Self {
            client,
            artifact: artifact.into(),
            url: url.into(),
            pattern,
        })
    }

    pub async fn resolve_remote(&self) -> Result<ArtifactVersion> {
        let unavailable = |reason: String| SpuError::ReleaseUnavailable {
            artifact: self.artifact.clone(),
            reason,
        };
        let body = crate::utils::download::fetch_text(&self.client, &self.url)
            .await
            .map_err(|e| unavailable(format!("{e:#}")))?;
        self.extract(&body).ok_or_else(|| unavailable("no version found in script".to_string()).into())
    }

    /// First match of the version pattern in `content`.
    #[must_use]
    pub fn extract(&self, content: &str) -> Option<ArtifactVersion> {
        self.pattern
            .captures(content)
            .and_then(|c| c.get(1))
            .map(|m| ArtifactVersion::parse(m.as_str()))
    }
}
