//! The `Config` file model, loading and validation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::core::SpuError;
use crate::utils::platform::resolve_path;

/// Environment variable overriding the default config location.
pub const CONFIG_PATH_ENV: &str = "SPU_CONFIG_PATH";

/// Matches `GLV_VERSION=v1.30.4` and quoted variants in gLiveView.sh.
pub const DEFAULT_GLV_VERSION_PATTERN: &str = r#"GLV_VERSION=["']?(v?[0-9][0-9A-Za-z.\-]*)"#;

const GUILD_SCRIPTS_BASE: &str =
    "https://raw.githubusercontent.com/cardano-community/guild-operators/master/scripts/cnode-helper-scripts";

/// How a node upgrade obtains its binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InstallMethod {
    /// Download the release archive published on GitHub
    Prebuilt,
    /// Build from a local working copy with cabal
    Source,
}

impl fmt::Display for InstallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prebuilt => f.write_str("prebuilt"),
            Self::Source => f.write_str("source"),
        }
    }
}

/// Host configuration, loaded once per invocation and passed to components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Prefix privileged commands (systemctl, apt, make install) with `sudo`.
    #[serde(default = "default_use_sudo")]
    pub use_sudo: bool,

    #[serde(default)]
    pub node: NodeConfig,

    #[serde(default)]
    pub cncli: CncliConfig,

    #[serde(default)]
    pub gliveview: GliveviewConfig,

    #[serde(default)]
    pub node_config: NodeConfigFiles,

    #[serde(default)]
    pub libs: LibsConfig,
}

/// `cardano-node` and `cardano-cli`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// systemd unit name without the `.service` suffix
    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[serde(default = "default_bin_dir")]
    pub install_dir: PathBuf,

    #[serde(default = "default_bin_dir")]
    pub cli_install_dir: PathBuf,

    #[serde(default = "default_node_backup_dir")]
    pub backup_dir: PathBuf,

    /// Working copy used by source builds
    #[serde(default = "default_node_source_dir")]
    pub source_dir: PathBuf,

    #[serde(default = "default_node_repo_url")]
    pub repo_url: String,

    #[serde(default = "default_node_release_api")]
    pub release_api: String,

    #[serde(default = "default_node_download_base")]
    pub download_base: String,

    /// Archive file name; `{tag}` and `{version}` are substituted
    #[serde(default = "default_node_archive")]
    pub archive: String,

    /// Seconds to wait for processes to exit after SIGTERM
    #[serde(default = "default_terminate_timeout")]
    pub terminate_timeout_secs: u64,

    /// apt packages removed before a source build
    #[serde(default = "default_conflicting_packages")]
    pub conflicting_packages: Vec<String>,

    /// Skip the method prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_method: Option<InstallMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CncliConfig {
    #[serde(default = "default_bin_dir")]
    pub install_dir: PathBuf,

    #[serde(default = "default_cncli_backup_dir")]
    pub backup_dir: PathBuf,

    #[serde(default = "default_cncli_release_api")]
    pub release_api: String,

    #[serde(default = "default_cncli_download_base")]
    pub download_base: String,

    #[serde(default = "default_cncli_archive")]
    pub archive: String,
}

/// Guild operators' gLiveView monitoring script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GliveviewConfig {
    #[serde(default = "default_node_home")]
    pub dir: PathBuf,

    #[serde(default = "default_glv_script_url")]
    pub script_url: String,

    #[serde(default = "default_glv_env_url")]
    pub env_url: String,

    /// Node config file name written into the `CONFIG=` line of `env`
    #[serde(default = "default_config_file_name")]
    pub config_file_name: String,

    /// Regex with one capture group for the version in gLiveView.sh
    #[serde(default = "default_glv_version_pattern")]
    pub version_pattern: String,
}

/// Node configuration and genesis files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfigFiles {
    #[serde(default = "default_node_home")]
    pub dir: PathBuf,

    #[serde(default = "default_network")]
    pub network: String,

    #[serde(default = "default_environments_url")]
    pub base_url: String,

    /// Block producers use `config-bp.json` instead of `config.json`
    #[serde(default)]
    pub is_block_producer: bool,

    #[serde(default = "default_genesis_files")]
    pub files: Vec<String>,

    #[serde(default = "default_diff_tool")]
    pub diff_tool: String,
}

/// Native libraries built from source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibsConfig {
    /// Parent directory of the library working copies
    #[serde(default = "default_git_dir")]
    pub git_dir: PathBuf,

    /// Install prefix passed to configure and checked for presence
    #[serde(default = "default_prefix")]
    pub prefix: PathBuf,
}

const fn default_use_sudo() -> bool {
    true
}

fn default_service_name() -> String {
    "cardano-node".to_string()
}

fn default_bin_dir() -> PathBuf {
    PathBuf::from("/usr/local/bin")
}

fn default_node_backup_dir() -> PathBuf {
    PathBuf::from("~/backup/cardano-node")
}

fn default_node_source_dir() -> PathBuf {
    PathBuf::from("~/git/cardano-node")
}

fn default_node_repo_url() -> String {
    "https://github.com/IntersectMBO/cardano-node.git".to_string()
}

fn default_node_release_api() -> String {
    "https://api.github.com/repos/IntersectMBO/cardano-node/releases/latest".to_string()
}

fn default_node_download_base() -> String {
    "https://github.com/IntersectMBO/cardano-node/releases/download".to_string()
}

fn default_node_archive() -> String {
    "cardano-node-{tag}-linux.tar.gz".to_string()
}

const fn default_terminate_timeout() -> u64 {
    30
}

fn default_conflicting_packages() -> Vec<String> {
    vec!["libsodium-dev".to_string()]
}

fn default_cncli_backup_dir() -> PathBuf {
    PathBuf::from("~/backup/cncli")
}

fn default_cncli_release_api() -> String {
    "https://api.github.com/repos/cardano-community/cncli/releases/latest".to_string()
}

fn default_cncli_download_base() -> String {
    "https://github.com/cardano-community/cncli/releases/download".to_string()
}

fn default_cncli_archive() -> String {
    "cncli-{version}-ubuntu22-x86_64-unknown-linux-gnu.tar.gz".to_string()
}

fn default_node_home() -> PathBuf {
    PathBuf::from("~/cardano-my-node")
}

fn default_glv_script_url() -> String {
    format!("{GUILD_SCRIPTS_BASE}/gLiveView.sh")
}

fn default_glv_env_url() -> String {
    format!("{GUILD_SCRIPTS_BASE}/env")
}

fn default_config_file_name() -> String {
    "config.json".to_string()
}

fn default_glv_version_pattern() -> String {
    DEFAULT_GLV_VERSION_PATTERN.to_string()
}

fn default_network() -> String {
    "mainnet".to_string()
}

fn default_environments_url() -> String {
    "https://book.play.dev.cardano.org/environments".to_string()
}

fn default_genesis_files() -> Vec<String> {
    ["byron-genesis.json", "shelley-genesis.json", "alonzo-genesis.json", "conway-genesis.json", "checkpoints.json"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_diff_tool() -> String {
    "vimdiff".to_string()
}

fn default_git_dir() -> PathBuf {
    PathBuf::from("~/git")
}

fn default_prefix() -> PathBuf {
    PathBuf::from("/usr/local")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_sudo: default_use_sudo(),
            node: NodeConfig::default(),
            cncli: CncliConfig::default(),
            gliveview: GliveviewConfig::default(),
            node_config: NodeConfigFiles::default(),
            libs: LibsConfig::default(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            install_dir: default_bin_dir(),
            cli_install_dir: default_bin_dir(),
            backup_dir: default_node_backup_dir(),
            source_dir: default_node_source_dir(),
            repo_url: default_node_repo_url(),
            release_api: default_node_release_api(),
            download_base: default_node_download_base(),
            archive: default_node_archive(),
            terminate_timeout_secs: default_terminate_timeout(),
            conflicting_packages: default_conflicting_packages(),
            default_method: None,
        }
    }
}

impl Default for CncliConfig {
    fn default() -> Self {
        Self {
            install_dir: default_bin_dir(),
            backup_dir: default_cncli_backup_dir(),
            release_api: default_cncli_release_api(),
            download_base: default_cncli_download_base(),
            archive: default_cncli_archive(),
        }
    }
}

impl Default for GliveviewConfig {
    fn default() -> Self {
        Self {
            dir: default_node_home(),
            script_url: default_glv_script_url(),
            env_url: default_glv_env_url(),
            config_file_name: default_config_file_name(),
            version_pattern: default_glv_version_pattern(),
        }
    }
}

impl Default for NodeConfigFiles {
    fn default() -> Self {
        Self {
            dir: default_node_home(),
            network: default_network(),
            base_url: default_environments_url(),
            is_block_producer: false,
            files: default_genesis_files(),
            diff_tool: default_diff_tool(),
        }
    }
}

impl Default for LibsConfig {
    fn default() -> Self {
        Self {
            git_dir: default_git_dir(),
            prefix: default_prefix(),
        }
    }
}

impl NodeConfigFiles {
    /// Node config file for this host's role.
    #[must_use]
    pub fn config_file(&self) -> &'static str {
        if self.is_block_producer { "config-bp.json" } else { "config.json" }
    }

    /// Config file first, then the genesis and checkpoint files.
    #[must_use]
    pub fn managed_files(&self) -> Vec<String> {
        let mut files = vec![self.config_file().to_string()];
        files.extend(self.files.iter().filter(|f| f.as_str() != self.config_file()).cloned());
        files
    }

    /// Download URL for one managed file.
    #[must_use]
    pub fn url_for(&self, file: &str) -> String {
        format!("{}/{}/{}", self.base_url.trim_end_matches('/'), self.network, file)
    }
}

/// How serious a [`ConfigIssue`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The run will fail or misbehave
    Error,
    /// Worth a look, SPU can cope
    Warning,
}

/// One finding of [`Config::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub severity: Severity,
    /// Dotted field name, e.g. `node.install_dir`
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            field: field.to_string(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl Config {
    /// Load from `SPU_CONFIG_PATH` or `~/.spu/config.toml`, falling back to defaults.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from an explicit path, or from the default location when `None`.
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(SpuError::ConfigError {
                    message: format!("config file {} does not exist", path.display()),
                }
                .into());
            }
            return Self::load_from(&path).await;
        }

        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default().expanded()
        }
    }

    /// Parse `path` and expand every configured path.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self =
            toml::from_str(&content).with_context(|| format!("Failed to parse config from {}", path.display()))?;
        tracing::debug!("Loaded config from {}", path.display());
        config.expanded()
    }

    /// Write as pretty TOML, creating parent directories.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// `SPU_CONFIG_PATH` if set, otherwise `~/.spu/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
            && !path.trim().is_empty()
        {
            return resolve_path(&path);
        }
        let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
        Ok(home.join(".spu").join("config.toml"))
    }

    /// Copy with `~` and `$VAR` expanded in every path field.
    pub fn expanded(mut self) -> Result<Self> {
        for path in [
            &mut self.node.install_dir,
            &mut self.node.cli_install_dir,
            &mut self.node.backup_dir,
            &mut self.node.source_dir,
            &mut self.cncli.install_dir,
            &mut self.cncli.backup_dir,
            &mut self.gliveview.dir,
            &mut self.node_config.dir,
            &mut self.libs.git_dir,
            &mut self.libs.prefix,
        ] {
            *path = resolve_path(&path.to_string_lossy())?;
        }
        Ok(self)
    }

    /// Static sanity checks for `spu config check`.
    ///
    /// Directories that SPU creates on demand (backups, working copies) only
    /// warn when missing.
    #[must_use]
    pub fn check(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.node.service_name.trim().is_empty() {
            issues.push(ConfigIssue::error("node.service_name", "must not be empty"));
        }
        if self.node.terminate_timeout_secs == 0 {
            issues.push(ConfigIssue::error("node.terminate_timeout_secs", "must be greater than zero"));
        }

        for (field, dir) in [
            ("node.install_dir", &self.node.install_dir),
            ("node.cli_install_dir", &self.node.cli_install_dir),
            ("cncli.install_dir", &self.cncli.install_dir),
            ("gliveview.dir", &self.gliveview.dir),
            ("node_config.dir", &self.node_config.dir),
        ] {
            if !dir.is_dir() {
                issues.push(ConfigIssue::error(field, format!("{} is not a directory", dir.display())));
            }
        }

        for (field, dir) in [
            ("node.backup_dir", &self.node.backup_dir),
            ("cncli.backup_dir", &self.cncli.backup_dir),
            ("node.source_dir", &self.node.source_dir),
            ("libs.git_dir", &self.libs.git_dir),
        ] {
            if !dir.exists() {
                issues.push(ConfigIssue::warning(field, format!("{} does not exist yet", dir.display())));
            }
        }

        for (field, url) in [
            ("node.release_api", &self.node.release_api),
            ("node.download_base", &self.node.download_base),
            ("node.repo_url", &self.node.repo_url),
            ("cncli.release_api", &self.cncli.release_api),
            ("cncli.download_base", &self.cncli.download_base),
            ("gliveview.script_url", &self.gliveview.script_url),
            ("gliveview.env_url", &self.gliveview.env_url),
            ("node_config.base_url", &self.node_config.base_url),
        ] {
            if let Err(e) = reqwest::Url::parse(url) {
                issues.push(ConfigIssue::error(field, format!("'{url}' is not a valid URL: {e}")));
            }
        }

        for (field, template) in [("node.archive", &self.node.archive), ("cncli.archive", &self.cncli.archive)] {
            if !template.contains("{tag}") && !template.contains("{version}") {
                issues.push(ConfigIssue::warning(
                    field,
                    format!("'{template}' has no {{tag}} or {{version}} placeholder"),
                ));
            }
        }

        match regex::Regex::new(&self.gliveview.version_pattern) {
            Ok(re) if re.captures_len() < 2 => issues.push(ConfigIssue::error(
                "gliveview.version_pattern",
                "needs one capture group for the version",
            )),
            Ok(_) => {}
            Err(e) => issues.push(ConfigIssue::error("gliveview.version_pattern", e.to_string())),
        }

        issues
    }
}
