//! Native libraries required to build and run cardano-node.
//!
//! Three libraries are built from source into a prefix (default `/usr/local`):
//! IOG's libsodium fork, secp256k1 with Schnorr signatures, and blst. The fourth,
//! `liblmdb-dev`, comes from apt.
//!
//! A source library counts as installed when both `<prefix>/lib/<libfile>` and
//! `<prefix>/include/<header>` exist; its version comes from `pkg-config`. Each
//! check builds fresh [`LibraryRecord`]s, nothing is cached between passes.
//!
//! Installing clones the upstream repository into the git directory. An existing
//! checkout is only deleted with the operator's approval; declining skips that
//! library.

pub mod catalog;
pub mod packages;

pub use catalog::{BuildStep, LibrarySource, NativeLibrary, required_libraries};
pub use packages::PackageManager;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::core::SpuError;
use crate::git::GitRepo;
use crate::prompt::Prompter;
use crate::utils::command::ToolCommand;
use crate::version::tag_candidates;

/// State of one library as seen by the last check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryRecord {
    pub name: String,
    pub installed: bool,
    /// `None` when not installed or the version is unknown
    pub version: Option<String>,
    /// Ref installed when the operator names none
    pub pinned_ref: Option<String>,
}

/// Result of installing one library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryInstall {
    Installed,
    /// The operator kept an existing checkout
    Skipped,
}

/// Checks and installs the required native libraries.
#[derive(Debug, Clone)]
pub struct LibraryManager {
    libraries: Vec<NativeLibrary>,
    git_dir: PathBuf,
    prefix: PathBuf,
    use_sudo: bool,
    packages: PackageManager,
    pkg_config: String,
}

impl LibraryManager {
    pub fn new(git_dir: impl Into<PathBuf>, prefix: impl Into<PathBuf>, use_sudo: bool) -> Self {
        Self {
            libraries: required_libraries(),
            git_dir: git_dir.into(),
            prefix: prefix.into(),
            use_sudo,
            packages: PackageManager::new(use_sudo),
            pkg_config: "pkg-config".to_string(),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.libs.git_dir, &config.libs.prefix, config.use_sudo)
    }

    /// Manage `libraries` instead of the required set.
    #[must_use]
    pub fn with_libraries(mut self, libraries: Vec<NativeLibrary>) -> Self {
        self.libraries = libraries;
        self
    }

    #[must_use]
    pub fn with_package_manager(mut self, packages: PackageManager) -> Self {
        self.packages = packages;
        self
    }

    #[must_use]
    pub fn with_pkg_config(mut self, program: impl Into<String>) -> Self {
        self.pkg_config = program.into();
        self
    }

    #[must_use]
    pub fn libraries(&self) -> &[NativeLibrary] {
        &self.libraries
    }

    /// Look up a managed library by name.
    pub fn library(&self, name: &str) -> Result<&NativeLibrary> {
        self.libraries.iter().find(|l| l.name == name).ok_or_else(|| {
            let known: Vec<_> = self.libraries.iter().map(|l| l.name.as_str()).collect();
            SpuError::ConfigError {
                message: format!("Unknown library '{name}' (known: {})", known.join(", ")),
            }
            .into()
        })
    }

    /// Check every library, in order.
    pub async fn check(&self) -> Vec<LibraryRecord> {
        let mut records = Vec::with_capacity(self.libraries.len());
        for library in &self.libraries {
            records.push(self.check_one(library).await);
        }
        records
    }

    async fn check_one(&self, library: &NativeLibrary) -> LibraryRecord {
        let (installed, version) = match &library.source {
            LibrarySource::Git {
                lib_file,
                header,
                pkg_config,
                ..
            } => {
                let installed = self.prefix.join("lib").join(lib_file).exists()
                    && self.prefix.join("include").join(header).exists();
                let version = if installed { self.pkg_config_version(pkg_config).await } else { None };
                (installed, version)
            }
            LibrarySource::Package { package } => {
                let version = self.packages.installed_version(package).await;
                (version.is_some(), version)
            }
        };
        tracing::debug!("{}: installed={} version={:?}", library.name, installed, version);
        LibraryRecord {
            name: library.name.clone(),
            installed,
            version,
            pinned_ref: library.pinned_ref().map(ToString::to_string),
        }
    }

    async fn pkg_config_version(&self, module: &str) -> Option<String> {
        let pc_path = self.prefix.join("lib").join("pkgconfig");
        let output = ToolCommand::new(&self.pkg_config)
            .args(["--modversion", module])
            .env("PKG_CONFIG_PATH", pc_path.display().to_string())
            .output()
            .await
            .ok()?;
        let version = output.stdout.trim();
        (output.success && !version.is_empty()).then(|| version.to_string())
    }

    /// Install library `name` at its pinned ref.
    pub async fn install(&self, name: &str, prompter: &dyn Prompter) -> Result<LibraryInstall> {
        let library = self.library(name)?;
        self.install_at(library, library.pinned_ref(), prompter).await
    }

    /// Reinstall library `name` at `reference`, or at its pinned ref when
    /// `reference` is empty.
    pub async fn reinstall(&self, name: &str, reference: Option<&str>, prompter: &dyn Prompter) -> Result<LibraryInstall> {
        let library = self.library(name)?;
        let reference = reference.map(str::trim).filter(|r| !r.is_empty()).or_else(|| library.pinned_ref());
        self.install_at(library, reference, prompter).await
    }

    async fn install_at(
        &self,
        library: &NativeLibrary,
        reference: Option<&str>,
        prompter: &dyn Prompter,
    ) -> Result<LibraryInstall> {
        let repo_url = match &library.source {
            LibrarySource::Package { package } => {
                self.packages.install(package).await?;
                return Ok(LibraryInstall::Installed);
            }
            LibrarySource::Git { repo_url, .. } => repo_url,
        };

        tracing::info!("Installing {} at {}", library.name, reference.unwrap_or("default branch"));
        let Some(repo) = self.fresh_checkout(&library.name, repo_url, prompter).await? else {
            return Ok(LibraryInstall::Skipped);
        };
        let resolved = match reference {
            Some(reference) => {
                let step = format!("checkout {reference}");
                let tag =
                    repo.resolve_ref(&tag_candidates(reference)).await.map_err(|e| unresolved(&library.name, &step, &e))?;
                repo.checkout(&tag).await.map_err(|e| failed(&library.name, &step, &e))?;
                Some(tag)
            }
            None => None,
        };

        for step in library.recipe(&self.prefix, resolved.as_deref()) {
            self.run_step(&library.name, repo.path(), &step).await?;
        }
        Ok(LibraryInstall::Installed)
    }

    /// Clone `repo_url` into the git directory, replacing an existing checkout
    /// only if the operator agrees. `None` when they decline.
    async fn fresh_checkout(&self, name: &str, repo_url: &str, prompter: &dyn Prompter) -> Result<Option<GitRepo>> {
        let dest = self.git_dir.join(name);
        if dest.exists() {
            let question = format!("{} already exists. Delete it and clone again?", dest.display());
            if !prompter.confirm(&question, false)? {
                println!("Skipping {name}");
                return Ok(None);
            }
            tokio::fs::remove_dir_all(&dest)
                .await
                .with_context(|| format!("Failed to remove {}", dest.display()))?;
        }
        let repo = GitRepo::clone(repo_url, &dest).await.map_err(|e| failed(name, "clone", &e))?;
        Ok(Some(repo))
    }

    async fn run_step(&self, name: &str, dir: &Path, step: &BuildStep) -> Result<()> {
        let result = match step {
            BuildStep::Run { program, args, sudo } => {
                ToolCommand::privileged(program, *sudo && self.use_sudo)
                    .args(args.iter().cloned())
                    .current_dir(dir)
                    .inherit_stdio()
                    .with_context(name)
                    .execute_success()
                    .await
            }
            BuildStep::WriteFile { path, contents } => crate::utils::fs::safe_write(&dir.join(path), contents),
        };
        result.map_err(|e| failed(name, &step.label(), &e))
    }
}

fn failed(name: &str, step: &str, error: &anyhow::Error) -> anyhow::Error {
    SpuError::LibraryInstallFailed {
        name: name.to_string(),
        step: step.to_string(),
        reason: format!("{error:#}"),
    }
    .into()
}

/// Like [`failed`], listing the local tags when the ref was not found.
fn unresolved(name: &str, step: &str, error: &anyhow::Error) -> anyhow::Error {
    let reason = match error.downcast_ref::<SpuError>() {
        Some(SpuError::RefNotFound { available_tags, .. }) => {
            format!("{error:#}; available tags: {}", available_tags.join(", "))
        }
        _ => format!("{error:#}"),
    };
    SpuError::LibraryInstallFailed {
        name: name.to_string(),
        step: step.to_string(),
        reason,
    }
    .into()
}
