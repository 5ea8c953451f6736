//! Repository sync for source builds
//!
//! Keeps a local working copy of an upstream repository (cardano-node, libsodium,
//! secp256k1, blst) usable for a build: the `origin` remote points at the expected
//! URL, all refs and tags are fetched, and a release ref is checked out detached.
//!
//! Like the rest of SPU this drives the system `git` binary through
//! [`GitCommand`], so operator SSH agents, credential helpers and proxies apply.
//!
//! # Tag spelling
//!
//! Upstream projects are inconsistent about a leading `v` (`10.1.4` vs `v0.3.14`).
//! Callers pass every candidate spelling to [`GitRepo::resolve_ref`], which returns
//! the first that exists locally and otherwise reports every candidate tried along
//! with the tags that do exist.
//!
//! # Examples
//!
//! ```rust,no_run
//! use spu_cli::git::GitRepo;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let repo = GitRepo::new("/home/cardano/git/cardano-node");
//! repo.ensure_remote("https://github.com/IntersectMBO/cardano-node.git").await?;
//! repo.fetch_all().await?;
//! let tag = repo.resolve_ref(&["10.1.4".into(), "v10.1.4".into()]).await?;
//! repo.checkout(&tag).await?;
//! repo.update_submodules().await?;
//! # Ok(())
//! # }
//! ```

pub mod command_builder;

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::core::SpuError;
use crate::git::command_builder::GitCommand;
use crate::prompt::Prompter;
use crate::utils::progress::spinner_with_message;

/// Marker git prints when a fetched tag would overwrite a diverged local tag.
const TAG_CLOBBER_MARKER: &str = "would clobber existing tag";

/// Canonical form of a remote URL for comparison.
///
/// Trims whitespace, then a trailing `/`, then a trailing `.git`.
///
/// ```rust
/// use spu_cli::git::canonical_url;
///
/// assert_eq!(
///     canonical_url(" https://github.com/IntersectMBO/cardano-node.git/ "),
///     "https://github.com/IntersectMBO/cardano-node"
/// );
/// ```
#[must_use]
pub fn canonical_url(url: &str) -> String {
    let trimmed = url.trim();
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    trimmed.to_string()
}

/// Handle to a working copy on disk.
///
/// Holds only the path; all state is read from git on demand.
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
}

/// Snapshot of a working copy, for status output and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryState {
    /// Working copy path
    pub path: PathBuf,
    /// Remote the working copy must point at
    pub expected_url: String,
    /// Whether `.git` metadata exists at the path
    pub is_git_repo: bool,
    /// Current `origin` URL, if any
    pub remote_url: Option<String>,
    /// Tags present locally
    pub fetched_refs: BTreeSet<String>,
}

impl RepositoryState {
    /// Whether the working copy may be used without repair.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_git_repo
            && self.remote_url.as_deref().map(canonical_url) == Some(canonical_url(&self.expected_url))
    }
}

impl GitRepo {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether repository metadata exists at the path.
    #[must_use]
    pub fn is_git_repo(&self) -> bool {
        self.path.join(".git").exists()
    }

    /// Clone `url` into `target`, streaming git's progress output.
    pub async fn clone(url: &str, target: impl AsRef<Path>) -> Result<Self> {
        let target = target.as_ref();
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tracing::info!(target: "git", "Cloning {} into {}", url, target.display());
        GitCommand::clone(url, target).inherit_stdio().execute_success().await?;
        Ok(Self::new(target))
    }

    /// Open the working copy at `path`, cloning `url` when nothing is there.
    ///
    /// When `path` exists but is not a repository the operator must approve
    /// deleting it; declining fails with [`SpuError::NotARepository`] and leaves
    /// the directory untouched.
    pub async fn open_or_clone(path: &Path, url: &str, prompter: &dyn Prompter) -> Result<Self> {
        let repo = Self::new(path);
        if repo.is_git_repo() {
            return Ok(repo);
        }
        if path.exists() {
            let question = format!(
                "{} exists but is not a git repository. Delete it and clone {url}?",
                path.display()
            );
            if !prompter.confirm(&question, false)? {
                return Err(SpuError::NotARepository {
                    path: path.display().to_string(),
                }
                .into());
            }
            tracing::warn!(target: "git", "Removing non-repository directory {}", path.display());
            tokio::fs::remove_dir_all(path)
                .await
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Self::clone(url, path).await
    }

    /// Current `origin` URL, or `None` when no such remote exists.
    pub async fn remote_url(&self) -> Result<Option<String>> {
        let output = GitCommand::remote_url().current_dir(&self.path).output().await?;
        if output.success {
            Ok(Some(output.stdout.trim().to_string()))
        } else {
            Ok(None)
        }
    }

    /// Point `origin` at `expected_url`, adding or re-pointing it as needed.
    ///
    /// A second call with the same URL changes nothing.
    pub async fn ensure_remote(&self, expected_url: &str) -> Result<()> {
        let expected = canonical_url(expected_url);
        match self.remote_url().await? {
            Some(actual) if canonical_url(&actual) == expected => {
                tracing::debug!(target: "git", "origin already points at {}", actual);
                return Ok(());
            }
            Some(actual) => {
                tracing::info!(target: "git", "Re-pointing origin from {} to {}", actual, expected_url);
                GitCommand::set_remote_url(expected_url).current_dir(&self.path).execute_success().await?;
            }
            None => {
                tracing::info!(target: "git", "Adding origin {}", expected_url);
                GitCommand::add_remote(expected_url).current_dir(&self.path).execute_success().await?;
            }
        }

        let actual = self.remote_url().await?.unwrap_or_default();
        if canonical_url(&actual) != expected {
            return Err(SpuError::RemoteMismatch {
                path: self.path.display().to_string(),
                expected,
                actual,
            }
            .into());
        }
        Ok(())
    }

    /// Fetch all refs, tags and submodules.
    ///
    /// If git refuses because an upstream tag moved, local tags are force-updated
    /// from origin exactly once. Any other failure, or a failed retry, is returned
    /// as [`SpuError::FetchFailed`].
    pub async fn fetch_all(&self) -> Result<()> {
        let spinner = spinner_with_message(format!("Fetching {}", self.path.display()));
        let result = self.fetch_all_inner().await;
        spinner.finish_and_clear();
        result
    }

    async fn fetch_all_inner(&self) -> Result<()> {
        let output = GitCommand::fetch_all().current_dir(&self.path).output().await?;
        if output.success {
            return Ok(());
        }

        if !output.stderr.contains(TAG_CLOBBER_MARKER) {
            return Err(SpuError::FetchFailed {
                reason: output.stderr,
                retried: false,
            }
            .into());
        }

        tracing::warn!(target: "git", "Upstream tags moved, forcing local tags to match origin");
        let retry = GitCommand::fetch_tags_force().current_dir(&self.path).output().await?;
        if retry.success {
            Ok(())
        } else {
            Err(SpuError::FetchFailed {
                reason: retry.stderr,
                retried: true,
            }
            .into())
        }
    }

    /// Whether `reference` exists locally, as a tag or under its bare name.
    pub async fn ref_exists(&self, reference: &str) -> bool {
        for spec in [format!("refs/tags/{reference}"), reference.to_string()] {
            let found = GitCommand::verify_ref(&spec)
                .current_dir(&self.path)
                .output()
                .await
                .is_ok_and(|o| o.success);
            if found {
                return true;
            }
        }
        false
    }

    /// First candidate that exists locally.
    ///
    /// Fails with [`SpuError::RefNotFound`] listing every candidate and the local tags.
    pub async fn resolve_ref(&self, candidates: &[String]) -> Result<String> {
        for candidate in candidates {
            if self.ref_exists(candidate).await {
                tracing::debug!(target: "git", "Resolved ref {}", candidate);
                return Ok(candidate.clone());
            }
        }
        let available_tags = self.list_tags().await.unwrap_or_default();
        Err(SpuError::RefNotFound {
            candidates: candidates.to_vec(),
            available_tags,
        }
        .into())
    }

    /// Force a detached checkout of `reference`, preferring the tag namespace.
    ///
    /// When neither spelling can be checked out HEAD is left where it was.
    pub async fn checkout(&self, reference: &str) -> Result<()> {
        let tag_ref = format!("refs/tags/{reference}");
        let first = GitCommand::checkout_detached(&tag_ref).current_dir(&self.path).output().await?;
        if first.success {
            tracing::info!(target: "git", "Checked out {}", tag_ref);
            return Ok(());
        }

        let second = GitCommand::checkout_detached(reference).current_dir(&self.path).output().await?;
        if second.success {
            tracing::info!(target: "git", "Checked out {}", reference);
            return Ok(());
        }

        Err(SpuError::GitCommandError {
            operation: format!("checkout {reference}"),
            stderr: second.stderr,
        }
        .into())
    }

    pub async fn update_submodules(&self) -> Result<()> {
        GitCommand::submodule_update().current_dir(&self.path).execute_success().await
    }

    /// Local tags, sorted by git.
    pub async fn list_tags(&self) -> Result<Vec<String>> {
        let stdout = GitCommand::list_tags().current_dir(&self.path).execute_stdout().await?;
        Ok(stdout.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect())
    }

    pub async fn current_commit(&self) -> Result<String> {
        GitCommand::current_commit().current_dir(&self.path).execute_stdout().await
    }

    /// Read the working copy's state without changing anything.
    pub async fn state(&self, expected_url: &str) -> RepositoryState {
        let is_git_repo = self.is_git_repo();
        let (remote_url, fetched_refs) = if is_git_repo {
            (
                self.remote_url().await.ok().flatten(),
                self.list_tags().await.unwrap_or_default().into_iter().collect(),
            )
        } else {
            (None, BTreeSet::new())
        };
        RepositoryState {
            path: self.path.clone(),
            expected_url: expected_url.to_string(),
            is_git_repo,
            remote_url,
            fetched_refs,
        }
    }
}
