//! Git test helper utilities
//!
//! Builds throwaway repositories with tags so repository sync can be exercised
//! against real git instead of a network remote.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Git command wrapper for tests.
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    fn run_git_command(&self, args: &[&str], action: &str) -> Result<std::process::Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| action.to_string())?;

        if !output.status.success() {
            bail!("{} failed: {}", action, String::from_utf8_lossy(&output.stderr));
        }

        Ok(output)
    }

    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// Initialize a repository with a test identity configured.
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.repo_path)?;
        self.run_git_command(&["init", "-q"], "Failed to initialize git repository")?;
        self.config_user()
    }

    pub fn config_user(&self) -> Result<()> {
        self.run_git_command(&["config", "user.email", "test@spu.example"], "Failed to configure git user email")?;
        self.run_git_command(&["config", "user.name", "Test Operator"], "Failed to configure git user name")?;
        self.run_git_command(&["config", "commit.gpgsign", "false"], "Failed to disable commit signing")?;
        self.run_git_command(&["config", "tag.gpgsign", "false"], "Failed to disable tag signing")?;
        Ok(())
    }

    /// Write `content` to `file` and commit it.
    pub fn commit_file(&self, file: &str, content: &str, message: &str) -> Result<String> {
        let path = self.repo_path.join(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        self.run_git_command(&["add", "."], "Failed to add files to git")?;
        self.run_git_command(&["commit", "-q", "-m", message], "Failed to create git commit")?;
        self.rev_parse_head()
    }

    pub fn tag(&self, tag_name: &str) -> Result<()> {
        self.run_git_command(&["tag", tag_name], &format!("Failed to create tag: {tag_name}"))?;
        Ok(())
    }

    /// Move an existing tag to HEAD.
    pub fn retag(&self, tag_name: &str) -> Result<()> {
        self.run_git_command(&["tag", "-f", tag_name], &format!("Failed to move tag: {tag_name}"))?;
        Ok(())
    }

    pub fn remote_add(&self, name: &str, url: &str) -> Result<()> {
        self.run_git_command(&["remote", "add", name, url], &format!("Failed to add remote: {name}"))?;
        Ok(())
    }

    pub fn config(&self, key: &str, value: &str) -> Result<()> {
        self.run_git_command(&["config", key, value], &format!("Failed to set {key}"))?;
        Ok(())
    }

    pub fn rev_parse_head(&self) -> Result<String> {
        let output = self.run_git_command(&["rev-parse", "HEAD"], "Failed to get current commit SHA")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Commit a tag points at.
    pub fn rev_parse(&self, reference: &str) -> Result<String> {
        let spec = format!("{reference}^{{commit}}");
        let output = self.run_git_command(&["rev-parse", &spec], &format!("Failed to resolve {reference}"))?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn remote_url(&self) -> Result<String> {
        let output = self.run_git_command(&["remote", "get-url", "origin"], "Failed to read origin")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}

/// Create an upstream repository at `path` with one commit per tag.
///
/// Returns the helper for further mutation (moving tags, adding commits).
pub fn upstream_with_tags(path: &Path, tags: &[&str]) -> Result<TestGit> {
    let git = TestGit::new(path);
    git.init()?;
    git.commit_file("README.md", "node sources\n", "initial")?;
    for tag in tags {
        git.commit_file("VERSION", tag, &format!("release {tag}"))?;
        git.tag(tag)?;
    }
    Ok(git)
}
