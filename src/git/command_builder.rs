//! Type-safe git command builder.
//!
//! Wraps [`ToolCommand`] so git invocations get the same logging and capture
//! behavior as every other external tool, and maps failures onto the git
//! variants of [`SpuError`].

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::core::SpuError;
use crate::utils::command::{CommandOutput, ToolCommand};
use crate::utils::platform::{command_exists, get_git_command};

/// Fluent builder for one git invocation.
///
/// The working directory is passed with `-C`, so commands never depend on the
/// process's current directory.
///
/// ```rust,no_run
/// use spu_cli::git::command_builder::GitCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// let tags = GitCommand::list_tags()
///     .current_dir("/home/cardano/git/cardano-node")
///     .execute_stdout()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct GitCommand {
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    inherit_stdio: bool,
    context: Option<String>,
    clone_url: Option<String>,
}

impl GitCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run against the repository at `dir`.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Stream git's own progress output to the terminal.
    pub const fn inherit_stdio(mut self) -> Self {
        self.inherit_stdio = true;
        self
    }

    /// Tag log lines, e.g. with the library being synced.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Git subcommand, used in error reports.
    fn operation(&self) -> String {
        self.args.first().cloned().unwrap_or_else(|| "unknown".to_string())
    }

    fn to_tool_command(&self) -> ToolCommand {
        let mut cmd = ToolCommand::new(get_git_command());
        if let Some(dir) = &self.current_dir {
            cmd = cmd.arg("-C").arg(dir.display().to_string());
        }
        cmd = cmd.args(self.args.iter().cloned());
        if self.inherit_stdio {
            cmd = cmd.inherit_stdio();
        }
        if let Some(ctx) = &self.context {
            cmd = cmd.with_context(ctx.clone());
        }
        cmd
    }

    /// Run and return the output whatever the exit status.
    pub async fn output(self) -> Result<CommandOutput> {
        let operation = self.operation();
        match self.to_tool_command().output().await {
            Ok(output) => {
                if !output.stdout.trim().is_empty() {
                    tracing::trace!(target: "git", "{}", output.stdout.trim());
                }
                Ok(output)
            }
            Err(_) if !command_exists(get_git_command()) => Err(SpuError::GitNotFound.into()),
            Err(e) => Err(e.context(format!("git {operation}"))),
        }
    }

    /// Run and fail with a git error on a non-zero exit.
    pub async fn execute(self) -> Result<CommandOutput> {
        let operation = self.operation();
        let clone_url = self.clone_url.clone();
        let output = self.output().await?;
        if output.success {
            return Ok(output);
        }

        let stderr = if output.stderr.trim().is_empty() {
            output.stdout.clone()
        } else {
            output.stderr.clone()
        };
        let error = match clone_url {
            Some(url) => SpuError::GitCloneFailed {
                url,
                reason: stderr,
            },
            None => SpuError::GitCommandError {
                operation,
                stderr,
            },
        };
        Err(error.into())
    }

    /// Run and return trimmed stdout.
    pub async fn execute_stdout(self) -> Result<String> {
        Ok(self.execute().await?.stdout.trim().to_string())
    }

    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

// Builders for the operations repository sync needs

impl GitCommand {
    /// Full clone including submodules.
    pub fn clone(url: &str, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new().args([
            "clone".to_string(),
            "--recurse-submodules".to_string(),
            url.to_string(),
            target.as_ref().display().to_string(),
        ]);
        cmd.clone_url = Some(url.to_string());
        cmd
    }

    /// Fetch every remote's refs and tags, pruning deleted branches.
    pub fn fetch_all() -> Self {
        Self::new().args(["fetch", "--all", "--tags", "--prune", "--recurse-submodules"])
    }

    /// Overwrite local tags with origin's. Only used after a clobber failure.
    pub fn fetch_tags_force() -> Self {
        Self::new().args(["fetch", "origin", "--tags", "--force"])
    }

    /// Detached checkout discarding local modifications.
    pub fn checkout_detached(ref_name: &str) -> Self {
        Self::new().args(["checkout", "--force", "--detach", ref_name])
    }

    /// Quiet local existence check; exits non-zero without output when absent.
    pub fn verify_ref(ref_name: &str) -> Self {
        Self::new().args(["rev-parse", "--verify", "--quiet", ref_name])
    }

    pub fn list_tags() -> Self {
        Self::new().args(["tag", "-l"])
    }

    pub fn current_commit() -> Self {
        Self::new().args(["rev-parse", "HEAD"])
    }

    pub fn remote_url() -> Self {
        Self::new().args(["remote", "get-url", "origin"])
    }

    pub fn add_remote(url: &str) -> Self {
        Self::new().args(["remote", "add", "origin", url])
    }

    pub fn set_remote_url(url: &str) -> Self {
        Self::new().args(["remote", "set-url", "origin", url])
    }

    pub fn submodule_update() -> Self {
        Self::new().args(["submodule", "update", "--init", "--recursive"])
    }
}
