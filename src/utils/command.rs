//! Builder for the external tools SPU drives: cabal, make, apt, systemctl, dpkg.
//!
//! Every invocation is awaited to completion before the caller continues. Build steps
//! run without a timeout; callers that talk to something that can hang may set one.
//! Output is captured by default; long builds use [`ToolCommand::inherit_stdio`] so
//! the operator sees compiler progress.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::SpuError;

/// Fluent builder for one external command.
///
/// # Examples
///
/// ```rust,no_run
/// use spu_cli::utils::command::ToolCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// ToolCommand::new("cabal")
///     .args(["build", "all"])
///     .current_dir("/home/cardano/git/cardano-node")
///     .inherit_stdio()
///     .execute_success()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    capture_output: bool,
    env_vars: Vec<(String, String)>,
    timeout_duration: Option<Duration>,
    context: Option<String>,
}

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Standard output (empty when stdio was inherited)
    pub stdout: String,
    /// Standard error (empty when stdio was inherited)
    pub stderr: String,
    /// Whether the process exited with status 0
    pub success: bool,
    /// Exit code, if the process was not killed by a signal
    pub code: Option<i32>,
}

impl ToolCommand {
    /// Start building a command for `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            capture_output: true,
            env_vars: Vec::new(),
            timeout_duration: None,
            context: None,
        }
    }

    /// Build `program` prefixed with `sudo` when `privileged` is set.
    pub fn privileged(program: impl Into<String>, privileged: bool) -> Self {
        if privileged {
            Self::new("sudo").arg(program)
        } else {
            Self::new(program)
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run in `dir`.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Let the child write straight to the terminal.
    pub const fn inherit_stdio(mut self) -> Self {
        self.capture_output = false;
        self
    }

    /// Bound the wait for completion.
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Tag log lines with an identifier (e.g. a library name).
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The command line as the operator would type it.
    #[must_use]
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    /// Run the command and return its output whatever the exit status.
    ///
    /// Fails only if the process cannot be spawned or the timeout expires.
    pub async fn output(self) -> Result<CommandOutput> {
        let line = self.display();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }
        // A timed-out child is killed rather than left running
        cmd.kill_on_drop(self.timeout_duration.is_some());
        if self.capture_output {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        match &self.context {
            Some(ctx) => tracing::debug!(target: "cmd", "({}) Executing: {}", ctx, line),
            None => tracing::debug!(target: "cmd", "Executing: {}", line),
        }

        let start = std::time::Instant::now();
        let output_future = cmd.output();
        let output = if let Some(duration) = self.timeout_duration {
            match timeout(duration, output_future).await {
                Ok(result) => result.with_context(|| format!("Failed to execute {line}"))?,
                Err(_) => {
                    tracing::warn!(target: "cmd", "Command timed out after {}s: {}", duration.as_secs(), line);
                    anyhow::bail!("Command timed out after {} seconds: {line}", duration.as_secs());
                }
            }
        } else {
            output_future.await.with_context(|| format!("Failed to execute {line}"))?
        };

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(target: "cmd::perf", "{} took {:.2}s", self.program, elapsed.as_secs_f64());
        }

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        };
        if !result.success {
            tracing::debug!(target: "cmd", "Command failed with exit code {:?}: {}", result.code, line);
            if !result.stderr.is_empty() {
                tracing::debug!(target: "cmd", "stderr: {}", result.stderr.trim());
            }
        }
        Ok(result)
    }

    /// Run the command and fail with [`SpuError::BuildFailed`] on a non-zero exit.
    pub async fn execute(self) -> Result<CommandOutput> {
        let line = self.display();
        let output = self.output().await?;
        if !output.success {
            let reason = if output.stderr.trim().is_empty() {
                format!("exited with status {}", output.code.map_or_else(|| "signal".to_string(), |c| c.to_string()))
            } else {
                output.stderr.clone()
            };
            return Err(SpuError::BuildFailed {
                step: line,
                reason,
            }
            .into());
        }
        Ok(output)
    }

    /// Run and return trimmed stdout.
    pub async fn execute_stdout(self) -> Result<String> {
        Ok(self.execute().await?.stdout.trim().to_string())
    }

    /// Run and discard output.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }

    /// Whether the command ran and exited with status 0.
    pub async fn succeeds(self) -> bool {
        matches!(self.output().await, Ok(output) if output.success)
    }
}
