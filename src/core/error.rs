//! Error handling for SPU
//!
//! Two layers, the same way every command reports failures:
//! 1. [`SpuError`], a strongly-typed enum for each failure mode of the upgrade
//!    machinery, grouped into an [`ErrorClass`] that decides whether a run may continue.
//! 2. [`ErrorContext`], which wraps an error with details and an actionable suggestion
//!    for the operator.
//!
//! Call sites work with `anyhow::Result` and attach `.context(...)` describing the
//! step; [`user_friendly_error`] digs the typed error back out of the chain when the
//! CLI reports the failure.
//!
//! # Examples
//!
//! ```rust,no_run
//! use spu_cli::core::{ErrorClass, SpuError, user_friendly_error};
//!
//! let err = SpuError::ProcessHeld { pids: vec![4242] };
//! assert_eq!(err.class(), ErrorClass::ProcessHeld);
//!
//! let ctx = user_friendly_error(anyhow::Error::from(err));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Failure classes of an upgrade run.
///
/// Only [`ErrorClass::NotFound`] and [`ErrorClass::BackupFailure`] are survivable;
/// every other class aborts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Remote metadata or a download could not be reached.
    Unavailable,
    /// A local artifact is absent.
    NotFound,
    /// Local state disagrees with what is expected (remote URL, non-repository directory).
    Conflict,
    /// A running instance survived termination.
    ProcessHeld,
    /// A toolchain, git, archive or install step failed.
    BuildFailure,
    /// A best-effort backup could not be taken.
    BackupFailure,
    /// The operator declined a confirmation.
    Aborted,
    /// Configuration is missing or invalid.
    Config,
}

impl ErrorClass {
    /// Whether an error of this class must stop the current run.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::NotFound | Self::BackupFailure)
    }
}

/// The main error type for SPU operations.
#[derive(Error, Debug, Clone)]
pub enum SpuError {
    /// Release metadata endpoint unreachable or unparsable.
    #[error("Release information for {artifact} is unavailable: {reason}")]
    ReleaseUnavailable {
        /// Artifact family being checked
        artifact: String,
        /// Transport or parse failure
        reason: String,
    },

    /// Download of an archive or file failed.
    #[error("Download failed: {url}")]
    DownloadFailed {
        /// URL being fetched
        url: String,
        /// Why the download failed
        reason: String,
    },

    /// The executable is not installed or its version output could not be parsed.
    #[error("Executable '{name}' not found or did not report a version")]
    ExecutableNotFound {
        /// Executable name
        name: String,
    },

    /// A binary expected in a downloaded or built tree is missing.
    #[error("Binary '{name}' not found in {location}")]
    BinaryNotFound {
        /// Binary name
        name: String,
        /// Where it was searched for
        location: String,
    },

    /// Git is not installed.
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// A git command returned non-zero.
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git subcommand
        operation: String,
        /// Captured stderr
        stderr: String,
    },

    /// Clone failed.
    #[error("Failed to clone repository: {url}")]
    GitCloneFailed {
        /// Repository URL
        url: String,
        /// Captured stderr
        reason: String,
    },

    /// The working copy points at the wrong remote and could not be repaired.
    #[error("Repository at {path} points to {actual}, expected {expected}")]
    RemoteMismatch {
        /// Working copy path
        path: String,
        /// Canonical expected URL
        expected: String,
        /// URL found after the repair attempt
        actual: String,
    },

    /// The working-copy path exists but holds no repository metadata.
    #[error("Directory {path} exists but is not a git repository")]
    NotARepository {
        /// Offending path
        path: String,
    },

    /// Fetch failed, possibly after the forced tag retry.
    #[error("Fetching refs failed{}", if *retried { " after forced tag retry" } else { "" })]
    FetchFailed {
        /// Captured stderr of the last attempt
        reason: String,
        /// Whether the clobber retry was attempted
        retried: bool,
    },

    /// None of the candidate refs exist in the working copy.
    #[error("No ref matching {} found", candidates.join(" or "))]
    RefNotFound {
        /// Candidates tried, most preferred first
        candidates: Vec<String>,
        /// All local tags, for diagnosis
        available_tags: Vec<String>,
    },

    /// A running instance survived the termination timeout.
    #[error("Processes still running after termination timeout: {pids:?}")]
    ProcessHeld {
        /// Pids that are still alive
        pids: Vec<u32>,
    },

    /// A toolchain step exited non-zero.
    #[error("Build step '{step}' failed")]
    BuildFailed {
        /// Command line of the failing step
        step: String,
        /// Captured output or exit status
        reason: String,
    },

    /// Extracting a downloaded archive failed.
    #[error("Failed to extract archive {path}")]
    ArchiveFailed {
        /// Archive path
        path: String,
        /// Underlying error
        reason: String,
    },

    /// Copying a binary into its install directory failed.
    #[error("Failed to install {path}")]
    InstallFailed {
        /// Destination path
        path: String,
        /// Underlying error
        reason: String,
    },

    /// A backup copy could not be written.
    #[error("Backup of {path} failed")]
    BackupFailed {
        /// Source path
        path: String,
        /// Underlying error
        reason: String,
    },

    /// Native library install or reinstall failed.
    #[error("Installing library '{name}' failed at '{step}'")]
    LibraryInstallFailed {
        /// Library name
        name: String,
        /// Step that failed
        step: String,
        /// Underlying error
        reason: String,
    },

    /// The operator declined a confirmation that the run depends on.
    #[error("Aborted at {step}: {reason}")]
    Aborted {
        /// Step awaiting confirmation
        step: String,
        /// What was declined
        reason: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// What is wrong
        message: String,
    },
}

impl SpuError {
    /// Classify this error according to the upgrade failure taxonomy.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::ReleaseUnavailable { .. } | Self::DownloadFailed { .. } => ErrorClass::Unavailable,
            Self::ExecutableNotFound { .. } | Self::BinaryNotFound { .. } => ErrorClass::NotFound,
            Self::RemoteMismatch { .. } | Self::NotARepository { .. } => ErrorClass::Conflict,
            Self::ProcessHeld { .. } => ErrorClass::ProcessHeld,
            Self::GitNotFound
            | Self::GitCommandError { .. }
            | Self::GitCloneFailed { .. }
            | Self::FetchFailed { .. }
            | Self::RefNotFound { .. }
            | Self::BuildFailed { .. }
            | Self::ArchiveFailed { .. }
            | Self::InstallFailed { .. }
            | Self::LibraryInstallFailed { .. } => ErrorClass::BuildFailure,
            Self::BackupFailed { .. } => ErrorClass::BackupFailure,
            Self::Aborted { .. } => ErrorClass::Aborted,
            Self::ConfigError { .. } => ErrorClass::Config,
        }
    }
}

/// Error wrapper with operator-facing details and a suggestion.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: SpuError,
    /// Outer context messages, outermost first (e.g. the failing step)
    pub context: Vec<String>,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new context without suggestion or details.
    #[must_use]
    pub const fn new(error: SpuError) -> Self {
        Self {
            error,
            context: Vec::new(),
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        for ctx in &self.context {
            eprintln!("{}: {}", "while".dimmed(), ctx);
        }
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ctx in &self.context {
            writeln!(f, "While: {ctx}")?;
        }
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] suitable for the terminal.
///
/// The chain is searched for a [`SpuError`]; messages attached above it become the
/// `context` lines so the operator sees which step failed.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let mut outer = Vec::new();
    for cause in error.chain() {
        if let Some(spu_error) = cause.downcast_ref::<SpuError>() {
            let mut ctx = create_error_context(spu_error.clone());
            ctx.context = outer;
            return ctx;
        }
        outer.push(cause.to_string());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ErrorContext::new(SpuError::InstallFailed {
            path: "unknown".to_string(),
            reason: io_error.to_string(),
        })
        .with_suggestion("Run with sufficient permissions or set 'use_sudo = true' in the configuration");
    }

    // Untyped errors are reported verbatim
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    let mut ctx = ErrorContext::new(SpuError::Aborted {
        step: "run".to_string(),
        reason: error.to_string(),
    });
    if !chain.is_empty() {
        ctx = ctx.with_details(chain.join("\n  caused by: "));
    }
    ctx
}

fn create_error_context(error: SpuError) -> ErrorContext {
    match &error {
        SpuError::ReleaseUnavailable { reason, .. } => {
            let reason = reason.clone();
            ErrorContext::new(error)
                .with_details(reason)
                .with_suggestion("Check network access to api.github.com; no changes were made to the host")
        }
        SpuError::DownloadFailed { reason, .. } => {
            let reason = reason.clone();
            ErrorContext::new(error)
                .with_details(reason)
                .with_suggestion("Installed binaries were not touched. Retry once the release asset is reachable")
        }
        SpuError::GitNotFound => ErrorContext::new(error)
            .with_suggestion("Install git with your package manager (e.g. 'sudo apt install git')"),
        SpuError::GitCommandError { stderr, .. } | SpuError::GitCloneFailed { reason: stderr, .. } => {
            let stderr = stderr.trim().to_string();
            ErrorContext::new(error)
                .with_details(stderr)
                .with_suggestion("Run the git command manually in the source directory for more details")
        }
        SpuError::RemoteMismatch { path, .. } => {
            let suggestion = format!("Fix the 'origin' remote of {path} or remove the directory to re-clone");
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        SpuError::NotARepository { path } => {
            let suggestion = format!("Move {path} away or approve deletion so the repository can be cloned");
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        SpuError::FetchFailed { reason, .. } => {
            let reason = reason.trim().to_string();
            ErrorContext::new(error)
                .with_details(reason)
                .with_suggestion("Run 'git fetch --all --tags --force' in the source directory and retry")
        }
        SpuError::RefNotFound {
            candidates,
            available_tags,
        } => {
            let details = format!(
                "Tried: {}\nAvailable tags ({}): {}",
                candidates.join(", "),
                available_tags.len(),
                available_tags.join(", ")
            );
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Check that the release tag has been pushed to the repository")
        }
        SpuError::ProcessHeld { pids } => {
            let details = format!("PIDs still running: {pids:?}");
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Stop the processes manually (e.g. 'kill -9 <pid>') and rerun the upgrade. No binaries were replaced")
        }
        SpuError::BuildFailed { reason, .. } | SpuError::LibraryInstallFailed { reason, .. } => {
            let reason = reason.trim().to_string();
            ErrorContext::new(error)
                .with_details(reason)
                .with_suggestion("The build tree was left in place; fix the toolchain issue and rerun")
        }
        SpuError::ArchiveFailed { reason, .. } | SpuError::InstallFailed { reason, .. } => {
            let reason = reason.clone();
            ErrorContext::new(error)
                .with_details(reason)
                .with_suggestion("Previous binaries are kept in the backup directory; restore them with 'spu node rollback'")
        }
        SpuError::BackupFailed { reason, .. } => {
            let reason = reason.clone();
            ErrorContext::new(error).with_details(reason)
        }
        SpuError::ExecutableNotFound { .. } | SpuError::BinaryNotFound { .. } => {
            ErrorContext::new(error).with_suggestion("Check the install directories in the configuration")
        }
        SpuError::Aborted { .. } => ErrorContext::new(error),
        SpuError::ConfigError { .. } => ErrorContext::new(error)
            .with_suggestion("Run 'spu config check' to validate the configuration file"),
    }
}
