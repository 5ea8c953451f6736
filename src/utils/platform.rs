//! Host helpers: home directory, path expansion and executable lookup.
//!
//! SPU targets Linux node hosts, but nothing here depends on Linux beyond the
//! executable names.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Returns the home directory of the current user.
pub fn get_home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine home directory.\n\nCheck that the HOME environment variable is set"
        )
    })
}

/// Name of the git executable.
#[must_use]
pub const fn get_git_command() -> &'static str {
    if cfg!(windows) { "git.exe" } else { "git" }
}

/// Expand `~` and `$VAR`/`${VAR}` references in a configured path.
///
/// # Examples
///
/// ```rust,no_run
/// use spu_cli::utils::platform::resolve_path;
///
/// let backup = resolve_path("~/backup/cardano").unwrap();
/// assert!(backup.is_absolute());
/// ```
pub fn resolve_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| {
        format!(
            "Failed to expand path: {path}\n\n\
            Use '~/' for the home directory and $VAR or ${{VAR}} for environment variables"
        )
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Whether `cmd` can be found on `PATH`.
#[must_use]
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Locate an executable, preferring the configured install directory over `PATH`.
#[must_use]
pub fn find_executable(name: &str, install_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = install_dir {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    which::which(name).ok()
}
