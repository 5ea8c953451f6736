//! Shared helpers: subprocess execution, downloads, file installation and progress output.
//!
//! - [`command`] - builder for external tools (cabal, make, apt, systemctl)
//! - [`download`] - HTTP client and streaming downloads
//! - [`fs`] - atomic writes and binary installation
//! - [`platform`] - home directory, path expansion, executable lookup
//! - [`progress`] - bars and spinners

pub mod command;
pub mod download;
pub mod fs;
pub mod platform;
pub mod progress;

pub use command::{CommandOutput, ToolCommand};
pub use fs::{atomic_write, ensure_dir, install_file, safe_write, set_mode};
pub use platform::{find_executable, get_git_command, get_home_dir, resolve_path};
pub use progress::{ProgressBar, ProgressStyle};
