//! Finding and stopping running instances of an executable.
//!
//! A binary that is being replaced must not be running. [`ProcessGuard`] scans
//! the process table for matches, and on request sends `SIGTERM` and waits a
//! bounded time for every pid to go away. It never escalates to `SIGKILL`; a
//! survivor is reported and the caller decides what to do.
//!
//! A pid counts as terminated only when a later liveness check fails. Zombies
//! are dead for this purpose: they hold no file open and no port bound.

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Outcome of [`ProcessGuard::terminate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminationReport {
    /// Pids confirmed gone
    pub terminated: BTreeSet<u32>,
    /// Pids still alive when the timeout elapsed
    pub still_running: BTreeSet<u32>,
}

impl TerminationReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.still_running.is_empty()
    }
}

/// Scans a `/proc`-style process table and signals matches.
#[derive(Debug, Clone)]
pub struct ProcessGuard {
    proc_root: PathBuf,
    poll_interval: Duration,
}

impl Default for ProcessGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessGuard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Read the process table from `root` instead of `/proc`.
    #[must_use]
    pub fn with_proc_root(mut self, root: impl AsRef<Path>) -> Self {
        self.proc_root = root.as_ref().to_path_buf();
        self
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Pids whose command name or `argv[0]` basename contains `name`.
    ///
    /// The current process and zombies are never returned.
    pub fn find_running(&self, name: &str) -> Result<BTreeSet<u32>> {
        let own_pid = std::process::id();
        let entries = fs::read_dir(&self.proc_root)
            .with_context(|| format!("Failed to read process table at {}", self.proc_root.display()))?;

        let mut found = BTreeSet::new();
        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            if pid == own_pid {
                continue;
            }
            // Processes may exit mid-scan; unreadable entries are skipped
            let dir = entry.path();
            if self.is_zombie_entry(&dir) {
                continue;
            }
            if process_names(&dir).iter().any(|n| n.contains(name)) {
                found.insert(pid);
            }
        }

        tracing::debug!("Processes matching '{}': {:?}", name, found);
        Ok(found)
    }

    /// Whether `pid` is alive and not a zombie.
    #[must_use]
    pub fn is_alive(&self, pid: u32) -> bool {
        let dir = self.proc_root.join(pid.to_string());
        let Ok(stat) = fs::read_to_string(dir.join("stat")) else {
            return false;
        };
        if matches!(parse_stat_state(&stat), Some('Z' | 'X' | 'x')) {
            return false;
        }
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        match kill(Pid::from_raw(raw), None) {
            Ok(()) => true,
            // Exists but belongs to someone else
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    /// Send `SIGTERM` to every pid, then poll until all exit or `timeout` elapses.
    pub async fn terminate(&self, pids: &BTreeSet<u32>, timeout: Duration) -> TerminationReport {
        for &pid in pids {
            let Ok(raw) = i32::try_from(pid) else {
                continue;
            };
            match kill(Pid::from_raw(raw), Signal::SIGTERM) {
                Ok(()) => tracing::info!("Sent SIGTERM to pid {}", pid),
                Err(Errno::ESRCH) => tracing::debug!("pid {} already gone", pid),
                Err(e) => tracing::warn!("Failed to signal pid {}: {}", pid, e),
            }
        }

        let deadline = Instant::now() + timeout;
        let mut remaining: BTreeSet<u32> = pids.clone();
        loop {
            remaining.retain(|&pid| self.is_alive(pid));
            if remaining.is_empty() || Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        let report = TerminationReport {
            terminated: pids.difference(&remaining).copied().collect(),
            still_running: remaining,
        };
        if !report.is_complete() {
            tracing::warn!("Still running after {:?}: {:?}", timeout, report.still_running);
        }
        report
    }

    fn is_zombie_entry(&self, dir: &Path) -> bool {
        fs::read_to_string(dir.join("stat"))
            .ok()
            .and_then(|s| parse_stat_state(&s))
            .is_some_and(|state| state == 'Z')
    }
}

/// `comm` and the basename of `argv[0]`, whichever are readable.
fn process_names(dir: &Path) -> Vec<String> {
    let mut names = Vec::with_capacity(2);
    if let Ok(comm) = fs::read_to_string(dir.join("comm")) {
        names.push(comm.trim().to_string());
    }
    if let Ok(cmdline) = fs::read(dir.join("cmdline"))
        && let Some(argv0) = cmdline.split(|b| *b == 0).next().filter(|a| !a.is_empty())
    {
        let argv0 = String::from_utf8_lossy(argv0);
        let base = Path::new(argv0.as_ref())
            .file_name()
            .map_or_else(|| argv0.to_string(), |n| n.to_string_lossy().into_owned());
        names.push(base);
    }
    names
}

/// State character from a `/proc/<pid>/stat` line.
///
/// The command name sits in parentheses and may itself contain spaces or
/// parentheses, so the state is read after the last `)`.
fn parse_stat_state(stat: &str) -> Option<char> {
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.trim_start().chars().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Child, Command};
    use tempfile::TempDir;

    /// Copy of `sleep` under a name no other process on the host uses.
    fn unique_sleep(dir: &Path, tag: &str) -> PathBuf {
        let sleep = which::which("sleep").unwrap();
        let name = format!("spu{tag}{}", std::process::id() % 100_000);
        let path = dir.join(name);
        fs::copy(sleep, &path).unwrap();
        path
    }

    fn name_of(path: &Path) -> String {
        path.file_name().unwrap().to_string_lossy().into_owned()
    }

    async fn wait_until_found(guard: &ProcessGuard, name: &str, pid: u32) -> BTreeSet<u32> {
        for _ in 0..50 {
            let found = guard.find_running(name).unwrap();
            if found.contains(&pid) {
                return found;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("process {name} ({pid}) never appeared");
    }

    fn fake_proc_entry(root: &Path, pid: u32, comm: &str, argv0: &str, state: char) {
        let dir = root.join(pid.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("comm"), format!("{comm}\n")).unwrap();
        fs::write(dir.join("cmdline"), format!("{argv0}\0--config\0x.json\0")).unwrap();
        fs::write(dir.join("stat"), format!("{pid} ({comm}) {state} 1 {pid} {pid} 0 -1")).unwrap();
    }

    #[test]
    fn test_parse_stat_state() {
        assert_eq!(parse_stat_state("42 (cardano-node) S 1 42 42"), Some('S'));
        assert_eq!(parse_stat_state("42 (weird) name)) Z 1 42"), Some('Z'));
        assert_eq!(parse_stat_state("garbage"), None);
    }

    #[test]
    fn test_find_running_in_fake_table() {
        let temp = TempDir::new().unwrap();
        fake_proc_entry(temp.path(), 101, "cardano-node", "/usr/local/bin/cardano-node", 'S');
        fake_proc_entry(temp.path(), 102, "bash", "/bin/bash", 'S');
        // Truncated comm, full name only in argv[0]
        fake_proc_entry(temp.path(), 103, "node-wrapper", "/opt/cardano-node", 'R');
        fake_proc_entry(temp.path(), 104, "cardano-node", "cardano-node", 'Z');
        fs::create_dir_all(temp.path().join("self")).unwrap();
        fs::create_dir_all(temp.path().join(std::process::id().to_string())).unwrap();
        fs::write(temp.path().join(std::process::id().to_string()).join("comm"), "cardano-node\n").unwrap();

        let guard = ProcessGuard::new().with_proc_root(temp.path());
        let found = guard.find_running("cardano-node").unwrap();
        assert_eq!(found, BTreeSet::from([101, 103]));
        assert!(guard.find_running("cncli").unwrap().is_empty());
    }

    #[test]
    fn test_missing_proc_root_is_an_error() {
        let temp = TempDir::new().unwrap();
        let guard = ProcessGuard::new().with_proc_root(temp.path().join("nope"));
        assert!(guard.find_running("cardano-node").is_err());
    }

    #[tokio::test]
    async fn test_terminates_single_process() {
        let temp = TempDir::new().unwrap();
        let exe = unique_sleep(temp.path(), "t");
        let mut child: Child = Command::new(&exe).arg("30").spawn().unwrap();
        let pid = child.id();

        let guard = ProcessGuard::new().with_poll_interval(Duration::from_millis(20));
        let found = wait_until_found(&guard, &name_of(&exe), pid).await;
        assert_eq!(found, BTreeSet::from([pid]));

        let report = guard.terminate(&found, Duration::from_secs(5)).await;
        assert_eq!(report.terminated, BTreeSet::from([pid]));
        assert!(report.is_complete());

        child.wait().unwrap();
    }

    #[tokio::test]
    async fn test_survivor_is_reported() {
        let mut child = Command::new("sh").args(["-c", "trap '' TERM; exec sleep 30"]).spawn().unwrap();
        let pid = child.id();
        // Let the shell install its trap before signalling
        tokio::time::sleep(Duration::from_millis(300)).await;

        let guard = ProcessGuard::new().with_poll_interval(Duration::from_millis(20));
        let report = guard.terminate(&BTreeSet::from([pid]), Duration::from_millis(400)).await;
        assert!(report.terminated.is_empty());
        assert_eq!(report.still_running, BTreeSet::from([pid]));
        assert!(guard.is_alive(pid));

        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[tokio::test]
    async fn test_zombie_is_not_alive() {
        let temp = TempDir::new().unwrap();
        let exe = unique_sleep(temp.path(), "z");
        let mut child = Command::new(&exe).arg("0").spawn().unwrap();
        let pid = child.id();

        // Exits immediately and stays a zombie until reaped
        let guard = ProcessGuard::new();
        for _ in 0..50 {
            if !guard.is_alive(pid) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!guard.is_alive(pid));
        assert!(!guard.find_running(&name_of(&exe)).unwrap().contains(&pid));

        child.wait().unwrap();
    }

    #[tokio::test]
    async fn test_already_gone_pid_counts_as_terminated() {
        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        let report = ProcessGuard::new().terminate(&BTreeSet::from([pid]), Duration::from_millis(100)).await;
        assert_eq!(report.terminated, BTreeSet::from([pid]));
    }
}
