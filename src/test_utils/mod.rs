//! Test utilities for SPU
//!
//! Shared by unit tests and the integration suite (through the `test-utils`
//! feature): logging setup, git fixtures, scripted prompts and fake executables.

pub mod git_helper;

pub use git_helper::{TestGit, upstream_with_tags};

use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=git=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// Write an executable shell script named `name` into `dir`.
///
/// Used to stand in for `cardano-node`, `cncli` and friends.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::create_dir_all(dir).expect("create script dir");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod script");
    }
    path
}

/// A fake `cardano-node` that reports `version` the way the real one does.
pub fn fake_node_binary(dir: &Path, version: &str) -> PathBuf {
    let path = dir.join("cardano-node");
    std::fs::create_dir_all(dir).expect("create script dir");
    std::fs::write(&path, node_version_script(version)).expect("write script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod script");
    }
    path
}

/// Script text answering `version` the way `cardano-node` does.
pub fn node_version_script(version: &str) -> String {
    format!(
        "#!/bin/sh\nif [ \"$1\" = \"version\" ]; then\n  echo \"cardano-node {version} - linux-x86_64 - ghc-9.6\"\n  echo \"git rev 0000000000000000000000000000000000000000\"\nfi\n"
    )
}

/// Build a `.tar.gz` whose entries are `(path, contents)` pairs, all mode 755.
pub fn tar_gz(entries: &[(&str, &str)]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, path, contents.as_bytes()).expect("append tar entry");
    }
    builder.into_inner().expect("finish tar").finish().expect("finish gzip")
}

/// Start `sleep 30` under a unique executable name, returning the name and child.
///
/// With `ignore_term` the process ignores `SIGTERM`. Returns once the process
/// table shows the new name, so signal handling is already in place.
pub fn spawn_named_sleeper(dir: &Path, tag: &str, ignore_term: bool) -> (String, std::process::Child) {
    let name = format!("spu{tag}{}", std::process::id() % 100_000);
    let exe = dir.join(&name);
    let sleep = which::which("sleep").expect("sleep on PATH");
    std::fs::copy(sleep, &exe).expect("copy sleep");

    let child = if ignore_term {
        std::process::Command::new("sh")
            .args(["-c", &format!("trap '' TERM; exec {} 30", exe.display())])
            .spawn()
            .expect("spawn sleeper")
    } else {
        std::process::Command::new(&exe).arg("30").spawn().expect("spawn sleeper")
    };

    let comm = PathBuf::from(format!("/proc/{}/comm", child.id()));
    for _ in 0..100 {
        if std::fs::read_to_string(&comm).is_ok_and(|c| c.trim() == name) {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(20));
    }
    (name, child)
}
