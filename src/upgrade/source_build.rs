//! Build `cardano-node` and `cardano-cli` from a local working copy.
//!
//! The working copy is synced to the release tag, then built with cabal. A
//! failing step aborts the run and leaves the build tree as it was, so the
//! operator can inspect it and the next run resumes incrementally.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::SourceSpec;
use super::strategy::BuiltArtifacts;
use crate::core::SpuError;
use crate::git::GitRepo;
use crate::libs::packages::PackageManager;
use crate::prompt::Prompter;
use crate::utils::command::ToolCommand;

/// cabal invocations, in order.
const CABAL_STEPS: &[&[&str]] = &[
    &["update"],
    &["configure", "-O0"],
    &["build", "all"],
    &["build", "cardano-cli"],
];

/// Script in the cardano-node tree that prints the path of a built executable.
const BIN_PATH_SCRIPT: &str = "scripts/bin-path.sh";

#[derive(Debug, Clone)]
pub struct SourceBuildInstall {
    source: SourceSpec,
    packages: PackageManager,
    cabal: String,
}

impl SourceBuildInstall {
    pub fn new(source: SourceSpec, packages: PackageManager) -> Self {
        Self {
            source,
            packages,
            cabal: "cabal".to_string(),
        }
    }

    /// Use another `cabal` executable.
    #[must_use]
    pub fn with_cabal(mut self, cabal: impl Into<String>) -> Self {
        self.cabal = cabal.into();
        self
    }

    /// Sync the working copy to the first existing candidate ref and build `names`.
    pub async fn run(&self, candidates: &[String], names: &[String], prompter: &dyn Prompter) -> Result<BuiltArtifacts> {
        let repo = self.sync(candidates, prompter).await?;
        let dir = repo.path();

        self.remove_conflicting_packages().await?;

        for step in CABAL_STEPS {
            ToolCommand::new(&self.cabal)
                .args(step.iter().copied())
                .current_dir(dir)
                .inherit_stdio()
                .with_context("cardano-node")
                .execute_success()
                .await?;
        }

        let mut binaries = BTreeMap::new();
        for name in names {
            binaries.insert(name.clone(), self.bin_path(dir, name).await?);
        }
        Ok(BuiltArtifacts::new(binaries, None))
    }

    async fn remove_conflicting_packages(&self) -> Result<()> {
        for package in &self.source.conflicting_packages {
            if self.packages.is_installed(package).await {
                tracing::warn!("Removing conflicting package {}", package);
                self.packages.remove(package).await?;
            }
        }
        Ok(())
    }

    /// Clone or repair the working copy and check out the release.
    async fn sync(&self, candidates: &[String], prompter: &dyn Prompter) -> Result<GitRepo> {
        let repo = GitRepo::open_or_clone(&self.source.source_dir, &self.source.repo_url, prompter).await?;
        repo.ensure_remote(&self.source.repo_url).await?;
        repo.fetch_all().await?;
        let reference = repo.resolve_ref(candidates).await?;
        repo.checkout(&reference).await?;
        repo.update_submodules().await?;
        Ok(repo)
    }

    /// Ask the tree where cabal put `name`.
    async fn bin_path(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        let stdout = ToolCommand::new("bash").args([BIN_PATH_SCRIPT, name]).current_dir(dir).execute_stdout().await?;
        let path = stdout.lines().last().map(str::trim).unwrap_or_default();
        if path.is_empty() {
            return Err(SpuError::BinaryNotFound {
                name: name.to_string(),
                location: dir.display().to_string(),
            }
            .into());
        }

        let path = PathBuf::from(path);
        let path = if path.is_absolute() { path } else { dir.join(path) };
        if !path.is_file() {
            return Err(SpuError::BinaryNotFound {
                name: name.to_string(),
                location: path.display().to_string(),
            }
            .into());
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompter;
    use crate::test_utils::{TestGit, write_script};
    use tempfile::TempDir;

    const BIN_PATH_BODY: &str = "#!/usr/bin/env bash\necho \"dist-newstyle/build/$1/$1\"\n";

    /// Upstream cardano-node stand-in with a bin-path script and the given tags.
    fn upstream(root: &Path, tags: &[&str]) -> TestGit {
        let git = TestGit::new(root.join("upstream"));
        git.init().unwrap();
        git.commit_file(BIN_PATH_SCRIPT, BIN_PATH_BODY, "bin-path").unwrap();
        for tag in tags {
            git.commit_file("VERSION", tag, &format!("release {tag}")).unwrap();
            git.tag(tag).unwrap();
        }
        git
    }

    /// cabal stand-in: logs its arguments and "builds" on `build all`.
    fn fake_cabal(root: &Path) -> (PathBuf, PathBuf) {
        let log = root.join("cabal.log");
        let script = write_script(
            root,
            "cabal",
            &format!(
                "echo \"$@\" >> {log}\nif [ \"$1 $2\" = \"build all\" ]; then\n  for b in cardano-node cardano-cli; do\n    mkdir -p dist-newstyle/build/$b\n    echo \"built from $(cat VERSION)\" > dist-newstyle/build/$b/$b\n  done\nfi",
                log = log.display()
            ),
        );
        (script, log)
    }

    fn build_for(root: &Path, upstream: &TestGit, cabal: &Path) -> SourceBuildInstall {
        let spec = SourceSpec {
            repo_url: upstream.repo_path().display().to_string(),
            source_dir: root.join("git").join("cardano-node"),
            conflicting_packages: Vec::new(),
        };
        SourceBuildInstall::new(spec, PackageManager::new(false)).with_cabal(cabal.display().to_string())
    }

    /// Package tools that report libsodium-dev installed and log apt calls.
    fn with_libsodium_dev(install: SourceBuildInstall, root: &Path) -> (SourceBuildInstall, PathBuf) {
        let log = root.join("apt.log");
        let dpkg = write_script(root, "dpkg-query", "printf 'install ok installed|1.0.18-1'");
        let apt = write_script(root, "apt-get", &format!("echo \"$@\" >> {}", log.display()));
        let packages = PackageManager::new(false).with_programs(dpkg.display().to_string(), apt.display().to_string());
        let source = SourceSpec {
            conflicting_packages: vec!["libsodium-dev".to_string()],
            ..install.source.clone()
        };
        (SourceBuildInstall::new(source, packages).with_cabal(install.cabal.clone()), log)
    }

    #[tokio::test]
    async fn test_builds_resolved_tag() {
        let temp = TempDir::new().unwrap();
        let upstream = upstream(temp.path(), &["10.1.3", "10.1.4"]);
        let (cabal, log) = fake_cabal(temp.path());
        let install = build_for(temp.path(), &upstream, &cabal);

        let candidates = vec!["v10.1.4".to_string(), "10.1.4".to_string()];
        let names = vec!["cardano-node".to_string(), "cardano-cli".to_string()];
        let built = install.run(&candidates, &names, &ScriptedPrompter::default()).await.unwrap();

        let node = built.get("cardano-node").unwrap();
        assert_eq!(std::fs::read_to_string(node).unwrap().trim(), "built from 10.1.4");
        assert!(built.get("cardano-cli").is_ok());
        assert_eq!(
            std::fs::read_to_string(&log).unwrap(),
            "update\nconfigure -O0\nbuild all\nbuild cardano-cli\n"
        );
    }

    #[tokio::test]
    async fn test_conflicting_package_removed_before_build() {
        let temp = TempDir::new().unwrap();
        let upstream = upstream(temp.path(), &["10.1.4"]);
        let (cabal, _) = fake_cabal(temp.path());
        let (install, apt_log) = with_libsodium_dev(build_for(temp.path(), &upstream, &cabal), temp.path());

        install
            .run(&["10.1.4".to_string()], &["cardano-node".to_string()], &ScriptedPrompter::default())
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&apt_log).unwrap(), "remove -y libsodium-dev\n");
    }

    #[tokio::test]
    async fn test_declined_reclone_leaves_host_untouched() {
        let temp = TempDir::new().unwrap();
        let upstream = upstream(temp.path(), &["10.1.4"]);
        let (cabal, cabal_log) = fake_cabal(temp.path());
        let (install, apt_log) = with_libsodium_dev(build_for(temp.path(), &upstream, &cabal), temp.path());

        let source_dir = temp.path().join("git").join("cardano-node");
        std::fs::create_dir_all(&source_dir).unwrap();
        std::fs::write(source_dir.join("notes.txt"), "operator notes").unwrap();

        let prompter = ScriptedPrompter::new(["n"]);
        let err = install.run(&["10.1.4".to_string()], &["cardano-node".to_string()], &prompter).await.unwrap_err();

        assert!(matches!(err.downcast_ref::<SpuError>(), Some(SpuError::NotARepository { .. })), "{err:#}");
        assert!(!apt_log.exists());
        assert!(!cabal_log.exists());
        assert_eq!(std::fs::read_to_string(source_dir.join("notes.txt")).unwrap(), "operator notes");
    }

    #[tokio::test]
    async fn test_missing_tag_stops_before_build() {
        let temp = TempDir::new().unwrap();
        let upstream = upstream(temp.path(), &["8.9.0"]);
        let (cabal, log) = fake_cabal(temp.path());
        let install = build_for(temp.path(), &upstream, &cabal);

        let candidates = vec!["9.1.0".to_string(), "v9.1.0".to_string()];
        let err = install
            .run(&candidates, &["cardano-node".to_string()], &ScriptedPrompter::default())
            .await
            .unwrap_err();

        match err.downcast_ref::<SpuError>() {
            Some(SpuError::RefNotFound { available_tags, .. }) => assert_eq!(available_tags, &vec!["8.9.0"]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!log.exists());
    }

    #[tokio::test]
    async fn test_failing_build_step_is_reported() {
        let temp = TempDir::new().unwrap();
        let upstream = upstream(temp.path(), &["10.1.4"]);
        let cabal = write_script(
            temp.path(),
            "cabal",
            "[ \"$1\" = configure ] && { echo 'ghc not found' >&2; exit 1; }\nexit 0",
        );
        let install = build_for(temp.path(), &upstream, &cabal);

        let err = install
            .run(&["10.1.4".to_string()], &["cardano-node".to_string()], &ScriptedPrompter::default())
            .await
            .unwrap_err();
        match err.downcast_ref::<SpuError>() {
            Some(SpuError::BuildFailed { step, .. }) => assert!(step.ends_with("configure -O0")),
            other => panic!("unexpected error: {other:?}"),
        }
        // Working copy stays for inspection
        assert!(temp.path().join("git").join("cardano-node").join(".git").exists());
    }
}
