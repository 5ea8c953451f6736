use super::*;
use crate::core::ErrorClass;
use crate::process::ProcessGuard;
use crate::prompt::ScriptedPrompter;
use crate::test_utils::{fake_node_binary, node_version_script, spawn_named_sleeper, tar_gz};
use crate::utils::download::http_client;
use mockito::{Mock, Server, ServerGuard};
use std::time::Duration;
use tempfile::TempDir;

const NODE_ARCHIVE_PATH: &str = "/download/v9.1.0/cardano-node-v9.1.0-linux.tar.gz";

struct Host {
    temp: TempDir,
    config: Config,
}

impl Host {
    /// Node host with cardano-node `installed` (if any) and releases served by `server`.
    fn new(server: &ServerGuard, installed: Option<&str>) -> Self {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        if let Some(version) = installed {
            fake_node_binary(&bin, version);
        }

        let mut config = Config::default();
        config.use_sudo = false;
        config.node.install_dir = bin.clone();
        config.node.cli_install_dir = bin;
        config.node.backup_dir = temp.path().join("backup");
        config.node.source_dir = temp.path().join("git").join("cardano-node");
        config.node.release_api = format!("{}/api/releases/latest", server.url());
        config.node.download_base = format!("{}/download", server.url());
        Self { temp, config }
    }

    fn bin(&self, name: &str) -> PathBuf {
        self.config.node.install_dir.join(name)
    }

    fn backup(&self, name: &str) -> PathBuf {
        self.config.node.backup_dir.join(format!("{name}.bak"))
    }

    /// Node spec whose process guard looks for `process_name`.
    fn node_spec(&self, process_name: &str) -> ArtifactSpec {
        let mut spec = ArtifactSpec::cardano_node(&self.config);
        spec.process_name = process_name.to_string();
        spec
    }
}

fn options(method: Option<InstallMethod>) -> UpgradeOptions {
    UpgradeOptions {
        method,
        terminate_timeout: Duration::from_secs(5),
        ..UpgradeOptions::default()
    }
}

async fn mock_release(server: &mut ServerGuard, tag: &str) -> Mock {
    server
        .mock("GET", "/api/releases/latest")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(r#"{{"tag_name": "{tag}"}}"#))
        .create_async()
        .await
}

async fn mock_node_archive(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", NODE_ARCHIVE_PATH)
        .with_status(200)
        .with_body(tar_gz(&[
            ("bin/cardano-node", &node_version_script("9.1.0")),
            ("bin/cardano-cli", "#!/bin/sh\necho 'cardano-cli 9.1.0'\n"),
        ]))
        .create_async()
        .await
}

#[test]
fn test_archive_url_placeholders() {
    let source = ReleaseSource {
        api_url: String::new(),
        download_base: "https://github.com/cardano-community/cncli/releases/download/".to_string(),
        archive: "cncli-{version}-ubuntu22-x86_64-unknown-linux-gnu.tar.gz".to_string(),
    };
    assert_eq!(
        source.archive_url(&ArtifactVersion::parse("v6.5.1")),
        "https://github.com/cardano-community/cncli/releases/download/v6.5.1/cncli-6.5.1-ubuntu22-x86_64-unknown-linux-gnu.tar.gz"
    );

    let node = ArtifactSpec::cardano_node(&Config::default());
    assert_eq!(
        node.release.archive_url(&ArtifactVersion::parse("10.1.4")),
        "https://github.com/IntersectMBO/cardano-node/releases/download/10.1.4/cardano-node-10.1.4-linux.tar.gz"
    );
    assert_eq!(node.target_names(), vec!["cardano-node", "cardano-cli"]);
    assert_eq!(ArtifactSpec::cncli(&Config::default()).methods(), vec![InstallMethod::Prebuilt]);
}

#[test]
fn test_plan_candidates() {
    let plan = UpgradePlan::new(InstallMethod::Source, ArtifactVersion::parse("10.1.4"));
    assert_eq!(plan.candidate_refs, vec!["10.1.4", "v10.1.4"]);
}

#[tokio::test]
async fn test_prebuilt_upgrade_from_older_version() {
    let mut server = Server::new_async().await;
    let _release = mock_release(&mut server, "v9.1.0").await;
    let archive = mock_node_archive(&mut server).await;
    let host = Host::new(&server, Some("8.9.0"));
    let old_node = std::fs::read_to_string(host.bin("cardano-node")).unwrap();

    let prompter = ScriptedPrompter::new(["y"]);
    let mut orchestrator = UpgradeOrchestrator::new(host.node_spec("spu-absent-process"), http_client().unwrap(), &prompter)
        .with_options(options(Some(InstallMethod::Prebuilt)));
    let outcome = orchestrator.run().await.unwrap();
    archive.assert_async().await;

    match outcome {
        UpgradeOutcome::Upgraded {
            previous,
            installed,
            verified,
            backups,
        } => {
            assert_eq!(previous, Some(ArtifactVersion::parse("8.9.0")));
            assert_eq!(installed.raw(), "v9.1.0");
            assert_eq!(verified, Some(ArtifactVersion::parse("9.1.0")));
            assert_eq!(backups, vec![BackupOutcome::Created(host.backup("cardano-node")), BackupOutcome::Skipped]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert_eq!(std::fs::read_to_string(host.backup("cardano-node")).unwrap(), old_node);
    assert!(host.bin("cardano-cli").exists());
    assert_eq!(
        orchestrator.history(),
        &[
            UpgradeState::Idle,
            UpgradeState::VersionCheck,
            UpgradeState::UpgradeNeeded,
            UpgradeState::Confirm,
            UpgradeState::StrategySelect,
            UpgradeState::Prebuilt,
            UpgradeState::ProcessGuard,
            UpgradeState::Backup,
            UpgradeState::Install,
            UpgradeState::Done,
        ]
    );
    assert_eq!(prompter.asked().len(), 1);
}

#[tokio::test]
async fn test_up_to_date_asks_nothing() {
    let mut server = Server::new_async().await;
    let _release = mock_release(&mut server, "v9.1.0").await;
    let archive = server.mock("GET", NODE_ARCHIVE_PATH).expect(0).create_async().await;
    let host = Host::new(&server, Some("9.1.0"));

    let prompter = ScriptedPrompter::new(Vec::<String>::new());
    let mut orchestrator = UpgradeOrchestrator::new(host.node_spec("spu-absent-process"), http_client().unwrap(), &prompter);
    let outcome = orchestrator.run().await.unwrap();

    assert_eq!(outcome, UpgradeOutcome::UpToDate { installed: ArtifactVersion::parse("9.1.0") });
    assert_eq!(orchestrator.state(), UpgradeState::Done);
    assert!(prompter.asked().is_empty());
    archive.assert_async().await;
}

#[tokio::test]
async fn test_force_reinstalls_same_version() {
    let mut server = Server::new_async().await;
    let _release = mock_release(&mut server, "v9.1.0").await;
    let _archive = mock_node_archive(&mut server).await;
    let host = Host::new(&server, Some("9.1.0"));

    let prompter = ScriptedPrompter::new(["y"]);
    let mut opts = options(Some(InstallMethod::Prebuilt));
    opts.force = true;
    let mut orchestrator =
        UpgradeOrchestrator::new(host.node_spec("spu-absent-process"), http_client().unwrap(), &prompter).with_options(opts);
    assert!(matches!(orchestrator.run().await.unwrap(), UpgradeOutcome::Upgraded { .. }));
    assert!(prompter.asked()[0].starts_with("Reinstall cardano-node"));
}

#[tokio::test]
async fn test_release_unavailable_changes_nothing() {
    let mut server = Server::new_async().await;
    let _release = server.mock("GET", "/api/releases/latest").with_status(503).create_async().await;
    let host = Host::new(&server, Some("8.9.0"));
    let before = std::fs::read_to_string(host.bin("cardano-node")).unwrap();

    let prompter = ScriptedPrompter::new(Vec::<String>::new());
    let mut orchestrator = UpgradeOrchestrator::new(host.node_spec("spu-absent-process"), http_client().unwrap(), &prompter);
    let err = orchestrator.run().await.unwrap_err();

    assert_eq!(UpgradeError::step_of(&err), Some(UpgradeState::VersionCheck));
    assert_eq!(err.downcast_ref::<SpuError>().map(SpuError::class), Some(ErrorClass::Unavailable));
    assert_eq!(orchestrator.state(), UpgradeState::Aborted);
    assert_eq!(std::fs::read_to_string(host.bin("cardano-node")).unwrap(), before);
    assert!(!host.config.node.backup_dir.exists());
}

#[tokio::test]
async fn test_missing_install_counts_as_upgrade_needed() {
    let mut server = Server::new_async().await;
    let _release = mock_release(&mut server, "v9.1.0").await;
    let _archive = mock_node_archive(&mut server).await;
    let host = Host::new(&server, None);

    let prompter = ScriptedPrompter::new(["y"]);
    let mut orchestrator = UpgradeOrchestrator::new(host.node_spec("spu-absent-process"), http_client().unwrap(), &prompter)
        .with_options(options(Some(InstallMethod::Prebuilt)));
    let outcome = orchestrator.run().await.unwrap();

    assert!(prompter.asked()[0].starts_with("Install cardano-node"));
    match outcome {
        UpgradeOutcome::Upgraded { previous, backups, .. } => {
            assert_eq!(previous, None);
            assert_eq!(backups, vec![BackupOutcome::Skipped, BackupOutcome::Skipped]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_declined_confirmation_is_cancelled() {
    let mut server = Server::new_async().await;
    let _release = mock_release(&mut server, "v9.1.0").await;
    let archive = server.mock("GET", NODE_ARCHIVE_PATH).expect(0).create_async().await;
    let host = Host::new(&server, Some("8.9.0"));

    let prompter = ScriptedPrompter::new(["n"]);
    let mut orchestrator = UpgradeOrchestrator::new(host.node_spec("spu-absent-process"), http_client().unwrap(), &prompter);
    assert_eq!(orchestrator.run().await.unwrap(), UpgradeOutcome::Cancelled);
    assert_eq!(orchestrator.state(), UpgradeState::Aborted);
    archive.assert_async().await;
}

#[tokio::test]
async fn test_failed_download_leaves_binaries_untouched() {
    let mut server = Server::new_async().await;
    let _release = mock_release(&mut server, "v9.1.0").await;
    let _archive = server.mock("GET", NODE_ARCHIVE_PATH).with_status(404).create_async().await;
    let host = Host::new(&server, Some("8.9.0"));
    let before = std::fs::read_to_string(host.bin("cardano-node")).unwrap();

    let prompter = ScriptedPrompter::new(["y"]);
    let mut orchestrator = UpgradeOrchestrator::new(host.node_spec("spu-absent-process"), http_client().unwrap(), &prompter)
        .with_options(options(Some(InstallMethod::Prebuilt)));
    let err = orchestrator.run().await.unwrap_err();

    assert_eq!(UpgradeError::step_of(&err), Some(UpgradeState::Prebuilt));
    assert_eq!(std::fs::read_to_string(host.bin("cardano-node")).unwrap(), before);
    assert!(!host.backup("cardano-node").exists());
}

#[tokio::test]
async fn test_method_prompt_rejects_unknown_choice() {
    let mut server = Server::new_async().await;
    let _release = mock_release(&mut server, "v9.1.0").await;
    let host = Host::new(&server, Some("8.9.0"));

    let prompter = ScriptedPrompter::new(["y", "3"]);
    let mut orchestrator = UpgradeOrchestrator::new(host.node_spec("spu-absent-process"), http_client().unwrap(), &prompter);
    let err = orchestrator.run().await.unwrap_err();
    assert_eq!(UpgradeError::step_of(&err), Some(UpgradeState::StrategySelect));
    assert_eq!(err.downcast_ref::<SpuError>().map(SpuError::class), Some(ErrorClass::Aborted));
}

#[tokio::test]
async fn test_running_process_is_terminated_before_install() {
    let mut server = Server::new_async().await;
    let _release = mock_release(&mut server, "v9.1.0").await;
    let _archive = mock_node_archive(&mut server).await;
    let host = Host::new(&server, Some("8.9.0"));
    let (name, mut child) = spawn_named_sleeper(host.temp.path(), "run", false);

    let prompter = ScriptedPrompter::new(["y", "y"]);
    let mut orchestrator = UpgradeOrchestrator::new(host.node_spec(&name), http_client().unwrap(), &prompter)
        .with_options(options(Some(InstallMethod::Prebuilt)))
        .with_process_guard(ProcessGuard::new().with_poll_interval(Duration::from_millis(20)));
    let outcome = orchestrator.run().await.unwrap();

    assert!(matches!(outcome, UpgradeOutcome::Upgraded { .. }));
    assert_eq!(prompter.asked()[1], "Terminate these processes?");
    assert!(!ProcessGuard::new().is_alive(child.id()));
    child.wait().unwrap();
}

#[tokio::test]
async fn test_declining_termination_aborts_before_backup() {
    let mut server = Server::new_async().await;
    let _release = mock_release(&mut server, "v9.1.0").await;
    let _archive = mock_node_archive(&mut server).await;
    let host = Host::new(&server, Some("8.9.0"));
    let (name, mut child) = spawn_named_sleeper(host.temp.path(), "dec", false);

    let prompter = ScriptedPrompter::new(["y", "n"]);
    let mut orchestrator = UpgradeOrchestrator::new(host.node_spec(&name), http_client().unwrap(), &prompter)
        .with_options(options(Some(InstallMethod::Prebuilt)));
    let err = orchestrator.run().await.unwrap_err();

    assert_eq!(UpgradeError::step_of(&err), Some(UpgradeState::ProcessGuard));
    assert_eq!(err.downcast_ref::<SpuError>().map(SpuError::class), Some(ErrorClass::Aborted));
    assert!(ProcessGuard::new().is_alive(child.id()));
    assert!(!host.backup("cardano-node").exists());

    child.kill().unwrap();
    child.wait().unwrap();
}

#[tokio::test]
async fn test_survivor_aborts_with_process_held() {
    let mut server = Server::new_async().await;
    let _release = mock_release(&mut server, "v9.1.0").await;
    let _archive = mock_node_archive(&mut server).await;
    let host = Host::new(&server, Some("8.9.0"));
    let before = std::fs::read_to_string(host.bin("cardano-node")).unwrap();
    let (name, mut child) = spawn_named_sleeper(host.temp.path(), "held", true);

    let prompter = ScriptedPrompter::new(["y", "y"]);
    let mut opts = options(Some(InstallMethod::Prebuilt));
    opts.terminate_timeout = Duration::from_millis(300);
    let mut orchestrator = UpgradeOrchestrator::new(host.node_spec(&name), http_client().unwrap(), &prompter)
        .with_options(opts)
        .with_process_guard(ProcessGuard::new().with_poll_interval(Duration::from_millis(20)));
    let err = orchestrator.run().await.unwrap_err();

    match err.downcast_ref::<SpuError>() {
        Some(SpuError::ProcessHeld { pids }) => assert_eq!(pids, &vec![child.id()]),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(UpgradeError::step_of(&err), Some(UpgradeState::ProcessGuard));
    assert_eq!(std::fs::read_to_string(host.bin("cardano-node")).unwrap(), before);

    child.kill().unwrap();
    child.wait().unwrap();
}

#[tokio::test]
async fn test_source_build_selected_at_prompt() {
    use crate::libs::packages::PackageManager;
    use crate::test_utils::{upstream_with_tags, write_script};

    let mut server = Server::new_async().await;
    let _release = mock_release(&mut server, "9.1.0").await;
    let host = Host::new(&server, Some("8.9.0"));

    let upstream = upstream_with_tags(&host.temp.path().join("upstream"), &["9.0.0", "9.1.0"]).unwrap();
    upstream
        .commit_file("scripts/bin-path.sh", "echo \"out/$1\"\n", "bin-path")
        .unwrap();
    upstream.retag("9.1.0").unwrap();
    let cabal = write_script(
        host.temp.path(),
        "cabal",
        "[ \"$1 $2\" = \"build all\" ] || exit 0\nmkdir -p out\nfor b in cardano-node cardano-cli; do printf '#!/bin/sh\\necho \"cardano-node %s - linux\"\\n' \"$(cat VERSION)\" > out/$b; done",
    );

    let source = SourceSpec {
        repo_url: upstream.repo_path().display().to_string(),
        source_dir: host.config.node.source_dir.clone(),
        conflicting_packages: Vec::new(),
    };
    let strategy = InstallStrategy::SourceBuild(
        source_build::SourceBuildInstall::new(source, PackageManager::new(false)).with_cabal(cabal.display().to_string()),
    );

    let prompter = ScriptedPrompter::new(["y", "source"]);
    let mut orchestrator = UpgradeOrchestrator::new(host.node_spec("spu-absent-process"), http_client().unwrap(), &prompter)
        .with_options(options(None))
        .with_strategy(strategy);
    let outcome = orchestrator.run().await.unwrap();

    assert!(orchestrator.history().contains(&UpgradeState::SourceBuild));
    match outcome {
        UpgradeOutcome::Upgraded { verified, .. } => assert_eq!(verified, Some(ArtifactVersion::parse("9.1.0"))),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_rollback_restores_previous_binaries() {
    let mut server = Server::new_async().await;
    let _release = mock_release(&mut server, "v9.1.0").await;
    let _archive = mock_node_archive(&mut server).await;
    let host = Host::new(&server, Some("8.9.0"));
    std::fs::write(host.bin("cardano-cli"), "old cli").unwrap();

    let prompter = ScriptedPrompter::new(["y"]);
    UpgradeOrchestrator::new(host.node_spec("spu-absent-process"), http_client().unwrap(), &prompter)
        .with_options(options(Some(InstallMethod::Prebuilt)))
        .run()
        .await
        .unwrap();

    let prompter = ScriptedPrompter::new(["y"]);
    let mut rollback = UpgradeOrchestrator::new(host.node_spec("spu-absent-process"), http_client().unwrap(), &prompter);
    let restored = rollback.rollback().await.unwrap();

    assert_eq!(restored, vec![host.bin("cardano-node"), host.bin("cardano-cli")]);
    assert_eq!(std::fs::read_to_string(host.bin("cardano-cli")).unwrap(), "old cli");
    let version = ArtifactSpec::cardano_node(&host.config).probe.resolve_installed().await;
    assert_eq!(version, Some(ArtifactVersion::parse("8.9.0")));
}

#[tokio::test]
async fn test_rollback_without_backups_touches_nothing() {
    let server = Server::new_async().await;
    let host = Host::new(&server, Some("9.1.0"));

    let prompter = ScriptedPrompter::new(Vec::<String>::new());
    let mut rollback = UpgradeOrchestrator::new(host.node_spec("spu-absent-process"), http_client().unwrap(), &prompter);
    let err = rollback.rollback().await.unwrap_err();
    assert!(matches!(err.downcast_ref::<SpuError>(), Some(SpuError::BinaryNotFound { .. })));
    assert!(prompter.asked().is_empty());
}
