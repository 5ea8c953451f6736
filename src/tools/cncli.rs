//! cncli upgrades.

use crate::config::{Config, InstallMethod};
use crate::prompt::Prompter;
use crate::upgrade::{ArtifactSpec, UpgradeOptions, UpgradeOrchestrator};

/// Orchestrator for cncli. Only the prebuilt strategy exists, so the method
/// prompt never appears.
pub fn orchestrator<'a>(
    config: &Config,
    client: reqwest::Client,
    prompter: &'a dyn Prompter,
    force: bool,
) -> UpgradeOrchestrator<'a> {
    let options = UpgradeOptions {
        force,
        method: Some(InstallMethod::Prebuilt),
        ..UpgradeOptions::from_config(config)
    };
    UpgradeOrchestrator::new(ArtifactSpec::cncli(config), client, prompter).with_options(options)
}
