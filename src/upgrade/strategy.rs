//! The two ways of producing new binaries.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::UpgradePlan;
use super::prebuilt::PrebuiltInstall;
use super::source_build::SourceBuildInstall;
use crate::config::InstallMethod;
use crate::core::SpuError;
use crate::prompt::Prompter;

/// Binaries ready to be installed, by executable name.
///
/// When they were unpacked into a scratch directory the directory travels with
/// them and is deleted when this value is dropped.
#[derive(Debug)]
pub struct BuiltArtifacts {
    binaries: BTreeMap<String, PathBuf>,
    _scratch: Option<TempDir>,
}

impl BuiltArtifacts {
    #[must_use]
    pub fn new(binaries: BTreeMap<String, PathBuf>, scratch: Option<TempDir>) -> Self {
        Self {
            binaries,
            _scratch: scratch,
        }
    }

    /// Path of the built `name`, or [`SpuError::BinaryNotFound`].
    pub fn get(&self, name: &str) -> Result<&Path> {
        self.binaries.get(name).map(PathBuf::as_path).ok_or_else(|| {
            SpuError::BinaryNotFound {
                name: name.to_string(),
                location: "build output".to_string(),
            }
            .into()
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.binaries.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.binaries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.binaries.is_empty()
    }
}

/// How this run obtains binaries.
#[derive(Debug, Clone)]
pub enum InstallStrategy {
    Prebuilt(PrebuiltInstall),
    SourceBuild(SourceBuildInstall),
}

impl InstallStrategy {
    #[must_use]
    pub const fn method(&self) -> InstallMethod {
        match self {
            Self::Prebuilt(_) => InstallMethod::Prebuilt,
            Self::SourceBuild(_) => InstallMethod::Source,
        }
    }

    /// Produce every binary in `names` for the plan's target version.
    ///
    /// Installed binaries are never touched here.
    pub async fn run(&self, plan: &UpgradePlan, names: &[String], prompter: &dyn Prompter) -> Result<BuiltArtifacts> {
        match self {
            Self::Prebuilt(install) => install.run(&plan.target_version, names).await,
            Self::SourceBuild(install) => install.run(&plan.candidate_refs, names, prompter).await,
        }
    }
}
