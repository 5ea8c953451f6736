//! Install from a published release archive.
//!
//! The archive is downloaded and unpacked into a private scratch directory;
//! installed binaries are not touched until the orchestrator's install step.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

use super::ReleaseSource;
use super::strategy::BuiltArtifacts;
use crate::core::SpuError;
use crate::utils::download::download_to_file;
use crate::version::ArtifactVersion;

#[derive(Debug, Clone)]
pub struct PrebuiltInstall {
    client: reqwest::Client,
    release: ReleaseSource,
}

impl PrebuiltInstall {
    pub fn new(client: reqwest::Client, release: ReleaseSource) -> Self {
        Self { client, release }
    }

    /// Download and unpack the release archive for `version`, then locate `names`.
    pub async fn run(&self, version: &ArtifactVersion, names: &[String]) -> Result<BuiltArtifacts> {
        let scratch = tempfile::Builder::new()
            .prefix("spu-prebuilt-")
            .tempdir()
            .context("Failed to create scratch directory")?;

        let archive_name = self.release.archive_name(version);
        let archive_path = scratch.path().join(&archive_name);
        let url = self.release.archive_url(version);
        download_to_file(&self.client, &url, &archive_path).await?;

        let extract_dir = scratch.path().join("extract");
        let archive = archive_path.clone();
        let dest = extract_dir.clone();
        tokio::task::spawn_blocking(move || extract_tar_gz(&archive, &dest))
            .await
            .context("Archive extraction task panicked")??;

        let mut binaries = BTreeMap::new();
        for name in names {
            let path = locate_binary(&extract_dir, name).ok_or_else(|| SpuError::BinaryNotFound {
                name: name.clone(),
                location: archive_name.clone(),
            })?;
            tracing::debug!("Found {} at {}", name, path.display());
            binaries.insert(name.clone(), path);
        }

        Ok(BuiltArtifacts::new(binaries, Some(scratch)))
    }
}

/// Unpack a `.tar.gz` into `dest`.
pub fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<()> {
    let fail = |reason: String| SpuError::ArchiveFailed {
        path: archive.display().to_string(),
        reason,
    };
    let file = std::fs::File::open(archive).map_err(|e| fail(e.to_string()))?;
    std::fs::create_dir_all(dest).map_err(|e| fail(e.to_string()))?;
    tar::Archive::new(GzDecoder::new(file)).unpack(dest).map_err(|e| fail(e.to_string()))?;
    Ok(())
}

/// `<root>/bin/<name>` if present, else the first file named `name` in the tree.
pub fn locate_binary(root: &Path, name: &str) -> Option<PathBuf> {
    let preferred = root.join("bin").join(name);
    if preferred.is_file() {
        return Some(preferred);
    }
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .find(|entry| entry.file_type().is_file() && entry.file_name() == name)
        .map(walkdir::DirEntry::into_path)
}
