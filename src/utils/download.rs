//! HTTP downloads for release archives, helper scripts and network configuration.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::core::SpuError;
use crate::utils::progress::ProgressBar;

/// Build the shared HTTP client. GitHub rejects requests without a user agent.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("spu/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .context("Failed to create HTTP client")
}

/// Stream `url` into `dest`, returning the number of bytes written.
///
/// A partially written file is removed when the transfer fails.
pub async fn download_to_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<u64> {
    tracing::info!("Downloading {}", url);
    let fail = |reason: String| SpuError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let mut response = client.get(url).send().await.map_err(|e| fail(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(fail(format!("server returned {status}")).into());
    }

    let progress = match response.content_length() {
        Some(total) => ProgressBar::new_download(total),
        None => ProgressBar::new_spinner(),
    };
    progress.set_prefix(file_label(url));

    let mut file = tokio::fs::File::create(dest)
        .await
        .with_context(|| format!("Failed to create {}", dest.display()))?;

    let mut written: u64 = 0;
    let outcome: Result<()> = async {
        while let Some(chunk) = response.chunk().await.map_err(|e| fail(e.to_string()))? {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", dest.display()))?;
            written += chunk.len() as u64;
            progress.set_position(written);
        }
        file.flush().await.with_context(|| format!("Failed to flush {}", dest.display()))?;
        Ok(())
    }
    .await;

    progress.finish_and_clear();
    if let Err(e) = outcome {
        drop(file);
        let _ = tokio::fs::remove_file(dest).await;
        return Err(e);
    }

    tracing::debug!("Downloaded {} bytes to {}", written, dest.display());
    Ok(written)
}

/// Sibling of `dest` that a download is staged in before it replaces `dest`.
#[must_use]
pub fn staging_path(dest: &Path) -> PathBuf {
    let name = dest.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    dest.with_file_name(format!(".{name}.download"))
}

/// Download `url` into [`staging_path`] and rename it over `dest`.
///
/// A failed transfer leaves any existing `dest` as it was.
pub async fn download_replacing(client: &reqwest::Client, url: &str, dest: &Path) -> Result<u64> {
    let staged = staging_path(dest);
    let written = download_to_file(client, url, &staged).await?;
    tokio::fs::rename(&staged, dest)
        .await
        .with_context(|| format!("Failed to move {} into place", dest.display()))?;
    Ok(written)
}

/// Fetch `url` as text.
pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let fail = |reason: String| SpuError::DownloadFailed {
        url: url.to_string(),
        reason,
    };
    let response = client.get(url).send().await.map_err(|e| fail(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(fail(format!("server returned {status}")).into());
    }
    Ok(response.text().await.map_err(|e| fail(e.to_string()))?)
}

fn file_label(url: &str) -> String {
    url.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or("download").to_string()
}
