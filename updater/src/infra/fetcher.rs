//! Infrastructure implementation of the `ArtifactFetcher` port.
//!
//! Streams the body to a temporary sibling of the destination while hashing
//! it, and renames it into place only when the SHA-256 matches.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::application::ports::ArtifactFetcher;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(DOWNLOAD_TIMEOUT)
            .user_agent(concat!("agent-updater/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        Ok(Self { client })
    }

    async fn download_to(&self, url: &Url, partial: &Path) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("requesting {url}"))?
            .error_for_status()
            .with_context(|| format!("downloading {url}"))?;

        let mut file = tokio::fs::File::create(partial)
            .await
            .with_context(|| format!("creating {}", partial.display()))?;
        let mut hasher = Sha256::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.with_context(|| format!("reading body of {url}"))?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .with_context(|| format!("writing {}", partial.display()))?;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(format!("{:x}", hasher.finalize()))
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

impl ArtifactFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, dest: &Path, expected_sha256: &str) -> Result<()> {
        let partial = partial_path(dest);
        let result = async {
            let actual = self.download_to(url, &partial).await?;
            if !actual.eq_ignore_ascii_case(expected_sha256) {
                bail!("SHA-256 mismatch for {url}: expected {expected_sha256}, got {actual}");
            }
            tokio::fs::rename(&partial, dest)
                .await
                .with_context(|| format!("moving download to {}", dest.display()))
        }
        .await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&partial).await;
        }
        result
    }
}
