//! Application service: messenger releases.
//!
//! Releases are broadcast to every agent. Each agent picks the file for its
//! platform and installs it if it is newer than the recorded version.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use semver::Version;
use updater_common::{Platform, Release, status_keys};
use url::Url;

use crate::application::ports::{ArtifactFetcher, LocalFs, ServiceHost, StatusStore};
use crate::application::services::swap::{ArtifactSource, swap_artifact};
use crate::domain::command::{normalize_sha256, parse_download_url};
use crate::domain::disposition::Disposition;
use crate::domain::error::CommandError;
use crate::domain::layout::ArtifactLayout;

/// A release this agent should install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessengerUpgrade {
    pub version: Version,
    pub url: Url,
    pub sha256: String,
}

/// What to do with a release broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleasePlan {
    Install(MessengerUpgrade),
    /// Installed version is the same or newer.
    UpToDate,
}

/// Decode a release and compare it with the installed version.
///
/// An installed version that is missing or not semver counts as older than
/// any release.
///
/// # Errors
///
/// Returns a [`CommandError`] for releases that can never be installed here.
pub fn plan_release(
    payload: &[u8],
    platform: &Platform,
    installed: Option<&str>,
) -> Result<ReleasePlan, CommandError> {
    let release: Release = serde_json::from_slice(payload)?;
    let raw_version = release.version.trim();
    if raw_version.is_empty() {
        return Err(CommandError::MissingVersion);
    }
    let version = parse_version(raw_version).map_err(|e| CommandError::InvalidVersion {
        version: raw_version.to_string(),
        reason: e.to_string(),
    })?;
    if let Some(current) = installed.and_then(|v| parse_version(v.trim()).ok()) {
        if current >= version {
            return Ok(ReleasePlan::UpToDate);
        }
    }
    let file = release
        .file_for(platform)
        .ok_or_else(|| CommandError::NoFileForPlatform {
            os: platform.os.clone(),
            arch: platform.arch.clone(),
        })?;
    Ok(ReleasePlan::Install(MessengerUpgrade {
        version,
        url: parse_download_url(&file.file_url)?,
        sha256: normalize_sha256(&file.checksum)?,
    }))
}

fn parse_version(raw: &str) -> Result<Version, semver::Error> {
    Version::parse(raw.strip_prefix('v').unwrap_or(raw))
}

/// Version recorded after the last messenger install.
pub fn installed_version(store: &(impl StatusStore + ?Sized)) -> Option<String> {
    store
        .get(status_keys::MESSENGER_VERSION)
        .inspect_err(|e| {
            tracing::warn!(error = %format!("{e:#}"), "could not read messenger version");
        })
        .ok()
        .flatten()
        .filter(|v| !v.trim().is_empty())
}

/// Install `upgrade` and record the new version.
pub async fn install_messenger(
    host: &impl ServiceHost,
    fs: &(impl LocalFs + ?Sized),
    fetcher: &impl ArtifactFetcher,
    store: &(impl StatusStore + ?Sized),
    layout: &ArtifactLayout,
    upgrade: &MessengerUpgrade,
) -> Disposition {
    // A newer release may have been installed while this one waited.
    let current = installed_version(store).and_then(|v| parse_version(v.trim()).ok());
    if current.as_ref().is_some_and(|v| *v >= upgrade.version) {
        tracing::info!(version = %upgrade.version, "messenger already at or past this release");
        return Disposition::Ack;
    }
    let source = ArtifactSource {
        url: &upgrade.url,
        sha256: &upgrade.sha256,
    };
    match swap_artifact(host, fs, fetcher, layout, source).await {
        Ok(_) => {
            tracing::info!(version = %upgrade.version, "messenger updated");
            if let Err(e) = store.set(status_keys::MESSENGER_VERSION, &upgrade.version.to_string()) {
                tracing::warn!(error = %format!("{e:#}"), "could not record messenger version");
            }
            Disposition::Ack
        }
        Err(e) => {
            tracing::error!(version = %upgrade.version, error = %e, "messenger update failed");
            e.disposition()
        }
    }
}
