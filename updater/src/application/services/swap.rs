//! Application service: replace an installed executable and roll back on a
//! failed start.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! All I/O is routed through injected port traits.
//!
//! Steps, in order:
//! 1. prepare the staging directory and download the verified artifact;
//! 2. stop the service (failure is only logged);
//! 3. move the installed executable to the rollback path;
//! 4. install the staged executable;
//! 5. start the service;
//! 6. on a failed start, restore the rollback executable and start again.
//!
//! Nothing is touched on disk until the download has been verified.

use std::path::Path;

use url::Url;

use crate::application::ports::{ArtifactFetcher, LocalFs, ServiceHost};
use crate::domain::error::SwapError;
use crate::domain::layout::ArtifactLayout;

/// Where to get the replacement.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactSource<'a> {
    pub url: &'a Url,
    /// Lowercase hex SHA-256.
    pub sha256: &'a str,
}

/// A completed swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swapped {
    /// A previous executable was moved to the rollback path and kept there.
    pub rollback_kept: bool,
}

/// Run the swap protocol for `layout`.
///
/// # Errors
///
/// Returns a [`SwapError`] naming the stage that failed. Before returning,
/// the previous executable has been put back whenever that was possible.
pub async fn swap_artifact(
    host: &impl ServiceHost,
    fs: &(impl LocalFs + ?Sized),
    fetcher: &impl ArtifactFetcher,
    layout: &ArtifactLayout,
    source: ArtifactSource<'_>,
) -> Result<Swapped, SwapError> {
    let staging_dir = layout.staging_dir();
    fs.create_dir_all(staging_dir)
        .map_err(|e| SwapError::Staging {
            path: staging_dir.to_path_buf(),
            reason: format!("{e:#}"),
        })?;

    tracing::info!(url = %source.url, artifact = layout.kind.label(), "downloading");
    fetcher
        .fetch(source.url, &layout.staging_path, source.sha256)
        .await
        .map_err(|e| SwapError::Download(format!("{e:#}")))?;

    if let Some(service) = &layout.service {
        if let Err(e) = host.stop(service).await {
            tracing::warn!(service, error = %format!("{e:#}"), "could not stop service, continuing");
        }
    }

    let had_previous = fs.exists(&layout.install_path);
    if had_previous {
        if let Err(e) = fs.rename(&layout.install_path, &layout.rollback_path) {
            start_best_effort(host, layout).await;
            return Err(SwapError::Backup(format!("{e:#}")));
        }
    }

    if let Err(e) = host.install_artifact(&layout.staging_path, &layout.install_path) {
        let restored = had_previous
            && restore(fs, &layout.rollback_path, &layout.install_path).is_ok();
        start_best_effort(host, layout).await;
        return Err(SwapError::Install {
            reason: format!("{e:#}"),
            restored,
        });
    }

    let Some(service) = &layout.service else {
        return Ok(Swapped {
            rollback_kept: had_previous,
        });
    };

    let start_err = match host.start(service).await {
        Ok(()) => {
            tracing::info!(service, "service started with new executable");
            return Ok(Swapped {
                rollback_kept: had_previous,
            });
        }
        Err(e) => format!("{e:#}"),
    };

    if !had_previous {
        return Err(SwapError::StartFailed(start_err));
    }

    tracing::warn!(service, error = %start_err, "new executable failed to start, rolling back");
    if let Err(e) = host.stop(service).await {
        tracing::debug!(service, error = %format!("{e:#}"), "stop before rollback failed");
    }
    if let Err(e) = restore(fs, &layout.rollback_path, &layout.install_path) {
        return Err(SwapError::RollbackFailed {
            start: start_err,
            rollback: format!("{e:#}"),
        });
    }
    match host.start(service).await {
        Ok(()) => Err(SwapError::RolledBack(start_err)),
        Err(e) => Err(SwapError::RollbackFailed {
            start: start_err,
            rollback: format!("restored executable failed to start: {e:#}"),
        }),
    }
}

fn restore(fs: &(impl LocalFs + ?Sized), rollback: &Path, install: &Path) -> anyhow::Result<()> {
    fs.rename(rollback, install).inspect_err(|e| {
        tracing::error!(error = %format!("{e:#}"), "could not restore previous executable");
    })
}

async fn start_best_effort(host: &impl ServiceHost, layout: &ArtifactLayout) {
    let Some(service) = &layout.service else {
        return;
    };
    if let Err(e) = host.start(service).await {
        tracing::error!(service, error = %format!("{e:#}"), "could not restart service");
    }
}
