//! Application service: restore the previous executable on request.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::{Context, Result};

use crate::application::ports::{Clock, LocalFs, ServiceHost, StatusStore};
use crate::application::services::status::record;
use crate::domain::layout::ArtifactLayout;
use crate::domain::status::ExecutionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    Restored,
    /// No rollback executable was kept.
    NothingToRestore,
}

/// Move the rollback executable back into place, stopping and starting the
/// service around the move when the artifact has one.
///
/// # Errors
///
/// Returns an error if the move or the restart fails.
pub async fn restore_previous(
    host: &impl ServiceHost,
    fs: &(impl LocalFs + ?Sized),
    layout: &ArtifactLayout,
) -> Result<RollbackOutcome> {
    if !fs.exists(&layout.rollback_path) {
        return Ok(RollbackOutcome::NothingToRestore);
    }
    if let Some(service) = &layout.service {
        if let Err(e) = host.stop(service).await {
            tracing::warn!(service, error = %format!("{e:#}"), "could not stop service, continuing");
        }
    }
    fs.rename(&layout.rollback_path, &layout.install_path)
        .with_context(|| format!("restoring {}", layout.install_path.display()))?;
    if let Some(service) = &layout.service {
        host.start(service)
            .await
            .with_context(|| format!("starting {service} after rollback"))?;
    }
    Ok(RollbackOutcome::Restored)
}

/// Agent rollback. The outcome is recorded; the message is always acked.
pub async fn rollback_agent<S, C>(
    host: &impl ServiceHost,
    fs: &(impl LocalFs + ?Sized),
    store: &S,
    clock: &C,
    layout: &ArtifactLayout,
) where
    S: StatusStore + ?Sized,
    C: Clock + ?Sized,
{
    let result = restore_previous(host, fs, layout).await;
    let at = clock.now_local();
    let status = match result {
        Ok(RollbackOutcome::Restored) => {
            tracing::info!("agent rolled back to previous executable");
            ExecutionStatus::success(at, "agent rolled back to previous executable")
        }
        Ok(RollbackOutcome::NothingToRestore) => {
            tracing::warn!("agent rollback requested but no previous executable is kept");
            ExecutionStatus::error(at, "no previous agent executable to roll back to")
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "agent rollback failed");
            ExecutionStatus::error(at, format!("agent rollback failed: {e:#}"))
        }
    };
    record(store, &status);
}

/// Messenger rollback. Logged only; the stored messenger version is left as is.
pub async fn rollback_messenger(
    host: &impl ServiceHost,
    fs: &(impl LocalFs + ?Sized),
    layout: &ArtifactLayout,
) {
    match restore_previous(host, fs, layout).await {
        Ok(RollbackOutcome::Restored) => tracing::info!("messenger rolled back"),
        Ok(RollbackOutcome::NothingToRestore) => {
            tracing::warn!("messenger rollback requested but no previous executable is kept");
        }
        Err(e) => tracing::error!(error = %format!("{e:#}"), "messenger rollback failed"),
    }
}
