//! Application service: agent update attempts.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use crate::application::ports::{ArtifactFetcher, Clock, LocalFs, ServiceHost, StatusStore};
use crate::application::services::status::record;
use crate::application::services::swap::{ArtifactSource, swap_artifact};
use crate::domain::command::UpdateCommand;
use crate::domain::disposition::Disposition;
use crate::domain::error::CommandError;
use crate::domain::layout::ArtifactLayout;
use crate::domain::status::ExecutionStatus;

/// Ports an update attempt needs.
pub struct UpdateDeps<'a, H, F, S: ?Sized, L: ?Sized, C: ?Sized> {
    pub host: &'a H,
    pub fetcher: &'a F,
    pub store: &'a S,
    pub fs: &'a L,
    pub clock: &'a C,
}

/// Swap the agent to `cmd`'s version, record the outcome, and say how to
/// settle the triggering message.
pub async fn run_agent_update<H, F, S, L, C>(
    deps: &UpdateDeps<'_, H, F, S, L, C>,
    layout: &ArtifactLayout,
    cmd: &UpdateCommand,
) -> Disposition
where
    H: ServiceHost,
    F: ArtifactFetcher,
    S: StatusStore + ?Sized,
    L: LocalFs + ?Sized,
    C: Clock + ?Sized,
{
    tracing::info!(version = %cmd.target_version, "starting agent update");
    let source = ArtifactSource {
        url: &cmd.download_from,
        sha256: &cmd.download_hash,
    };
    let result = swap_artifact(deps.host, deps.fs, deps.fetcher, layout, source).await;
    let at = deps.clock.now_local();
    match result {
        Ok(swapped) => {
            tracing::info!(
                version = %cmd.target_version,
                rollback_kept = swapped.rollback_kept,
                "agent updated"
            );
            record(
                deps.store,
                &ExecutionStatus::success(at, format!("agent updated to {}", cmd.target_version)),
            );
            Disposition::Ack
        }
        Err(e) => {
            tracing::error!(version = %cmd.target_version, error = %e, "agent update failed");
            let status = if e.is_fatal() {
                ExecutionStatus::fatal(at, e.to_string())
            } else {
                ExecutionStatus::error(at, e.to_string())
            };
            record(deps.store, &status);
            e.disposition()
        }
    }
}

/// Record a payload that never became a command.
pub fn record_rejected<S, C>(store: &S, clock: &C, err: &CommandError)
where
    S: StatusStore + ?Sized,
    C: Clock + ?Sized,
{
    tracing::error!(error = %err, "rejected update request");
    record(
        store,
        &ExecutionStatus::error(clock.now_local(), err.to_string()),
    );
}
