//! Application service: the watchdog tick.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::path::Path;

use crate::application::ports::{Clock, LocalFs, ServiceHost, StatusStore};
use crate::application::services::restart::restart_service;
use crate::application::services::status::{clear_restart_required, restart_required};
use crate::domain::watchdog::{WatchdogAction, decide, rotated_log_path};

/// What a tick ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Restarted,
    Started,
    /// The action failed; the next tick tries again.
    Failed(WatchdogAction),
}

/// Honor a pending restart request, or start the agent if it is down.
///
/// The restart flag is cleared only after a successful restart. Execution
/// status is never written here.
pub async fn tick<S, L, C>(
    host: &impl ServiceHost,
    fs: &L,
    store: &S,
    clock: &C,
    service: &str,
    agent_log: Option<&Path>,
) -> TickOutcome
where
    S: StatusStore + ?Sized,
    L: LocalFs + ?Sized,
    C: Clock + ?Sized,
{
    let flagged = restart_required(store);
    // Skip the query when a restart is owed anyway.
    let running = if flagged {
        true
    } else {
        match host.is_running(service).await {
            Ok(running) => running,
            Err(e) => {
                tracing::warn!(service, error = %format!("{e:#}"), "could not query service state");
                return TickOutcome::Failed(WatchdogAction::Idle);
            }
        }
    };

    match decide(flagged, running) {
        WatchdogAction::Idle => TickOutcome::Idle,
        WatchdogAction::Restart => {
            if let Err(e) = restart_service(host, service).await {
                tracing::error!(service, error = %format!("{e:#}"), "requested restart failed");
                return TickOutcome::Failed(WatchdogAction::Restart);
            }
            if let Err(e) = clear_restart_required(store) {
                tracing::error!(error = %format!("{e:#}"), "could not clear restart flag");
            }
            tracing::info!(service, "service restarted on agent request");
            TickOutcome::Restarted
        }
        WatchdogAction::StartAfterCrash => {
            if let Some(log) = agent_log {
                rotate_log(fs, clock, log);
            }
            match host.start(service).await {
                Ok(()) => {
                    tracing::warn!(service, "service was not running and has been started");
                    TickOutcome::Started
                }
                Err(e) => {
                    tracing::error!(service, error = %format!("{e:#}"), "could not start service");
                    TickOutcome::Failed(WatchdogAction::StartAfterCrash)
                }
            }
        }
    }
}

fn rotate_log<L, C>(fs: &L, clock: &C, log: &Path)
where
    L: LocalFs + ?Sized,
    C: Clock + ?Sized,
{
    if !fs.exists(log) {
        return;
    }
    let rotated = rotated_log_path(log, clock.now_utc().timestamp());
    match fs.rename(log, &rotated) {
        Ok(()) => tracing::info!(log = %rotated.display(), "kept log of stopped agent"),
        Err(e) => tracing::warn!(error = %format!("{e:#}"), "could not rotate agent log"),
    }
}
