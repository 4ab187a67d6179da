//! Watchdog decisions.

use std::path::{Path, PathBuf};

/// What a watchdog tick does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    /// The agent asked for a restart.
    Restart,
    /// The agent is down; keep its log and start it.
    StartAfterCrash,
    Idle,
}

#[must_use]
pub fn decide(restart_required: bool, running: bool) -> WatchdogAction {
    match (restart_required, running) {
        (true, _) => WatchdogAction::Restart,
        (false, false) => WatchdogAction::StartAfterCrash,
        (false, true) => WatchdogAction::Idle,
    }
}

/// `agent.log` becomes `agent.<unix_secs>.log`.
#[must_use]
pub fn rotated_log_path(log: &Path, unix_secs: i64) -> PathBuf {
    let stem = log
        .file_stem()
        .map_or_else(|| "agent".into(), |s| s.to_string_lossy().into_owned());
    let name = match log.extension() {
        Some(ext) => format!("{stem}.{unix_secs}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{unix_secs}"),
    };
    log.with_file_name(name)
}
