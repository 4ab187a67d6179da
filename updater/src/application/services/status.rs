//! Application service: execution status and the restart flag.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::Result;
use updater_common::status_keys;

use crate::application::ports::StatusStore;
use crate::domain::status::{ExecutionStatus, format_restart_flag, parse_restart_flag};

/// Persist `status`. Store failures are logged, never propagated, so a
/// broken store cannot change how a message is settled.
pub fn record(store: &(impl StatusStore + ?Sized), status: &ExecutionStatus) {
    if let Err(e) = store.set_many(&status.to_entries()) {
        tracing::error!(error = %format!("{e:#}"), "could not persist execution status");
    }
}

/// The last recorded status, if one exists and parses.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub fn last_status(store: &(impl StatusStore + ?Sized)) -> Result<Option<ExecutionStatus>> {
    let time = store.get(status_keys::LAST_EXECUTION_TIME)?;
    let outcome = store.get(status_keys::LAST_EXECUTION_STATUS)?;
    let result = store.get(status_keys::LAST_EXECUTION_RESULT)?;
    Ok(match (time, outcome) {
        (Some(time), Some(outcome)) => {
            ExecutionStatus::from_entries(&time, &outcome, result.as_deref().unwrap_or(""))
        }
        _ => None,
    })
}

/// Read the restart flag. Unreadable or unrecognised values count as unset.
pub fn restart_required(store: &(impl StatusStore + ?Sized)) -> bool {
    let raw = match store.get(status_keys::RESTART_REQUIRED) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "could not read restart flag");
            return false;
        }
    };
    parse_restart_flag(raw.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "treating restart flag as unset");
        false
    })
}

/// # Errors
///
/// Returns an error if the store cannot be written.
pub fn clear_restart_required(store: &(impl StatusStore + ?Sized)) -> Result<()> {
    store.set(status_keys::RESTART_REQUIRED, format_restart_flag(false))
}
