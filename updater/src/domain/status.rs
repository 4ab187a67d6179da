//! Persisted execution status and the deferred-restart flag.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use updater_common::status_keys;

use crate::domain::error::StatusError;

/// Local-time format of `UpdaterLastExecutionTime`.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Prefix marking results of attempts that failed after the swap.
pub const FATAL_PREFIX: &str = "fatal: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
        })
    }
}

impl FromStr for Outcome {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "SUCCESS" => Ok(Self::Success),
            "ERROR" => Ok(Self::Error),
            other => Err(StatusError::Outcome(other.to_string())),
        }
    }
}

/// The last terminal outcome of an update or rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionStatus {
    pub last_run_at: NaiveDateTime,
    pub outcome: Outcome,
    pub detail: String,
    pub fatal: bool,
}

impl ExecutionStatus {
    #[must_use]
    pub fn success(at: NaiveDateTime, detail: impl Into<String>) -> Self {
        Self {
            last_run_at: at,
            outcome: Outcome::Success,
            detail: detail.into(),
            fatal: false,
        }
    }

    #[must_use]
    pub fn error(at: NaiveDateTime, detail: impl Into<String>) -> Self {
        Self {
            last_run_at: at,
            outcome: Outcome::Error,
            detail: detail.into(),
            fatal: false,
        }
    }

    #[must_use]
    pub fn fatal(at: NaiveDateTime, detail: impl Into<String>) -> Self {
        Self {
            fatal: true,
            ..Self::error(at, detail)
        }
    }

    /// The value stored under `UpdaterLastExecutionResult`.
    #[must_use]
    pub fn result_text(&self) -> String {
        if self.fatal {
            format!("{FATAL_PREFIX}{}", self.detail)
        } else {
            self.detail.clone()
        }
    }

    /// Key/value pairs to persist, written together.
    #[must_use]
    pub fn to_entries(&self) -> [(&'static str, String); 3] {
        [
            (
                status_keys::LAST_EXECUTION_TIME,
                self.last_run_at.format(TIME_FORMAT).to_string(),
            ),
            (status_keys::LAST_EXECUTION_STATUS, self.outcome.to_string()),
            (status_keys::LAST_EXECUTION_RESULT, self.result_text()),
        ]
    }

    /// Rebuild a status from its stored values. `None` if time or outcome
    /// cannot be parsed.
    #[must_use]
    pub fn from_entries(time: &str, outcome: &str, result: &str) -> Option<Self> {
        let last_run_at = NaiveDateTime::parse_from_str(time.trim(), TIME_FORMAT).ok()?;
        let outcome = outcome.parse().ok()?;
        let (detail, fatal) = match result.strip_prefix(FATAL_PREFIX) {
            Some(rest) => (rest.to_string(), true),
            None => (result.to_string(), false),
        };
        Some(Self {
            last_run_at,
            outcome,
            detail,
            fatal,
        })
    }
}

/// Parse the stored restart flag. Absent or empty means unset.
///
/// # Errors
///
/// Returns [`StatusError::RestartFlag`] for values other than booleans or `0`/`1`.
pub fn parse_restart_flag(raw: Option<&str>) -> Result<bool, StatusError> {
    let Some(raw) = raw else { return Ok(false) };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" => Ok(false),
        "1" | "true" => Ok(true),
        _ => Err(StatusError::RestartFlag(raw.to_string())),
    }
}

#[must_use]
pub fn format_restart_flag(required: bool) -> &'static str {
    if required { "true" } else { "false" }
}

/// The restart flag as the `REG_DWORD` value the agent reads (`1` or `0`).
///
/// # Errors
///
/// Returns [`StatusError::RestartFlag`] for values [`parse_restart_flag`]
/// rejects.
pub fn restart_flag_dword(raw: &str) -> Result<u32, StatusError> {
    parse_restart_flag(Some(raw)).map(u32::from)
}
