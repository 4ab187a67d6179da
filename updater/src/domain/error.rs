//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::application`,
//! `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use updater_common::delays;

use crate::domain::disposition::Disposition;

// ── Command errors ────────────────────────────────────────────────────────────

/// An inbound payload that cannot become an update command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("could not decode request: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("request has no target version")]
    MissingVersion,

    #[error("invalid download URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("download hash must be 64 hex characters (SHA-256), got '{0}'")]
    InvalidHash(String),

    #[error("invalid release version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("release has no file for {os}/{arch}")]
    NoFileForPlatform { os: String, arch: String },
}

// ── Swap errors ───────────────────────────────────────────────────────────────

/// The stage at which the swap protocol stopped.
///
/// Stages before the new executable was started leave the previous install
/// in place (or put it back) and are retried after the long delay. Stages
/// after a failed start are fatal for the attempt and retried sooner.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("could not prepare staging directory {}: {reason}", path.display())]
    Staging { path: PathBuf, reason: String },

    #[error("could not download update: {0}")]
    Download(String),

    #[error("could not move previous executable aside: {0}")]
    Backup(String),

    #[error("could not install new executable: {reason}{}", if *restored { " (previous executable restored)" } else { "" })]
    Install { reason: String, restored: bool },

    #[error("new executable failed to start and no previous executable exists: {0}")]
    StartFailed(String),

    #[error("new executable failed to start, previous executable restored: {0}")]
    RolledBack(String),

    #[error("new executable failed to start ({start}) and rollback failed: {rollback}")]
    RollbackFailed { start: String, rollback: String },
}

impl SwapError {
    /// Whether the attempt ended after a failed post-swap start.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StartFailed(_) | Self::RolledBack(_) | Self::RollbackFailed { .. }
        )
    }

    /// Redelivery delay for the message that triggered this attempt.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        if self.is_fatal() {
            delays::NAK_SHORT
        } else {
            delays::NAK_LONG
        }
    }

    #[must_use]
    pub fn disposition(&self) -> Disposition {
        Disposition::Nak(self.retry_delay())
    }
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Startup configuration problems. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("agent id is not configured (set agent_id or AGENT_UPDATER_AGENT_ID)")]
    MissingAgentId,

    #[error("invalid agent id '{id}': {reason}")]
    InvalidAgentId { id: String, reason: &'static str },

    #[error("no NATS servers configured (set nats_servers or AGENT_UPDATER_NATS_SERVERS)")]
    NoServers,

    #[error("the registry status backend is only available on Windows")]
    RegistryUnavailable,

    #[error("could not read {what} from {}: {reason}", path.display())]
    UnreadableCertificate {
        what: &'static str,
        path: PathBuf,
        reason: String,
    },
}

// ── Status errors ─────────────────────────────────────────────────────────────

/// A persisted status value with an unexpected shape.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatusError {
    #[error("unrecognised restart flag '{0}'")]
    RestartFlag(String),

    #[error("unrecognised execution status '{0}'")]
    Outcome(String),
}
