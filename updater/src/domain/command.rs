//! Update commands decoded from inbound payloads, and when to run them.

use chrono::{DateTime, Utc};
use updater_common::UpdateRequest;
use url::Url;

use crate::domain::error::CommandError;

/// A validated request to replace the agent executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCommand {
    pub target_version: String,
    pub download_from: Url,
    /// Lowercase hex SHA-256 of the artifact.
    pub download_hash: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub run_immediately: bool,
}

/// When an accepted command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Now,
    At(DateTime<Utc>),
}

impl UpdateCommand {
    /// `Now` if the command asks for it, carries no time, or the time has passed.
    #[must_use]
    pub fn schedule(&self, now: DateTime<Utc>) -> Schedule {
        match self.scheduled_at {
            Some(at) if !self.run_immediately && at > now => Schedule::At(at),
            _ => Schedule::Now,
        }
    }
}

impl TryFrom<UpdateRequest> for UpdateCommand {
    type Error = CommandError;

    fn try_from(req: UpdateRequest) -> Result<Self, Self::Error> {
        let target_version = req.version.trim().to_string();
        if target_version.is_empty() {
            return Err(CommandError::MissingVersion);
        }
        let download_from = parse_download_url(&req.download_from)?;
        let download_hash = normalize_sha256(&req.download_hash)?;
        Ok(Self {
            target_version,
            download_from,
            download_hash,
            scheduled_at: req.update_at,
            run_immediately: req.update_now,
        })
    }
}

/// Decode and validate an update payload.
///
/// # Errors
///
/// Returns [`CommandError`] if the payload is not a well-formed update request.
pub fn decode_update_command(payload: &[u8]) -> Result<UpdateCommand, CommandError> {
    let req: UpdateRequest = serde_json::from_slice(payload)?;
    UpdateCommand::try_from(req)
}

/// Parse an artifact URL; only `http` and `https` are fetchable.
///
/// # Errors
///
/// Returns [`CommandError::InvalidUrl`] for unparsable URLs or other schemes.
pub fn parse_download_url(raw: &str) -> Result<Url, CommandError> {
    let url = Url::parse(raw.trim()).map_err(|e| CommandError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(CommandError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

/// Lowercase a SHA-256 hex digest, rejecting anything else.
///
/// # Errors
///
/// Returns [`CommandError::InvalidHash`] unless `raw` is 64 hex characters.
pub fn normalize_sha256(raw: &str) -> Result<String, CommandError> {
    let trimmed = raw.trim();
    if trimmed.len() == 64 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(trimmed.to_ascii_lowercase())
    } else {
        Err(CommandError::InvalidHash(raw.to_string()))
    }
}
