//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and `std`, never from
//! `crate::infra`.
//!
//! Async ports return `impl Future + Send` so the futures built from them can
//! run as scheduler jobs.

use std::future::Future;
use std::path::Path;
use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use url::Url;

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so service managers can be driven or mocked.
pub trait CommandRunner: Send + Sync {
    /// Run a program with the instance's default timeout and capture its output.
    fn run(&self, program: &str, args: &[&str]) -> impl Future<Output = Result<Output>> + Send;

    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> impl Future<Output = Result<Output>> + Send;
}

// ── Service Host Port ─────────────────────────────────────────────────────────

/// The OS service manager plus executable installation.
pub trait ServiceHost: Send + Sync + 'static {
    /// Stop the service and wait until it has stopped.
    fn stop(&self, service: &str) -> impl Future<Output = Result<()>> + Send;

    /// Start the service. Fails if it does not stay up.
    fn start(&self, service: &str) -> impl Future<Output = Result<()>> + Send;

    fn is_running(&self, service: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Move `staged` onto `target` and make it executable.
    fn install_artifact(&self, staged: &Path, target: &Path) -> Result<()>;
}

// ── Filesystem Port ───────────────────────────────────────────────────────────

/// Raw file operations used by the swap protocol.
pub trait LocalFs: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    /// Rename, replacing `to` if it exists.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}

// ── Download Port ─────────────────────────────────────────────────────────────

pub trait ArtifactFetcher: Send + Sync + 'static {
    /// Download `url` to `dest` and verify its SHA-256 against
    /// `expected_sha256` (lowercase hex).
    ///
    /// # Errors
    ///
    /// On any failure, including a digest mismatch, `dest` is left untouched.
    fn fetch(
        &self,
        url: &Url,
        dest: &Path,
        expected_sha256: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

// ── Status Port ───────────────────────────────────────────────────────────────

/// Key/value status shared with the agent. Values are strings.
pub trait StatusStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Write several keys. Implementations that can write atomically should.
    fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

// ── Clock Port ────────────────────────────────────────────────────────────────

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
    /// Wall-clock local time, used for persisted timestamps.
    fn now_local(&self) -> NaiveDateTime;
}

// ── Messaging Ports ───────────────────────────────────────────────────────────

/// A durable message that must be settled exactly once.
pub trait DurableMessage: Send + Sync + 'static {
    fn subject(&self) -> &str;
    fn payload(&self) -> &[u8];
    /// Stream sequence. Identical for every redelivery of one message.
    fn sequence(&self) -> Option<u64>;

    fn ack(&self) -> impl Future<Output = Result<()>> + Send;
    fn nak_with_delay(&self, delay: Duration) -> impl Future<Output = Result<()>> + Send;
    fn term(&self) -> impl Future<Output = Result<()>> + Send;
    /// Extend the ack deadline while the message is held.
    fn in_progress(&self) -> impl Future<Output = Result<()>> + Send;
}

/// A forced-restart request that expects an empty reply on success.
pub trait RestartRequest: Send + 'static {
    fn respond(self) -> impl Future<Output = Result<()>> + Send;
}

/// Inbound traffic, in arrival order.
pub enum Delivery<M, R> {
    Durable(M),
    Restart(R),
}

/// The connection to the messaging service.
pub trait Channel: Send + Sync + 'static {
    fn is_connected(&self) -> bool;
    fn connect(&self) -> impl Future<Output = Result<()>> + Send;
    /// Ensure the durable consumer and restart subscription are active.
    fn subscribe(&self) -> impl Future<Output = Result<()>> + Send;
}
