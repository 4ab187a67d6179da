//! Configuration schema, defaults and validation.
//!
//! Pure functions only. Reading files and the environment happens in
//! `crate::infra::config`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use updater_common::validate_agent_id;

use crate::domain::error::ConfigError;
use crate::domain::layout::ArtifactLayout;

// ── Defaults ─────────────────────────────────────────────────────────────────

pub const DEFAULT_SERVICE_NAME: &str = "agent";
pub const DEFAULT_STATUS_FILE: &str = "agent.ini";
pub const DEFAULT_CONFIG_FILE: &str = "updater.yaml";

fn default_agent_binary() -> String {
    format!("agent{}", std::env::consts::EXE_SUFFIX)
}

fn default_messenger_binary() -> String {
    format!("messenger{}", std::env::consts::EXE_SUFFIX)
}

// ── File schema ──────────────────────────────────────────────────────────────

/// Where execution status is persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusBackend {
    #[default]
    File,
    /// `HKLM\SOFTWARE\AgentUpdater\Agent`. Windows only.
    Registry,
}

/// `updater.yaml` as written by the installer. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub agent_id: Option<String>,
    pub nats_servers: Vec<String>,
    pub certificates: CertificateFile,
    pub service_name: Option<String>,
    pub install_dir: Option<PathBuf>,
    pub agent_binary: Option<String>,
    pub messenger_binary: Option<String>,
    pub status_backend: StatusBackend,
    pub status_file: Option<PathBuf>,
    /// Log rotated by the watchdog before restarting a crashed agent.
    pub agent_log: Option<PathBuf>,
    /// Directory for the updater's own log file; stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateFile {
    pub ca_cert: Option<PathBuf>,
    pub agent_cert: Option<PathBuf>,
    pub agent_key: Option<PathBuf>,
}

/// `AGENT_UPDATER_*` environment overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvOverrides {
    pub agent_id: Option<String>,
    /// Comma-separated server URLs.
    pub nats_servers: Option<String>,
    pub service_name: Option<String>,
    pub install_dir: Option<PathBuf>,
    pub status_file: Option<PathBuf>,
}

// ── Resolved config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificatePaths {
    pub ca_cert: PathBuf,
    pub agent_cert: PathBuf,
    pub agent_key: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterConfig {
    pub agent_id: String,
    pub nats_servers: Vec<String>,
    pub certificates: CertificatePaths,
    pub service_name: String,
    pub install_dir: PathBuf,
    pub agent_binary: String,
    pub messenger_binary: String,
    pub status_backend: StatusBackend,
    pub status_file: PathBuf,
    pub agent_log: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl ConfigFile {
    /// Merge environment overrides over the file, fill defaults relative to
    /// the install directory, and validate.
    ///
    /// `fallback_install_dir` is used when neither source names one; callers
    /// pass the directory of the running executable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the agent id or server list is missing or
    /// invalid.
    pub fn resolve(
        self,
        env: EnvOverrides,
        fallback_install_dir: &Path,
    ) -> Result<UpdaterConfig, ConfigError> {
        let agent_id = env
            .agent_id
            .or(self.agent_id)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingAgentId)?;
        check_agent_id(&agent_id)?;

        let nats_servers = match env.nats_servers {
            Some(list) => split_servers(&list),
            None => self
                .nats_servers
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        };
        if nats_servers.is_empty() {
            return Err(ConfigError::NoServers);
        }

        let install_dir = env
            .install_dir
            .or(self.install_dir)
            .unwrap_or_else(|| fallback_install_dir.to_path_buf());
        let certs_dir = install_dir.join("certificates");
        let certificates = CertificatePaths {
            ca_cert: self
                .certificates
                .ca_cert
                .unwrap_or_else(|| certs_dir.join("ca.cer")),
            agent_cert: self
                .certificates
                .agent_cert
                .unwrap_or_else(|| certs_dir.join("agent.cer")),
            agent_key: self
                .certificates
                .agent_key
                .unwrap_or_else(|| certs_dir.join("agent.key")),
        };

        let status_file = env
            .status_file
            .or(self.status_file)
            .map(|p| absolutize(&install_dir, p))
            .unwrap_or_else(|| install_dir.join(DEFAULT_STATUS_FILE));

        if self.status_backend == StatusBackend::Registry && !cfg!(windows) {
            return Err(ConfigError::RegistryUnavailable);
        }

        Ok(UpdaterConfig {
            agent_id,
            nats_servers,
            certificates,
            service_name: env
                .service_name
                .or(self.service_name)
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            agent_binary: self.agent_binary.unwrap_or_else(default_agent_binary),
            messenger_binary: self
                .messenger_binary
                .unwrap_or_else(default_messenger_binary),
            status_backend: self.status_backend,
            status_file,
            agent_log: self.agent_log,
            log_dir: self.log_dir,
            install_dir,
        })
    }
}

impl UpdaterConfig {
    #[must_use]
    pub fn agent_layout(&self) -> ArtifactLayout {
        ArtifactLayout::agent(&self.install_dir, &self.agent_binary, &self.service_name)
    }

    #[must_use]
    pub fn messenger_layout(&self) -> ArtifactLayout {
        ArtifactLayout::messenger(&self.install_dir, &self.messenger_binary)
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

fn check_agent_id(id: &str) -> Result<(), ConfigError> {
    validate_agent_id(id).map_err(|reason| ConfigError::InvalidAgentId {
        id: id.to_string(),
        reason,
    })?;
    // agent.update.messenger is the messenger broadcast subject.
    if id == "messenger" {
        return Err(ConfigError::InvalidAgentId {
            id: id.to_string(),
            reason: "agent id collides with the messenger subjects",
        });
    }
    Ok(())
}

fn split_servers(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn absolutize(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
