//! Configuration loading: YAML file, `AGENT_UPDATER_*` overrides, and
//! certificate checks.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::config::{
    CertificatePaths, ConfigFile, DEFAULT_CONFIG_FILE, EnvOverrides, UpdaterConfig,
};
use crate::domain::error::ConfigError;

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "AGENT_UPDATER_";

/// Directory of the running executable, the default install directory.
///
/// # Errors
///
/// Returns an error if the executable path cannot be determined.
pub fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("cannot determine executable path")?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow::anyhow!("executable {} has no parent directory", exe.display()))
}

/// Default config path when neither `--config` nor `AGENT_UPDATER_CONFIG`
/// is given.
#[must_use]
pub fn default_config_path(install_dir: &Path) -> PathBuf {
    install_dir.join(DEFAULT_CONFIG_FILE)
}

/// Read a YAML config file. A missing file yields the empty config, so a
/// deployment may configure everything through the environment.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn read_config_file(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(ConfigFile::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
}

/// Read `AGENT_UPDATER_*` overrides.
///
/// # Errors
///
/// Returns an error if a variable is set but malformed.
pub fn read_env_overrides() -> Result<EnvOverrides> {
    envy::prefixed(ENV_PREFIX)
        .from_env()
        .with_context(|| format!("failed to load {ENV_PREFIX}* environment overrides"))
}

/// Load and merge configuration without touching the certificates.
///
/// # Errors
///
/// Returns an error if any source is malformed or the result is invalid.
pub fn resolve_config(explicit: Option<&Path>) -> Result<UpdaterConfig> {
    let exe_dir = executable_dir()?;
    let path = explicit.map_or_else(|| default_config_path(&exe_dir), Path::to_path_buf);
    let file = read_config_file(&path)?;
    let env = read_env_overrides()?;
    Ok(file.resolve(env, &exe_dir)?)
}

/// Load, merge, and validate configuration, including the certificates.
///
/// # Errors
///
/// Returns an error if any source is malformed or the result is invalid.
pub fn load_config(explicit: Option<&Path>) -> Result<UpdaterConfig> {
    let config = resolve_config(explicit)?;
    verify_certificates(&config.certificates)?;
    Ok(config)
}

/// Check that the CA and agent certificates and the agent key are readable
/// PEM.
///
/// # Errors
///
/// Returns [`ConfigError::UnreadableCertificate`] naming the first bad file.
pub fn verify_certificates(certs: &CertificatePaths) -> Result<(), ConfigError> {
    read_certs("CA certificate", &certs.ca_cert)?;
    read_certs("agent certificate", &certs.agent_cert)?;
    read_key(&certs.agent_key)?;
    Ok(())
}

fn unreadable(what: &'static str, path: &Path, reason: impl ToString) -> ConfigError {
    ConfigError::UnreadableCertificate {
        what,
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Count the certificates in a PEM file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or holds no certificate.
pub fn read_certs(what: &'static str, path: &Path) -> Result<usize, ConfigError> {
    let file = File::open(path).map_err(|e| unreadable(what, path, e))?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| unreadable(what, path, e))?;
    if certs.is_empty() {
        return Err(unreadable(what, path, "no certificate found"));
    }
    Ok(certs.len())
}

fn read_key(path: &Path) -> Result<(), ConfigError> {
    const WHAT: &str = "agent private key";
    let file = File::open(path).map_err(|e| unreadable(WHAT, path, e))?;
    let mut reader = BufReader::new(file);
    match rustls_pemfile::private_key(&mut reader) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(unreadable(WHAT, path, "no private key found")),
        Err(e) => Err(unreadable(WHAT, path, e)),
    }
}
