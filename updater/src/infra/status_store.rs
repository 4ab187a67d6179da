//! Infrastructure implementation of the `StatusStore` port backed by the
//! `[Agent]` section of an INI file shared with the agent.
//!
//! Every write is read-modify-write of the whole file under an in-process
//! mutex and lands atomically (temp file + rename). Sections and keys the
//! updater does not own are written back unchanged.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use ini::{EscapePolicy, Ini, ParseOption, WriteOption};

use crate::application::ports::StatusStore;
use crate::domain::config::{StatusBackend, UpdaterConfig};

/// Section holding every status key.
pub const SECTION: &str = "Agent";

pub struct FileStatusStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStatusStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn load(&self) -> Result<Ini> {
        if !self.path.exists() {
            return Ok(Ini::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading status file {}", self.path.display()))?;
        // Values are stored verbatim, as the agent writes them.
        let options = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..ParseOption::default()
        };
        Ini::load_from_str_opt(&content, options)
            .with_context(|| format!("parsing status file {}", self.path.display()))
    }

    fn save(&self, ini: &Ini) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let mut content = Vec::new();
        let options = WriteOption {
            escape_policy: EscapePolicy::Nothing,
            ..WriteOption::default()
        };
        ini.write_to_opt(&mut content, options)
            .context("serializing status")?;

        let temp_path = self.temp_path();
        std::fs::write(&temp_path, &content)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;
        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("finalizing status file {}", self.path.display()))
    }

    fn update<'a>(&self, entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ini = self.load()?;
        for (key, value) in entries {
            ini.with_section(Some(SECTION)).set(key, single_line(value));
        }
        self.save(&ini)
    }
}

/// A line break would end the value and start a bogus key.
fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

impl StatusStore for FileStatusStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let ini = self.load()?;
        Ok(ini
            .section(Some(SECTION))
            .and_then(|section| section.get(key))
            .map(str::to_string))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update([(key, value)])
    }

    fn set_many(&self, new: &[(&str, String)]) -> Result<()> {
        self.update(new.iter().map(|(key, value)| (*key, value.as_str())))
    }
}

/// The configured status backend.
///
/// # Errors
///
/// Returns an error if the registry backend is requested but cannot be opened.
pub fn open_status_store(config: &UpdaterConfig) -> Result<Box<dyn StatusStore>> {
    match config.status_backend {
        StatusBackend::File => Ok(Box::new(FileStatusStore::new(config.status_file.clone()))),
        #[cfg(windows)]
        StatusBackend::Registry => Ok(Box::new(
            crate::infra::registry_store::RegistryStatusStore::open()?,
        )),
        #[cfg(not(windows))]
        StatusBackend::Registry => Err(crate::domain::error::ConfigError::RegistryUnavailable.into()),
    }
}
