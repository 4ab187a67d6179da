//! Windows registry implementation of the `StatusStore` port.
//!
//! Values live under `HKLM\SOFTWARE\AgentUpdater\Agent`, next to the values
//! the agent itself writes (such as `RestartRequired`). String values are
//! written as `REG_SZ`, except `RestartRequired`, which the agent reads as a
//! `REG_DWORD` and is written as `1` or `0`. `REG_DWORD` values are read as
//! their decimal text.

use std::io;

use anyhow::{Context, Result};
use winreg::RegKey;
use winreg::enums::{HKEY_LOCAL_MACHINE, KEY_QUERY_VALUE, KEY_SET_VALUE, RegType};
use winreg::types::FromRegValue;

use updater_common::status_keys;

use crate::application::ports::StatusStore;
use crate::domain::status::restart_flag_dword;

pub const STATUS_KEY_PATH: &str = r"SOFTWARE\AgentUpdater\Agent";

pub struct RegistryStatusStore {
    key: RegKey,
}

impl RegistryStatusStore {
    /// Open (creating if needed) the status key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be opened, usually for lack of
    /// administrator rights.
    pub fn open() -> Result<Self> {
        let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
        let (key, _) = hklm
            .create_subkey_with_flags(STATUS_KEY_PATH, KEY_QUERY_VALUE | KEY_SET_VALUE)
            .with_context(|| format!(r"opening HKLM\{STATUS_KEY_PATH}"))?;
        Ok(Self { key })
    }
}

impl StatusStore for RegistryStatusStore {
    fn get(&self, name: &str) -> Result<Option<String>> {
        let raw = match self.key.get_raw_value(name) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading registry value {name}")),
        };
        let value = match raw.vtype {
            RegType::REG_DWORD => u32::from_reg_value(&raw).map(|v| v.to_string()),
            _ => String::from_reg_value(&raw),
        }
        .with_context(|| format!("decoding registry value {name}"))?;
        Ok(Some(value))
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        if name == status_keys::RESTART_REQUIRED {
            let flag = restart_flag_dword(value)?;
            return self
                .key
                .set_value(name, &flag)
                .with_context(|| format!("writing registry value {name}"));
        }
        self.key
            .set_value(name, &value)
            .with_context(|| format!("writing registry value {name}"))
    }
}
