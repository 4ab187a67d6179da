use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Update request for the agent executable.
///
/// `update_at` arrives as the zero timestamp (`0001-01-01T00:00:00Z`) when
/// the server did not schedule the update; that is decoded as `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub version: String,
    pub download_from: String,
    pub download_hash: String,
    #[serde(
        default,
        deserialize_with = "zero_time_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub update_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub update_now: bool,
}

fn zero_time_as_none<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<DateTime<Utc>>::deserialize(deserializer)?;
    Ok(value.filter(|t| t.year() > 1))
}

/// Messenger release broadcast.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Release {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub files: Vec<ReleaseFile>,
}

/// One downloadable build of a release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseFile {
    pub os: String,
    pub arch: String,
    #[serde(alias = "fileURL", alias = "fileUrl")]
    pub file_url: String,
    pub checksum: String,
}

impl Release {
    /// The file built for `platform`, if the release carries one with a
    /// non-empty URL and checksum.
    #[must_use]
    pub fn file_for(&self, platform: &Platform) -> Option<&ReleaseFile> {
        self.files.iter().find(|f| {
            f.os == platform.os
                && f.arch == platform.arch
                && !f.file_url.is_empty()
                && !f.checksum.is_empty()
        })
    }
}

/// Operating system and architecture in release manifest naming
/// (`linux`/`darwin`/`windows`, `amd64`/`arm64`/`386`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    /// The platform this binary was compiled for.
    #[must_use]
    pub fn current() -> Self {
        Self::from_rust(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Translate Rust target names into release manifest names.
    #[must_use]
    pub fn from_rust(os: &str, arch: &str) -> Self {
        let os = match os {
            "macos" => "darwin",
            other => other,
        };
        let arch = match arch {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        };
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
        }
    }
}
