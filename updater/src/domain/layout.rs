//! On-disk locations of a managed executable and its swap companions.

use std::env::consts::EXE_SUFFIX;
use std::path::{Path, PathBuf};

/// Working directory under the install dir holding staged and rollback files.
pub const WORK_DIR: &str = "updater";

/// Which executable an operation concerns. Operations on the same artifact
/// never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Agent,
    Messenger,
}

impl ArtifactKind {
    pub const ALL: [Self; 2] = [Self::Agent, Self::Messenger];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Messenger => "messenger",
        }
    }
}

/// Install, rollback and staging paths of one artifact.
///
/// `service` names the managed service that runs the artifact. The messenger
/// is launched on demand by the agent, so it has none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub kind: ArtifactKind,
    pub install_path: PathBuf,
    pub rollback_path: PathBuf,
    pub staging_path: PathBuf,
    pub service: Option<String>,
}

impl ArtifactLayout {
    #[must_use]
    pub fn agent(install_dir: &Path, binary: &str, service: &str) -> Self {
        let work = install_dir.join(WORK_DIR);
        Self {
            kind: ArtifactKind::Agent,
            install_path: install_dir.join(binary),
            rollback_path: work.join(format!("rollback{EXE_SUFFIX}")),
            staging_path: work.join(format!("download{EXE_SUFFIX}")),
            service: Some(service.to_string()),
        }
    }

    #[must_use]
    pub fn messenger(install_dir: &Path, binary: &str) -> Self {
        let work = install_dir.join(WORK_DIR);
        Self {
            kind: ArtifactKind::Messenger,
            install_path: install_dir.join(binary),
            rollback_path: work.join(format!("messenger-rollback{EXE_SUFFIX}")),
            staging_path: work.join(format!("messenger{EXE_SUFFIX}")),
            service: None,
        }
    }

    /// Directory holding the staged download.
    #[must_use]
    pub fn staging_dir(&self) -> &Path {
        self.staging_path.parent().unwrap_or(Path::new("."))
    }
}
