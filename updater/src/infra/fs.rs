//! Filesystem infrastructure: implements `LocalFs` and installs executables.

use std::path::Path;

use anyhow::{Context, Result};

/// Production filesystem implementation of the `LocalFs` port.
pub struct LocalFs;

impl crate::application::ports::LocalFs for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("creating directory {}", path.display()))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        std::fs::rename(from, to)
            .with_context(|| format!("renaming {} to {}", from.display(), to.display()))
    }
}

/// Move `staged` onto `target` (replacing it) and set mode 0755 on Unix.
///
/// # Errors
///
/// Returns an error if the rename or the permission change fails.
pub fn install_executable(staged: &Path, target: &Path) -> Result<()> {
    std::fs::rename(staged, target)
        .with_context(|| format!("installing {} to {}", staged.display(), target.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(target, std::fs::Permissions::from_mode(0o755))
            .with_context(|| format!("setting permissions on {}", target.display()))?;
    }
    Ok(())
}
