//! Discovery of the model executable.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Finds the model CLI: explicit path, then `PATH`, then known install locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableLocator {
    /// Bare program name looked up on `PATH`, or a path used as-is.
    pub executable: String,
    pub candidates: Vec<PathBuf>,
}

impl ExecutableLocator {
    pub fn locate(&self) -> Option<PathBuf> {
        let explicit = Path::new(&self.executable);
        if explicit.components().count() > 1 {
            debug!(path = %explicit.display(), "using explicit executable path");
            return is_executable(explicit).then(|| explicit.to_path_buf());
        }
        if let Ok(found) = which::which(&self.executable) {
            debug!(path = %found.display(), "executable found on PATH");
            return Some(found);
        }
        self.candidates
            .iter()
            .find(|candidate| is_executable(candidate))
            .cloned()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
