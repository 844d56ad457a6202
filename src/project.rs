//! Project descriptor resolution and shared-path classification.
//!
//! Session validation needs two answers about a project directory: where
//! its descriptor file is, and whether it lives somewhere shared with other
//! users. Both are supplied through [`ProjectResolver`] so the server can
//! plug in its own project sharing rules.

use std::fs;
use std::path::{Path, PathBuf};

/// Extension of project descriptor files.
pub const PROJECT_FILE_EXTENSION: &str = "Rproj";

/// Project capability consulted by session validation.
pub trait ProjectResolver: Send + Sync {
    /// Returns the project descriptor inside `project_dir`, if any.
    fn project_file(&self, project_dir: &Path) -> Option<PathBuf>;

    /// Returns true if `path` belongs to a project shared from another user.
    fn is_shared_path(&self, path: &Path, user_home: &Path) -> bool;
}

/// Filesystem-based resolver.
///
/// The descriptor is `<dir-name>.Rproj` when present, otherwise the first
/// `*.Rproj` file in lexical order. A path counts as shared when it is owned
/// by a different user than the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProjectResolver;

impl ProjectResolver for DefaultProjectResolver {
    fn project_file(&self, project_dir: &Path) -> Option<PathBuf> {
        if !project_dir.is_dir() {
            return None;
        }

        if let Some(dir_name) = project_dir.file_name() {
            let mut preferred = PathBuf::from(dir_name);
            preferred.set_extension(PROJECT_FILE_EXTENSION);
            let preferred = project_dir.join(preferred);
            if preferred.is_file() {
                return Some(preferred);
            }
        }

        let entries = match fs::read_dir(project_dir) {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("Could not list project dir {}: {}", project_dir.display(), e);
                return None;
            }
        };

        let mut candidates: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(PROJECT_FILE_EXTENSION))
            })
            .collect();
        candidates.sort();
        candidates.into_iter().next()
    }

    fn is_shared_path(&self, path: &Path, _user_home: &Path) -> bool {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;

            match fs::metadata(path) {
                Ok(metadata) => metadata.uid() != nix::unistd::geteuid().as_raw(),
                Err(_) => false,
            }
        }
        #[cfg(not(unix))]
        {
            let _ = path;
            false
        }
    }
}

#[cfg(test)]
#[path = "tests/project_tests.rs"]
mod tests;
