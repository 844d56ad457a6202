//! Directory layout for active session storage.
//!
//! All per-user session data lives under a root storage directory:
//! - `sessions/active/` - Registry root, one child directory per session id
//! - `sessions/active/<id>/properites/` - One file per session property
//! - `sessions/active/<id>/...` - Suspended session payloads
//!
//! The properties directory name is part of the on-disk format shared with
//! older servers and must not be corrected.

use std::fs;
use std::path::{Path, PathBuf};

/// Registry root relative to the root storage path.
pub const ACTIVE_SESSIONS_DIR: &str = "sessions/active";

/// Name of the per-session properties directory.
pub const PROPERTIES_DIR: &str = "properites";

/// Sentinel project value for sessions not bound to a project.
pub const PROJECT_NONE: &str = "none";

/// Returns the registry root: `<root>/sessions/active`
pub fn storage_path(root_storage_path: &Path) -> PathBuf {
    root_storage_path.join(ACTIVE_SESSIONS_DIR)
}

/// Returns the scratch directory for a session: `<registry>/<id>`
pub fn scratch_path(storage_path: &Path, id: &str) -> PathBuf {
    storage_path.join(id)
}

/// Returns the properties directory under a scratch path.
pub fn properties_path(scratch_path: &Path) -> PathBuf {
    scratch_path.join(PROPERTIES_DIR)
}

/// Resolves a path that may be aliased to the user home (`~` or `~/...`).
///
/// Non-aliased paths are returned unchanged.
pub fn resolve_aliased_path(path: &str, user_home: &Path) -> PathBuf {
    if path == "~" {
        return user_home.to_path_buf();
    }
    match path.strip_prefix("~/") {
        Some(rest) => user_home.join(rest),
        None => PathBuf::from(path),
    }
}

/// Computes the total size in bytes of all files below `path`.
///
/// Unreadable entries count as zero; a missing path has size zero.
pub fn size_recursive(path: &Path) -> u64 {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(_) => return 0,
    };

    if !metadata.is_dir() {
        return metadata.len();
    }

    let entries = match fs::read_dir(path) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!("Could not read {}: {}", path.display(), e);
            return 0;
        }
    };

    entries
        .flatten()
        .map(|entry| size_recursive(&entry.path()))
        .sum()
}

/// Returns true if a directory entry name should be skipped when enumerating
/// storage directories (temp files, lock files and other hidden entries).
pub fn is_hidden_entry(name: &str) -> bool {
    name.starts_with('.')
}

#[cfg(test)]
#[path = "tests/session_paths_tests.rs"]
mod tests;
