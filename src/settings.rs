//! Flat `key=value` settings files.
//!
//! Values are loaded when the file is opened. Every `set` re-reads the file
//! under an exclusive lock, applies the change and atomically replaces the
//! file, so writers updating different keys do not clobber each other.

use fs2::FileExt;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Errors that can occur while loading or saving a settings file.
#[derive(Debug)]
pub enum SettingsError {
    /// File I/O error.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Lock acquisition error.
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "I/O error on {}: {}", path.display(), source),
            Self::Lock { path, source } => {
                write!(f, "failed to lock {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } | Self::Lock { source, .. } => Some(source),
        }
    }
}

/// A settings file and its last-loaded values.
#[derive(Debug, Clone)]
pub struct Settings {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl Settings {
    /// Opens the settings file at `path`. A missing file has no values.
    pub fn initialize(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let values = read_values(&path)?;
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        self.values
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Sets a value and persists the file, creating its directory if needed.
    pub fn set(&mut self, key: &str, value: impl Display) -> Result<(), SettingsError> {
        let value = value.to_string().replace(['\r', '\n'], " ");

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let lock_path = lock_path(&self.path);
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| SettingsError::Lock {
                path: lock_path.clone(),
                source,
            })?;
        lock_file
            .lock_exclusive()
            .map_err(|source| SettingsError::Lock {
                path: lock_path.clone(),
                source,
            })?;

        let result = read_values(&self.path).and_then(|mut values| {
            values.insert(key.to_string(), value);
            write_values(&self.path, &values)?;
            Ok(values)
        });

        if let Err(e) = FileExt::unlock(&lock_file) {
            tracing::debug!("Failed to unlock {}: {}", lock_path.display(), e);
        }

        self.values = result?;
        Ok(())
    }

    /// Removes the settings file and its lock file. Succeeds if absent.
    pub fn remove(&self) -> Result<(), SettingsError> {
        for path in [self.path.clone(), lock_path(&self.path)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(SettingsError::Io { path, source }),
            }
        }
        Ok(())
    }
}

/// Hidden sibling used for cross-process locking: `.<name>.lock`
fn lock_path(path: &Path) -> PathBuf {
    sibling(path, "lock")
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}", name, suffix))
}

fn parse_values(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

fn read_values(path: &Path) -> Result<BTreeMap<String, String>, SettingsError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(parse_values(&content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(source) => Err(SettingsError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_values(path: &Path, values: &BTreeMap<String, String>) -> Result<(), SettingsError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| SettingsError::Io { path, source }
    };

    let content: String = values
        .iter()
        .map(|(key, value)| format!("{}={}\n", key, value))
        .collect();

    let tmp_path = sibling(path, "tmp");
    let mut tmp_file = File::create(&tmp_path).map_err(io_err(&tmp_path))?;
    tmp_file
        .write_all(content.as_bytes())
        .map_err(io_err(&tmp_path))?;
    tmp_file.sync_all().map_err(io_err(&tmp_path))?;
    drop(tmp_file);

    fs::rename(&tmp_path, path).map_err(io_err(path))
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
