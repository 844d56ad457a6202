//! One-file-per-property store compatible with older servers.
//!
//! Each property is a file in the session's properties directory whose
//! contents are the raw value. A handful of properties were historically
//! stored under hyphenated names; those names are kept so existing session
//! directories stay readable without a migration pass. Properties added
//! later are stored under their own name.

use super::{PropertyStore, PropertyStoreFactory, StorageError};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Property names with a historical on-disk alias.
const LEGACY_NAMES: &[(&str, &str)] = &[
    ("last_used", "last-used"),
    ("r_version", "r-version"),
    ("r_version_label", "r-version-label"),
    ("r_version_home", "r-version-home"),
    ("working_directory", "working-dir"),
    ("launch_parameters", "launch-parameters"),
];

/// Returns the on-disk file name for a property.
pub fn legacy_name(name: &str) -> &str {
    LEGACY_NAMES
        .iter()
        .find(|(current, _)| *current == name)
        .map(|(_, legacy)| *legacy)
        .unwrap_or(name)
}

/// Property store writing one file per property under `location`.
#[derive(Debug, Clone)]
pub struct LegacyPropertyStore {
    location: PathBuf,
}

impl LegacyPropertyStore {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// Directory holding the property files.
    pub fn location(&self) -> &Path {
        &self.location
    }

    fn property_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let file_name = legacy_name(name);
        if file_name.is_empty()
            || file_name.starts_with('.')
            || file_name.contains(['/', '\\'])
        {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.location.join(file_name))
    }

    /// Temp path in the same directory so the final rename never crosses
    /// filesystems.
    fn temp_path(&self, file_name: &str) -> PathBuf {
        let suffix: u32 = rand::random();
        self.location.join(format!(
            ".{}.{}-{:08x}.tmp",
            file_name,
            std::process::id(),
            suffix
        ))
    }
}

impl PropertyStore for LegacyPropertyStore {
    fn read_property(&self, name: &str) -> Result<String, StorageError> {
        let path = self.property_path(name)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(value.trim().to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn write_property(&self, name: &str, value: &str) -> Result<(), StorageError> {
        let path = self.property_path(name)?;
        let tmp_path = self.temp_path(legacy_name(name));

        let write_tmp = || -> std::io::Result<()> {
            let mut tmp_file = File::create(&tmp_path)?;
            tmp_file.write_all(value.as_bytes())?;
            tmp_file.sync_all()?;
            Ok(())
        };

        if let Err(source) = write_tmp() {
            let _ = fs::remove_file(&tmp_path);
            return Err(StorageError::Io {
                path: tmp_path,
                source,
            });
        }

        fs::rename(&tmp_path, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            StorageError::Io {
                path: path.clone(),
                source,
            }
        })
    }
}

/// Factory producing [`LegacyPropertyStore`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyStoreFactory;

impl PropertyStoreFactory for LegacyStoreFactory {
    fn store_for(&self, properties_path: &Path) -> Arc<dyn PropertyStore> {
        Arc::new(LegacyPropertyStore::new(properties_path))
    }
}

#[cfg(test)]
#[path = "tests/legacy_tests.rs"]
mod tests;
