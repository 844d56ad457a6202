//! Key/value persistence for session properties.
//!
//! A [`PropertyStore`] reads and writes individual named properties. An
//! absent property reads as the empty string; only genuine I/O failures are
//! reported as errors. Each write is atomic on its own, but there is no
//! transaction spanning several properties, so readers must tolerate a
//! session that is halfway through an update.

pub mod legacy;

use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use legacy::{legacy_name, LegacyPropertyStore, LegacyStoreFactory};

/// Errors that can occur while reading or writing properties.
#[derive(Debug)]
pub enum StorageError {
    /// File I/O failure other than "not found" on read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Property name cannot be mapped to a storage location.
    InvalidName(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            Self::InvalidName(name) => write!(f, "invalid property name: {:?}", name),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::InvalidName(_) => None,
        }
    }
}

/// Named property persistence for one session.
pub trait PropertyStore: Send + Sync {
    /// Reads a property. Returns an empty string if the property is absent.
    fn read_property(&self, name: &str) -> Result<String, StorageError>;

    /// Replaces the full value of a property.
    fn write_property(&self, name: &str, value: &str) -> Result<(), StorageError>;
}

/// Builds a [`PropertyStore`] bound to a session's properties directory.
///
/// The registry asks the factory for a fresh store every time it creates or
/// rehydrates a session.
pub trait PropertyStoreFactory: Send + Sync {
    fn store_for(&self, properties_path: &Path) -> Arc<dyn PropertyStore>;
}
