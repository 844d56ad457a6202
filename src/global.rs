//! Server-wide view of session processes.
//!
//! The supervising server keeps one settings file per session process in a
//! common directory so it can see every session regardless of which user
//! owns it. These records are not validated: any file present is listed.

use crate::session_paths;
use crate::settings::{Settings, SettingsError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const SESSION_ID: &str = "sessionId";
const USERNAME: &str = "username";
const USER_HOME_DIR: &str = "userHomeDir";
const SESSION_TIMEOUT_KILL_HOURS: &str = "sessionTimeoutKillHours";

/// A session process as tracked by the supervising server.
#[derive(Debug, Clone)]
pub struct GlobalActiveSession {
    settings: Settings,
}

impl GlobalActiveSession {
    /// Opens the record stored at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        Ok(Self {
            settings: Settings::initialize(path)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.settings.path()
    }

    pub fn session_id(&self) -> String {
        self.settings.get(SESSION_ID, "")
    }

    pub fn set_session_id(&mut self, session_id: &str) -> Result<(), SettingsError> {
        self.settings.set(SESSION_ID, session_id)
    }

    pub fn username(&self) -> String {
        self.settings.get(USERNAME, "")
    }

    pub fn set_username(&mut self, username: &str) -> Result<(), SettingsError> {
        self.settings.set(USERNAME, username)
    }

    pub fn user_home_dir(&self) -> String {
        self.settings.get(USER_HOME_DIR, "")
    }

    pub fn set_user_home_dir(&mut self, user_home_dir: &str) -> Result<(), SettingsError> {
        self.settings.set(USER_HOME_DIR, user_home_dir)
    }

    /// Hours of inactivity after which the session process is killed; 0 disables.
    pub fn session_timeout_kill_hours(&self) -> i32 {
        self.settings.get_int(SESSION_TIMEOUT_KILL_HOURS, 0)
    }

    pub fn set_session_timeout_kill_hours(&mut self, hours: i32) -> Result<(), SettingsError> {
        self.settings.set(SESSION_TIMEOUT_KILL_HOURS, hours)
    }

    /// Deletes the record file.
    pub fn destroy(&self) -> Result<(), SettingsError> {
        self.settings.remove()
    }
}

/// All session process records under one server-wide directory.
#[derive(Debug, Clone)]
pub struct GlobalActiveSessions {
    root_path: PathBuf,
}

impl GlobalActiveSessions {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Opens every record file under the root. Unreadable files are skipped.
    pub fn list(&self) -> Vec<GlobalActiveSession> {
        let entries = match fs::read_dir(&self.root_path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(
                    "No global session records at {}: {}",
                    self.root_path.display(),
                    e
                );
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter(|entry| is_record_name(&entry.file_name().to_string_lossy()))
            .map(|entry| entry.path())
            .collect();
        paths.sort();

        paths
            .into_iter()
            .filter_map(|path| match GlobalActiveSession::open(&path) {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!("Skipping global session record: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Opens the record for `id`, or `None` if it does not exist.
    pub fn get(&self, id: &str) -> Option<GlobalActiveSession> {
        if !is_record_name(id) {
            return None;
        }

        let path = self.root_path.join(id);
        if !path.is_file() {
            return None;
        }

        match GlobalActiveSession::open(&path) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!("Failed to open global session {}: {}", id, e);
                None
            }
        }
    }

    /// Starts a record for `id` with its session id field filled in.
    pub fn create(&self, id: &str) -> Result<GlobalActiveSession, SettingsError> {
        let path = self.root_path.join(id);
        if !is_record_name(id) {
            return Err(SettingsError::Io {
                path,
                source: std::io::Error::new(ErrorKind::InvalidInput, "invalid session id"),
            });
        }

        let mut session = GlobalActiveSession::open(path)?;
        session.set_session_id(id)?;
        Ok(session)
    }
}

fn is_record_name(name: &str) -> bool {
    !name.is_empty() && !session_paths::is_hidden_entry(name) && !name.contains(['/', '\\'])
}

#[cfg(test)]
#[path = "tests/global_tests.rs"]
mod tests;
